use super::error::ComprobanteError;
use super::types::DocumentTypeCode;

/// Highest sequence number a series can hold.
pub const MAX_SEQUENCE: u32 = 99_999_999;

/// Format a document identity: `F001-00000001`, or `01-F001-00000001` when a
/// type code is given. `compacted` drops the zero padding of the sequence.
pub fn format_id(
    type_code: Option<DocumentTypeCode>,
    series: &str,
    sequence: u32,
    compacted: bool,
) -> String {
    let number = if compacted {
        sequence.to_string()
    } else {
        format!("{sequence:0>8}")
    };
    match type_code {
        Some(t) => format!("{}-{series}-{number}", t.padded()),
        None => format!("{series}-{number}"),
    }
}

/// Check that a series is exactly 4 characters.
pub fn check_series(series: &str) -> Result<(), ComprobanteError> {
    if series.chars().count() != 4 {
        return Err(ComprobanteError::input(format!(
            "series '{series}' must be exactly 4 characters"
        )));
    }
    Ok(())
}

/// Sequential number generator for one series.
///
/// The authority requires sequences without gaps within a series, so numbers
/// are only handed out in order and the series is closed at [`MAX_SEQUENCE`].
#[derive(Debug, Clone)]
pub struct SeriesSequence {
    series: String,
    next: u32,
}

impl SeriesSequence {
    /// Create a sequence starting at 1.
    pub fn new(series: impl Into<String>) -> Result<Self, ComprobanteError> {
        Self::starting_at(series, 1)
    }

    /// Create a sequence continuing from a given number.
    pub fn starting_at(series: impl Into<String>, next: u32) -> Result<Self, ComprobanteError> {
        let series = series.into();
        check_series(&series)?;
        if next == 0 || next > MAX_SEQUENCE {
            return Err(ComprobanteError::input(format!(
                "sequence {next} outside 1..={MAX_SEQUENCE}"
            )));
        }
        Ok(Self { series, next })
    }

    pub fn series(&self) -> &str {
        &self.series
    }

    /// Hand out the next number.
    pub fn next_sequence(&mut self) -> Result<u32, ComprobanteError> {
        if self.next > MAX_SEQUENCE {
            return Err(ComprobanteError::input(format!(
                "series {} is exhausted",
                self.series
            )));
        }
        let n = self.next;
        self.next += 1;
        Ok(n)
    }

    /// Preview the next identity without consuming it.
    pub fn peek(&self) -> String {
        format_id(None, &self.series, self.next, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_formats() {
        assert_eq!(format_id(None, "F001", 1, false), "F001-00000001");
        assert_eq!(
            format_id(Some(DocumentTypeCode::Invoice), "F001", 1, false),
            "01-F001-00000001"
        );
        assert_eq!(format_id(None, "B001", 42, true), "B001-42");
        assert_eq!(
            format_id(Some(DocumentTypeCode::CarrierDespatch), "V001", 7, true),
            "31-V001-7"
        );
    }

    #[test]
    fn sequential_numbering() {
        let mut seq = SeriesSequence::new("F001").unwrap();
        assert_eq!(seq.peek(), "F001-00000001");
        assert_eq!(seq.next_sequence().unwrap(), 1);
        assert_eq!(seq.next_sequence().unwrap(), 2);
        assert_eq!(seq.peek(), "F001-00000003");
    }

    #[test]
    fn series_is_exhausted_at_max() {
        let mut seq = SeriesSequence::starting_at("F001", MAX_SEQUENCE).unwrap();
        assert_eq!(seq.next_sequence().unwrap(), MAX_SEQUENCE);
        assert!(seq.next_sequence().is_err());
    }

    #[test]
    fn rejects_bad_series_and_start() {
        assert!(SeriesSequence::new("F01").is_err());
        assert!(SeriesSequence::new("F0001").is_err());
        assert!(SeriesSequence::starting_at("F001", 0).is_err());
        assert!(SeriesSequence::starting_at("F001", MAX_SEQUENCE + 1).is_err());
    }
}
