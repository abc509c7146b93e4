use serde::{Deserialize, Serialize};

use super::error::ComprobanteError;

/// Catalog 06: identity document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityType {
    /// 0: Other / non-domiciled without document.
    Other,
    /// 1: DNI, national identity document of individuals.
    NationalId,
    /// 4: Carnet de extranjería.
    ForeignId,
    /// 6: RUC, taxpayer registry number.
    TaxId,
}

impl IdentityType {
    /// Catalog 06 code, as written in `schemeID`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Other => "0",
            Self::NationalId => "1",
            Self::ForeignId => "4",
            Self::TaxId => "6",
        }
    }

    /// Parse from a catalog 06 code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "0" | "-" => Some(Self::Other),
            "1" => Some(Self::NationalId),
            "4" => Some(Self::ForeignId),
            "6" => Some(Self::TaxId),
            _ => None,
        }
    }
}

/// A validated identity document number.
///
/// The number is checked against its type on construction and cannot be
/// changed afterwards; build a new value to replace it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawIdentification", into = "RawIdentification")]
pub struct Identification {
    kind: IdentityType,
    number: String,
}

impl Identification {
    pub fn new(kind: IdentityType, number: impl Into<String>) -> Result<Self, ComprobanteError> {
        let number = number.into();
        if !is_valid_number(kind, &number) {
            return Err(ComprobanteError::input(format!(
                "inconsistent identification number '{number}' for type {}",
                kind.code()
            )));
        }
        Ok(Self { kind, number })
    }

    /// Shorthand for a RUC.
    pub fn ruc(number: impl Into<String>) -> Result<Self, ComprobanteError> {
        Self::new(IdentityType::TaxId, number)
    }

    /// Shorthand for a DNI.
    pub fn dni(number: impl Into<String>) -> Result<Self, ComprobanteError> {
        Self::new(IdentityType::NationalId, number)
    }

    pub fn kind(&self) -> IdentityType {
        self.kind
    }

    pub fn number(&self) -> &str {
        &self.number
    }
}

#[derive(Serialize, Deserialize)]
struct RawIdentification {
    kind: IdentityType,
    number: String,
}

impl TryFrom<RawIdentification> for Identification {
    type Error = ComprobanteError;

    fn try_from(raw: RawIdentification) -> Result<Self, Self::Error> {
        Self::new(raw.kind, raw.number)
    }
}

impl From<Identification> for RawIdentification {
    fn from(id: Identification) -> Self {
        Self {
            kind: id.kind,
            number: id.number,
        }
    }
}

/// Check `number` against the format rules of `kind`.
pub fn is_valid_number(kind: IdentityType, number: &str) -> bool {
    match kind {
        IdentityType::Other => true,
        IdentityType::NationalId => number.len() == 8 && number.bytes().all(|b| b.is_ascii_digit()),
        IdentityType::ForeignId => number.chars().count() < 13,
        IdentityType::TaxId => is_valid_ruc(number),
    }
}

/// Prefixes assigned to RUC numbers (individuals, non-domiciled, legal entities).
const RUC_PREFIXES: [&str; 4] = ["10", "15", "17", "20"];

/// Validate a RUC: 11 digits, known prefix and modulo-11 check digit.
///
/// Weights 2 through 7 are applied cyclically from the tenth digit leftwards.
pub fn is_valid_ruc(ruc: &str) -> bool {
    if ruc.len() != 11 || !ruc.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    // Numeric lower bound carried over unchanged; with 11 digits it only rejects all-zero input.
    match ruc.parse::<u64>() {
        Ok(n) if n >= 11 => {}
        _ => return false,
    }
    if !RUC_PREFIXES.contains(&&ruc[..2]) {
        return false;
    }

    let digits: Vec<u32> = ruc.bytes().map(|b| u32::from(b - b'0')).collect();
    let mut factor = 1;
    let mut sum = 0;
    for digit in digits[..10].iter().rev() {
        factor += 1;
        if factor == 8 {
            factor = 2;
        }
        sum += factor * digit;
    }
    (11 - sum % 11) % 10 == digits[10]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_valid_rucs() {
        assert!(is_valid_ruc("20100070970"));
        assert!(is_valid_ruc("20601030013"));
        assert!(is_valid_ruc("10412345679"));
    }

    #[test]
    fn ruc_rejects_bad_check_digit() {
        assert!(!is_valid_ruc("20100070971"));
        assert!(!is_valid_ruc("20100070980"));
    }

    #[test]
    fn ruc_rejects_shape() {
        assert!(!is_valid_ruc("2010007097"));
        assert!(!is_valid_ruc("201000709701"));
        assert!(!is_valid_ruc("2010007097A"));
        assert!(!is_valid_ruc(""));
        // 30 is not an assigned prefix
        assert!(!is_valid_ruc("30100070970"));
    }

    #[test]
    fn every_single_digit_mutation_invalidates() {
        let valid = "20100070970";
        for pos in 0..11 {
            for d in b'0'..=b'9' {
                let mut bytes = valid.as_bytes().to_vec();
                if bytes[pos] == d {
                    continue;
                }
                bytes[pos] = d;
                let mutated = String::from_utf8(bytes).unwrap();
                assert!(!is_valid_ruc(&mutated), "{mutated} should be invalid");
            }
        }
    }

    #[test]
    fn dni_rules() {
        assert!(Identification::dni("12345678").is_ok());
        assert!(Identification::dni("1234567").is_err());
        assert!(Identification::dni("1234567A").is_err());
    }

    #[test]
    fn foreign_id_max_twelve_chars() {
        assert!(Identification::new(IdentityType::ForeignId, "AB1234567890").is_ok());
        assert!(Identification::new(IdentityType::ForeignId, "AB12345678901").is_err());
    }

    #[test]
    fn other_accepts_anything() {
        let id = Identification::new(IdentityType::Other, "-").unwrap();
        assert_eq!(id.kind().code(), "0");
        assert_eq!(id.number(), "-");
    }

    #[test]
    fn invalid_ruc_error_message() {
        let err = Identification::ruc("20100070971").unwrap_err();
        assert!(err.to_string().contains("inconsistent identification number"));
    }

    #[test]
    fn catalog_codes_roundtrip() {
        for kind in [
            IdentityType::Other,
            IdentityType::NationalId,
            IdentityType::ForeignId,
            IdentityType::TaxId,
        ] {
            assert_eq!(IdentityType::from_code(kind.code()), Some(kind));
        }
        assert_eq!(IdentityType::from_code("9"), None);
    }
}
