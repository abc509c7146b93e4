use thiserror::Error;

/// Errors that can occur while building, validating or exchanging a fiscal document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ComprobanteError {
    /// A setter or constructor received a malformed value.
    #[error("invalid input: {0}")]
    Input(String),

    /// The document is incomplete. Only the first violation is reported.
    #[error("validation failed: {0}")]
    Validation(ValidationError),

    /// A required relation (identification, address, certificate, ...) is not set.
    #[error("missing {0}")]
    Precondition(String),

    /// The tax authority answered with a fault or a non-zero response code.
    #[error("rejected by authority ({code}): {message}")]
    Rejected { code: String, message: String },

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// ZIP packaging or extraction error.
    #[error("archive error: {0}")]
    Archive(String),

    /// Network or HTTP error.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ComprobanteError {
    pub(crate) fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    pub(crate) fn missing(what: impl Into<String>) -> Self {
        Self::Precondition(what.into())
    }

    /// The validation error, if this is a completeness failure.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(v) => Some(v),
            _ => None,
        }
    }
}

impl From<ValidationError> for ComprobanteError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

/// Which completeness rule a [`ValidationError`] violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationRule {
    SeriesLength,
    SequenceRange,
    IssueDate,
    NoItems,
    Currency,
    ItemQuantity,
    ItemUnit,
    ItemLineExtension,
    ItemPricingReference,
    ItemDescription,
    CustomerTaxId,
    SharesMismatch,
    DetractionCode,
    StartDate,
    Weight,
    WeightUnit,
    HandlingCode,
    DeliveryAddress,
    DeliveryGeocode,
}

/// A single completeness failure with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the offending field (e.g. "items.quantity").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
    pub rule: ValidationRule,
    /// 1-based position of the offending item, if the failure is per item.
    pub item: Option<usize>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(item) = self.item {
            write!(f, "item {}: {}: {}", item, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, rule: ValidationRule) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule,
            item: None,
        }
    }

    /// Create a validation error tied to the item at `position` (1-based).
    pub fn for_item(
        position: usize,
        field: impl Into<String>,
        message: impl Into<String>,
        rule: ValidationRule,
    ) -> Self {
        Self {
            item: Some(position),
            ..Self::new(field, message, rule)
        }
    }
}
