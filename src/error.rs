use crate::models::Currency;
use std::fmt;
use thiserror::Error;

/// Fields of a listing that are read from the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Price,
    Year,
    Characteristics,
    Description,
    Location,
    SourceUrl,
    Date,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Price => "price",
            Field::Year => "year",
            Field::Characteristics => "characteristics",
            Field::Description => "description",
            Field::Location => "location",
            Field::SourceUrl => "source_url",
            Field::Date => "date",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single field could not be read.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("no element matches {locator}")]
    NotFound { locator: String },
    #[error("attribute '{name}' is missing")]
    MissingAttribute { name: String },
    #[error("cannot parse '{value}': {reason}")]
    Parse { value: String, reason: String },
    #[error("value {value} is outside the plausible range")]
    OutOfRange { value: i64 },
    #[error("token {index} is missing ({len} tokens)")]
    MissingToken { index: usize, len: usize },
    #[error("unexpected layout with {len} tokens")]
    Layout { len: usize },
}

impl FieldError {
    pub(crate) fn parse(value: &str, reason: impl Into<String>) -> Self {
        FieldError::Parse {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("no {from}/{to} rate is available for this run")]
    RateUnavailable { from: Currency, to: Currency },
}

/// Failure of a rate source lookup.
#[derive(Debug, Error)]
pub enum RateError {
    #[error("rate request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("currency {0} is not quoted by the rate source")]
    UnknownCurrency(Currency),
    #[error("malformed rate payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error("listing has no identity attribute")]
    MissingIdentity,
    #[error("failed to extract {field}: {cause}")]
    Field { field: Field, cause: FieldError },
    #[error(transparent)]
    RateUnavailable(#[from] ConversionError),
}

impl ExtractionError {
    pub fn field(field: Field, cause: FieldError) -> Self {
        ExtractionError::Field { field, cause }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),
    #[error("a record with id {id} is already stored")]
    Duplicate { id: String },
    #[error("stored row is invalid: {reason}")]
    CorruptRow { reason: String },
}
