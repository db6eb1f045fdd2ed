//! Error types for Tripwire Core

use thiserror::Error;

/// Input record validation error
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("expected 7 tab-separated fields, found {0}")]
    FieldCount(usize),

    #[error("invalid {field}: {text:?}")]
    Field { field: &'static str, text: String },
}

impl RecordError {
    pub(crate) fn field(field: &'static str, text: &str) -> Self {
        RecordError::Field {
            field,
            text: text.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecordError>;
