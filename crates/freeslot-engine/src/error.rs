//! Error types for freeslot-engine operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FreeSlotError {
    /// The calendar feed could not be retrieved. Raised by the retrieval
    /// collaborator, never by the engine itself.
    #[error("Failed to fetch calendar feed: {0}")]
    Fetch(String),

    /// The feed content is not valid calendar data.
    #[error("Invalid calendar data: {0}")]
    Parse(String),

    /// A request parameter is outside its allowed bounds.
    #[error("Invalid {field}: {message}")]
    InvalidConfiguration { field: &'static str, message: String },
}

impl FreeSlotError {
    pub(crate) fn config(field: &'static str, message: impl Into<String>) -> Self {
        FreeSlotError::InvalidConfiguration {
            field,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FreeSlotError>;
