use thiserror::Error;

/// Result type for state management operations.
pub type StateResult<T> = Result<T, StateError>;

/// State-layer errors.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("field '{0}' is missing from the persisted record")]
    MissingField(String),

    #[error("field '{field}' failed to load: {reason}")]
    LoadFailed { field: String, reason: String },

    #[error("field '{field}' is invalid: {reason}")]
    Invalid { field: String, reason: String },
}
