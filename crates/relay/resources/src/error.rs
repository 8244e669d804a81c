use thiserror::Error;

/// Result type for collaborator calls.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors crossing the collaborator boundary.
///
/// The engine never retries these; a rejected call surfaces at the task
/// boundary as a workflow failure carrying the original error text.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("backend error: {0}")]
    Backend(String),
}
