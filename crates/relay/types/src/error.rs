use crate::ids::{CallbackId, InteractionId, TaskName};
use crate::ticket::Ticket;
use relay_state::StateError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-layer errors.
///
/// Routing errors (`InvalidPath`, `PathNotFound`, `NoAwaitingTask`,
/// `AnswerNotExpected`) are fatal to the single message that triggered
/// them; process state is untouched and the message can be retried or
/// discarded by the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The ticket/callback pair does not match the current expected answer
    #[error("answer for callback '{callback}' with ticket '{ticket}' is not expected")]
    AnswerNotExpected {
        callback: CallbackId,
        ticket: Ticket,
    },

    #[error("callback '{0}' is not defined")]
    UnknownCallback(CallbackId),

    #[error("user interaction '{0}' is not defined")]
    UnknownInteraction(InteractionId),

    #[error("callback '{0}' is declared more than once")]
    DuplicateCallback(CallbackId),

    #[error("user interaction '{0}' is declared more than once")]
    DuplicateInteraction(InteractionId),

    #[error("expected answer is invalid: {0}")]
    InvalidExpectedAnswer(String),

    #[error("task '{0}' already resolved to a terminal outcome")]
    TaskAlreadyResolved(TaskName),

    #[error("task '{0}' returned without resolving or expecting an answer")]
    TaskUnsettled(TaskName),

    #[error("step '{0}' did not settle its tasks")]
    StepUnsettled(String),

    #[error("invalid path '{0}'")]
    InvalidPath(String),

    #[error("path '{0}' does not resolve to a live task")]
    PathNotFound(String),

    #[error("task at '{0}' is not awaiting an answer")]
    NoAwaitingTask(String),

    #[error("process is already terminal")]
    ProcessTerminal,

    #[error("field '{0}' is not declared on this process")]
    UnknownField(String),

    #[error("init rejected: {0}")]
    InitRejected(String),

    #[error("invalid process definition: {0}")]
    InvalidDefinition(String),

    #[error(transparent)]
    State(#[from] StateError),
}
