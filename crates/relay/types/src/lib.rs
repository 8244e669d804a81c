//! Domain types for the Relay workflow engine
//!
//! The vocabulary shared by the engine and its collaborators: identifier
//! newtypes, the outcome vocabulary, task paths, signed single-use
//! tickets, expected answers, the inbound/outbound wire messages, and
//! human-interaction descriptors.

#![deny(unsafe_code)]

pub mod answer;
pub mod command;
pub mod error;
pub mod ids;
pub mod interaction;
pub mod outcome;
pub mod path;
pub mod ticket;

pub use answer::{AnswerMessage, CallbackTicket, ExpectedAnswer, Payload, Requester};
pub use command::{JobHandle, ProcessCommand, PullRequestDescriptor};
pub use error::{EngineError, EngineResult};
pub use ids::{
    CacheKey, CallbackId, InteractionId, JobId, ProcessId, QueueName, RoleId, StorageKey, TaskName,
};
pub use interaction::{InteractionDescriptor, UiCondition, UiControl, UiItem, UiOption};
pub use outcome::Outcome;
pub use path::{Path, StepLocator};
pub use ticket::{SecretProvider, StaticSecret, Ticket};
