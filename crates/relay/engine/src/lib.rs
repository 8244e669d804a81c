//! The Relay workflow engine
//!
//! Drives long-lived, multi-party workflows that interleave automated
//! remote-worker jobs with human approval steps. Progress is persisted
//! after every transition, so a workflow resumes after a restart or an
//! arbitrarily long wait for an answer.
//!
//! # Architecture
//!
//! A [`Process`] owns an ordered list of steps, a designated fail step,
//! and an optional finally step. A [`Step`] wraps named tasks that run
//! in declared order. A [`Task`] pairs a [`TaskProgram`] (the business
//! logic) with managed state and may suspend on an expected answer.
//!
//! The [`AnswerGate`] is the ticket authority: it issues signed,
//! single-use tickets when a task suspends and consumes them, before any
//! callback body runs, when a matching answer arrives. Of two concurrent
//! deliveries of the same ticket exactly one is admitted; the other is
//! rejected without a state change. A restored process re-validates its
//! outstanding expectation against the injected [`SecretProvider`], so a
//! tampered record fails on load and a rotated secret invalidates every
//! outstanding ticket.
//!
//! [`SecretProvider`]: relay_types::SecretProvider

#![deny(unsafe_code)]

pub mod context;
pub mod definition;
pub mod fields;
pub mod gate;
pub mod process;
pub mod program;
pub mod step;
pub mod task;

pub use context::TaskContext;
pub use definition::{InitPolicy, ProcessDefinition, ProcessDefinitionBuilder};
pub use fields::{value_field, ProcessFields};
pub use gate::AnswerGate;
pub use process::{Cursor, Process, ProcessCore, RequestedInteraction};
pub use program::{Answer, HandlerRegistry, TaskError, TaskProgram, TaskResult};
pub use step::{Step, StepDef};
pub use task::{HistoryEntry, Task, TaskState};
