//! Task programs: the business logic a task runs
//!
//! A [`TaskProgram`] supplies a task's activation logic, its callback
//! handlers, and the human-interaction descriptors it can request. The
//! callback and interaction identifiers are declared up front and
//! collected into a [`HandlerRegistry`] when the task is built, so an
//! unknown or duplicate identifier fails at construction, not at call
//! time.

use crate::context::TaskContext;
use crate::fields::ProcessFields;
use async_trait::async_trait;
use relay_resources::ResourceError;
use relay_types::{
    CallbackId, EngineError, EngineResult, InteractionDescriptor, InteractionId, Payload, Requester,
};
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

// ── Task Errors ──────────────────────────────────────────────────────

/// Failure surfaced by a task program.
///
/// Caught at the task boundary and converted into a FAILED outcome
/// carrying the error text; it never propagates as an unhandled fault.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A collaborator call was rejected
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// The program decided the task cannot proceed
    #[error("{0}")]
    Failed(String),

    /// An engine operation inside the program failed
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }
}

/// Result type for task program hooks.
pub type TaskResult = Result<(), TaskError>;

// ── Answer ───────────────────────────────────────────────────────────

/// What a consumed expected answer hands to the callback handler.
#[derive(Clone, Debug)]
pub struct Answer {
    pub requester: Requester,
    pub payload: Payload,
    /// Continuation args captured when the answer was expected
    pub continuation: Vec<Value>,
}

// ── Task Program ─────────────────────────────────────────────────────

/// Business logic of one task.
#[async_trait]
pub trait TaskProgram: Send + Sync {
    /// Callback identifiers this program handles.
    fn callbacks(&self) -> Vec<CallbackId> {
        Vec::new()
    }

    /// Interaction identifiers this program can request from a human.
    fn interactions(&self) -> Vec<InteractionId> {
        Vec::new()
    }

    /// Runs once when the task becomes current. Must end by expecting an
    /// answer or resolving the task.
    async fn activate(&self, ctx: &mut TaskContext<'_>) -> TaskResult;

    /// Invoked after a matching answer was validated and its ticket
    /// consumed. Must end by expecting a new answer or resolving.
    async fn on_answer(
        &self,
        callback: &CallbackId,
        answer: Answer,
        ctx: &mut TaskContext<'_>,
    ) -> TaskResult {
        let _ = (answer, ctx);
        Err(TaskError::failed(format!(
            "no handler bound for callback '{callback}'"
        )))
    }

    /// Produce the form description for one of the declared interactions.
    fn describe_interaction(
        &self,
        interaction: &InteractionId,
        fields: &ProcessFields,
    ) -> Option<InteractionDescriptor> {
        let _ = (interaction, fields);
        None
    }
}

// ── Handler Registry ─────────────────────────────────────────────────

/// The callback and interaction identifiers one task may use.
#[derive(Clone, Debug, Default)]
pub struct HandlerRegistry {
    callbacks: BTreeSet<CallbackId>,
    interactions: BTreeSet<InteractionId>,
}

impl HandlerRegistry {
    /// Build a registry from explicit identifier lists, rejecting
    /// duplicates.
    pub fn from_parts(
        callbacks: Vec<CallbackId>,
        interactions: Vec<InteractionId>,
    ) -> EngineResult<Self> {
        let mut registry = Self::default();
        for callback in callbacks {
            if !registry.callbacks.insert(callback.clone()) {
                return Err(EngineError::DuplicateCallback(callback));
            }
        }
        for interaction in interactions {
            if !registry.interactions.insert(interaction.clone()) {
                return Err(EngineError::DuplicateInteraction(interaction));
            }
        }
        Ok(registry)
    }

    /// Build the registry a program declares.
    pub fn from_program(program: &dyn TaskProgram) -> EngineResult<Self> {
        Self::from_parts(program.callbacks(), program.interactions())
    }

    pub fn has_callback(&self, callback: &CallbackId) -> bool {
        self.callbacks.contains(callback)
    }

    pub fn has_interaction(&self, interaction: &InteractionId) -> bool {
        self.interactions.contains(interaction)
    }
}
