//! Task context: what a task program can see and do
//!
//! A [`TaskContext`] is handed to a program during activation and answer
//! handling. It is the only way a program mutates workflow state, so
//! every transition funnels through the same synchronization point.

use crate::fields::ProcessFields;
use crate::gate::AnswerGate;
use crate::program::HandlerRegistry;
use crate::task::TaskState;
use relay_resources::ExternalResources;
use relay_types::{
    CallbackId, CallbackTicket, EngineResult, InteractionId, Outcome, Path, ProcessCommand,
    ProcessId, SecretProvider, StepLocator, TaskName,
};
use serde_json::Value;

/// The borrowed environment a process hands down when running a task.
pub(crate) struct TaskEnv<'a> {
    pub process: &'a ProcessId,
    pub locator: StepLocator,
    pub fields: &'a mut ProcessFields,
    pub resources: &'a dyn ExternalResources,
    pub secret: &'a dyn SecretProvider,
}

/// Environment of a running task program.
pub struct TaskContext<'a> {
    name: &'a TaskName,
    state: &'a mut TaskState,
    registry: &'a HandlerRegistry,
    fields: &'a mut ProcessFields,
    resources: &'a dyn ExternalResources,
    secret: &'a dyn SecretProvider,
    path: Path,
}

impl<'a> TaskContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: &'a TaskName,
        state: &'a mut TaskState,
        registry: &'a HandlerRegistry,
        fields: &'a mut ProcessFields,
        resources: &'a dyn ExternalResources,
        secret: &'a dyn SecretProvider,
        path: Path,
    ) -> Self {
        Self {
            name,
            state,
            registry,
            fields,
            resources,
            secret,
            path,
        }
    }

    /// Address of this task, for embedding in outbound commands.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn task_name(&self) -> &TaskName {
        self.name
    }

    pub fn fields(&self) -> &ProcessFields {
        self.fields
    }

    pub fn fields_mut(&mut self) -> &mut ProcessFields {
        self.fields
    }

    pub fn resources(&self) -> &dyn ExternalResources {
        self.resources
    }

    /// Append a human-readable entry to the task's audit history.
    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(task = %self.name, "{message}");
        self.state.record(message);
    }

    /// Suspend the task until an answer for `callback` arrives.
    ///
    /// Returns the `(callback, ticket)` pair to embed in any command sent
    /// out; `continuation` is replayed to the handler on resumption and
    /// never leaves the engine.
    pub fn expect_answer(
        &mut self,
        label: &str,
        callback: CallbackId,
        interaction: Option<InteractionId>,
        continuation: Vec<Value>,
    ) -> EngineResult<CallbackTicket> {
        let mut gate = AnswerGate::new(&mut self.state.expected_answer, self.registry, self.secret);
        let callback_ticket = gate.issue(callback, interaction, continuation)?;
        self.state.outcome = Outcome::AwaitingAnswer;
        self.state.record(format!("waiting for {label}"));
        tracing::debug!(
            task = %self.name,
            callback = %callback_ticket.callback,
            "expected answer set"
        );
        Ok(callback_ticket)
    }

    /// Build the outbound command for a previously issued pair.
    pub fn command(&self, callback_ticket: CallbackTicket) -> ProcessCommand {
        ProcessCommand::new(
            self.path.clone(),
            callback_ticket,
            self.resources.answer_queue().clone(),
        )
    }

    /// Resolve the task OK. Terminal outcomes are immutable.
    pub fn resolve_ok(&mut self, message: impl Into<String>) -> EngineResult<()> {
        self.state.resolve(self.name, Outcome::Ok, message.into())?;
        tracing::info!(task = %self.name, "task resolved OK");
        Ok(())
    }

    /// Resolve the task FAILED. Terminal outcomes are immutable.
    pub fn resolve_failed(&mut self, message: impl Into<String>) -> EngineResult<()> {
        self.state.resolve(self.name, Outcome::Failed, message.into())?;
        tracing::info!(task = %self.name, "task resolved FAILED");
        Ok(())
    }
}
