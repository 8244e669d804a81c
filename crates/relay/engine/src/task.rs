//! Tasks: the smallest unit of workflow logic
//!
//! A task pairs a [`TaskProgram`] with its managed state. Lifecycle:
//! `PENDING -> ACTIVE -> (OK | FAILED | AWAITING_ANSWER)`; a validated
//! inbound answer re-enters the program, which may resolve the task or
//! expect a new answer (the re-ask pattern).
//!
//! The exactly-once guarantee lives in [`Task::execute_answer`]: the
//! ticket is matched and consumed before the handler body runs, so a
//! duplicate delivery fails even while the first handler is still
//! executing.

use crate::context::{TaskContext, TaskEnv};
use crate::gate::AnswerGate;
use crate::program::{Answer, HandlerRegistry, TaskProgram, TaskResult};
use chrono::{DateTime, Utc};
use relay_state::{serde_field, StateManager, StateRecord, StateResult};
use relay_types::{
    AnswerMessage, CallbackTicket, EngineError, EngineResult, ExpectedAnswer,
    InteractionDescriptor, InteractionId, Outcome, Path, SecretProvider, TaskName,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::fields::ProcessFields;

// ── Task State ───────────────────────────────────────────────────────

/// One timestamped entry of a task's audit history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The task outcome when the entry was recorded
    pub outcome: Outcome,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// The managed state of one task.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskState {
    pub outcome: Outcome,
    pub expected_answer: Option<ExpectedAnswer>,
    pub history: Vec<HistoryEntry>,
}

impl TaskState {
    pub(crate) fn record(&mut self, message: impl Into<String>) {
        self.history.push(HistoryEntry {
            outcome: self.outcome,
            message: message.into(),
            at: Utc::now(),
        });
    }

    pub(crate) fn resolve(
        &mut self,
        name: &TaskName,
        outcome: Outcome,
        message: String,
    ) -> EngineResult<()> {
        if self.outcome.is_terminal() {
            return Err(EngineError::TaskAlreadyResolved(name.clone()));
        }
        self.outcome = outcome;
        // a terminal task holds no expectation
        self.expected_answer = None;
        self.record(message);
        Ok(())
    }
}

fn state_manager() -> StateResult<StateManager<TaskState>> {
    StateManager::new(vec![
        serde_field("outcome", |s: &TaskState| &s.outcome, |s, v| s.outcome = v),
        serde_field(
            "expected_answer",
            |s: &TaskState| &s.expected_answer,
            |s, v| s.expected_answer = v,
        ),
        serde_field("history", |s: &TaskState| &s.history, |s, v| s.history = v),
    ])
}

// ── Task ─────────────────────────────────────────────────────────────

/// A named task instance inside a step.
pub struct Task {
    name: TaskName,
    program: Arc<dyn TaskProgram>,
    registry: HandlerRegistry,
    manager: StateManager<TaskState>,
    state: TaskState,
}

impl Task {
    /// Build a brand-new task. The program's declared identifiers are
    /// checked here.
    pub(crate) fn fresh(name: TaskName, program: Arc<dyn TaskProgram>) -> EngineResult<Self> {
        let registry = HandlerRegistry::from_program(program.as_ref())?;
        let manager = state_manager()?;
        let state = manager.fresh();
        Ok(Self {
            name,
            program,
            registry,
            manager,
            state,
        })
    }

    /// Restore a task from its persisted record.
    ///
    /// A present expected answer is re-validated against the registry and
    /// the current secret; a tampered record is rejected here, on load.
    pub(crate) fn restore(
        name: TaskName,
        program: Arc<dyn TaskProgram>,
        record: &StateRecord,
        secret: &dyn SecretProvider,
    ) -> EngineResult<Self> {
        let registry = HandlerRegistry::from_program(program.as_ref())?;
        let manager = state_manager()?;
        let state = manager.restore(record)?;
        if let Some(expected) = &state.expected_answer {
            AnswerGate::validate(expected, &registry, secret)?;
        }
        Ok(Self {
            name,
            program,
            registry,
            manager,
            state,
        })
    }

    pub(crate) fn serialize(&self) -> StateRecord {
        self.manager.serialize(&self.state)
    }

    pub fn name(&self) -> &TaskName {
        &self.name
    }

    pub fn outcome(&self) -> Outcome {
        self.state.outcome
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.state.history
    }

    pub fn expected_answer(&self) -> Option<&ExpectedAnswer> {
        self.state.expected_answer.as_ref()
    }

    pub fn is_awaiting(&self) -> bool {
        self.state.outcome == Outcome::AwaitingAnswer
    }

    /// The interaction this task currently asks a human for, with the
    /// pair the form must echo back. Continuation args stay internal.
    pub fn requested_interaction(
        &self,
        fields: &ProcessFields,
    ) -> Option<(InteractionId, InteractionDescriptor, CallbackTicket)> {
        let expected = self.state.expected_answer.as_ref()?;
        let interaction = expected.interaction.as_ref()?;
        let descriptor = self.program.describe_interaction(interaction, fields)?;
        Some((interaction.clone(), descriptor, expected.callback_ticket()))
    }

    /// Run the program's activation logic once.
    pub(crate) async fn activate(&mut self, env: &mut TaskEnv<'_>) -> EngineResult<()> {
        self.state.outcome = Outcome::Active;
        self.state.record("activated");
        tracing::debug!(task = %self.name, "task activated");

        let program = Arc::clone(&self.program);
        let path = Path::new(env.process.clone(), env.locator, self.name.clone());
        let mut ctx = TaskContext::new(
            &self.name,
            &mut self.state,
            &self.registry,
            &mut *env.fields,
            env.resources,
            env.secret,
            path,
        );
        let result = program.activate(&mut ctx).await;
        self.settle("activation", result)
    }

    /// Apply an inbound answer.
    ///
    /// The ticket is matched and consumed before the handler runs; a
    /// mismatch rejects the message without any state change.
    pub(crate) async fn execute_answer(
        &mut self,
        env: &mut TaskEnv<'_>,
        message: &AnswerMessage,
    ) -> EngineResult<()> {
        let expected = {
            let mut gate =
                AnswerGate::new(&mut self.state.expected_answer, &self.registry, env.secret);
            if !gate.is_expected(&message.callback, &message.ticket) {
                return Err(EngineError::AnswerNotExpected {
                    callback: message.callback.clone(),
                    ticket: message.ticket.clone(),
                });
            }
            match gate.consume() {
                Some(expected) => expected,
                None => {
                    return Err(EngineError::AnswerNotExpected {
                        callback: message.callback.clone(),
                        ticket: message.ticket.clone(),
                    })
                }
            }
        };

        self.state.outcome = Outcome::Active;
        self.state.record(format!(
            "answer for '{}' accepted from '{}'",
            expected.callback, message.requester
        ));
        tracing::info!(
            task = %self.name,
            callback = %expected.callback,
            requester = %message.requester,
            "answer accepted"
        );

        let answer = Answer {
            requester: message.requester.clone(),
            payload: message.payload.clone(),
            continuation: expected.continuation.clone(),
        };
        let program = Arc::clone(&self.program);
        let path = Path::new(env.process.clone(), env.locator, self.name.clone());
        let mut ctx = TaskContext::new(
            &self.name,
            &mut self.state,
            &self.registry,
            &mut *env.fields,
            env.resources,
            env.secret,
            path,
        );
        let result = program.on_answer(&expected.callback, answer, &mut ctx).await;
        self.settle("answer handling", result)
    }

    /// Enforce that a program hook left the task settled: resolved,
    /// failed, or suspended on a new expected answer. A program error
    /// becomes a FAILED outcome carrying the error text.
    fn settle(&mut self, phase: &str, result: TaskResult) -> EngineResult<()> {
        match result {
            Ok(()) => {
                if self.state.outcome == Outcome::Active {
                    return Err(EngineError::TaskUnsettled(self.name.clone()));
                }
                Ok(())
            }
            Err(error) => {
                tracing::warn!(task = %self.name, error = %error, "{phase} failed");
                if self.state.outcome.is_terminal() {
                    return Ok(());
                }
                self.state.resolve(
                    &self.name,
                    Outcome::Failed,
                    format!("{phase} failed: {error}"),
                )?;
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish()
    }
}
