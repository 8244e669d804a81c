//! Processes: the durable top of the hierarchy
//!
//! A process owns the ordered steps of its normal sequence, the
//! designated fail step, and an optional finally step. It advances
//! through them, routes inbound answers to the exact task a path names,
//! and serializes its full nested state after every transition so the
//! caller can persist it.
//!
//! Failure routing: the first step that reports FAILED sends the process
//! to the fail step, exactly once; the normal sequence is never resumed
//! after that. The finally step runs after either normal completion or
//! the fail step. A terminal process is permanent; the record stays as
//! audit trail.

use crate::context::TaskEnv;
use crate::definition::ProcessDefinition;
use crate::fields::ProcessFields;
use crate::step::Step;
use chrono::{DateTime, Utc};
use relay_resources::ExternalResources;
use relay_state::{serde_field, serde_field_with, StateError, StateManager, StateRecord, StateResult};
use relay_types::{
    AnswerMessage, CallbackTicket, EngineError, EngineResult, InteractionDescriptor, InteractionId,
    Outcome, Path, ProcessId, Requester, SecretProvider, StepLocator,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

// ── Cursor ───────────────────────────────────────────────────────────

/// Where the process currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    /// Running or about to run the step at this locator
    At(StepLocator),
    /// All routing finished; the outcome is final
    Done,
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor::At(StepLocator::Index(0))
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cursor::At(locator) => write!(f, "{locator}"),
            Cursor::Done => write!(f, "done"),
        }
    }
}

// ── Process Core State ───────────────────────────────────────────────

/// Scalar bookkeeping persisted for every process.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessCore {
    pub id: ProcessId,
    pub created: DateTime<Utc>,
    pub requester: String,
    pub cursor: Cursor,
    /// Whether the failure path was entered; never leaves once set
    pub failed: bool,
    pub outcome: Outcome,
}

impl Default for ProcessCore {
    fn default() -> Self {
        Self {
            id: ProcessId::default(),
            created: DateTime::UNIX_EPOCH,
            requester: String::new(),
            cursor: Cursor::default(),
            failed: false,
            outcome: Outcome::default(),
        }
    }
}

fn core_manager() -> StateResult<StateManager<ProcessCore>> {
    StateManager::new(vec![
        serde_field_with(
            "id",
            ProcessId::generate,
            |s: &ProcessCore| &s.id,
            |s, v| s.id = v,
        ),
        serde_field_with(
            "created",
            Utc::now,
            |s: &ProcessCore| &s.created,
            |s, v| s.created = v,
        ),
        serde_field(
            "requester",
            |s: &ProcessCore| &s.requester,
            |s, v| s.requester = v,
        ),
        serde_field("cursor", |s: &ProcessCore| &s.cursor, |s, v| s.cursor = v),
        serde_field("failed", |s: &ProcessCore| &s.failed, |s, v| s.failed = v),
        serde_field("outcome", |s: &ProcessCore| &s.outcome, |s, v| s.outcome = v),
    ])
}

// ── Requested Interaction ────────────────────────────────────────────

/// The human input a process currently asks for, ready for an external
/// surface to render. Continuation args are filtered out.
#[derive(Clone, Debug)]
pub struct RequestedInteraction {
    pub path: Path,
    pub interaction: InteractionId,
    pub descriptor: InteractionDescriptor,
    pub callback_ticket: CallbackTicket,
}

// ── Process ──────────────────────────────────────────────────────────

/// A durable workflow instance.
pub struct Process {
    definition: Arc<ProcessDefinition>,
    resources: Arc<dyn ExternalResources>,
    secret: Arc<dyn SecretProvider>,
    core_manager: StateManager<ProcessCore>,
    core: ProcessCore,
    fields: ProcessFields,
    steps: Vec<Step>,
    fail_step: Step,
    finally_step: Option<Step>,
}

impl Process {
    /// Create a brand-new process.
    ///
    /// The definition's init policy, if any, gates creation; the accepted
    /// init args are assigned through the business field setters. Nothing
    /// of a rejected init reaches persisted state.
    pub async fn fresh(
        definition: Arc<ProcessDefinition>,
        resources: Arc<dyn ExternalResources>,
        secret: Arc<dyn SecretProvider>,
        requester: Requester,
        init_args: Value,
    ) -> EngineResult<Self> {
        let accepted = match definition.init_policy() {
            Some(policy) => policy
                .validate(&requester, &init_args, resources.as_ref())
                .await
                .map_err(EngineError::InitRejected)?,
            None => init_args,
        };

        let core_manager = core_manager()?;
        let mut core = core_manager.fresh();
        core.requester = requester.handle.clone();

        let mut fields = definition.fields().fresh();
        fields.assign_object(accepted)?;

        let steps = definition
            .steps()
            .iter()
            .map(Step::fresh)
            .collect::<EngineResult<Vec<_>>>()?;
        let fail_step = Step::fresh(definition.fail_step())?;
        let finally_step = definition
            .finally_step()
            .map(Step::fresh)
            .transpose()?;

        tracing::info!(
            process_id = %core.id,
            definition = definition.name(),
            requester = %requester,
            "process created"
        );

        Ok(Self {
            definition,
            resources,
            secret,
            core_manager,
            core,
            fields,
            steps,
            fail_step,
            finally_step,
        })
    }

    /// Reconstruct a process from its persisted record. Restore only, no
    /// re-initialization.
    pub fn restore(
        definition: Arc<ProcessDefinition>,
        resources: Arc<dyn ExternalResources>,
        secret: Arc<dyn SecretProvider>,
        record: &StateRecord,
    ) -> EngineResult<Self> {
        let core_manager = core_manager()?;
        let core = core_manager.restore(&sub_record(record, "process")?)?;
        let fields = definition.fields().restore(&sub_record(record, "fields")?)?;

        let steps_raw = record
            .get("steps")
            .ok_or_else(|| StateError::MissingField("steps".to_string()))?;
        let steps_raw = steps_raw.as_array().ok_or_else(|| StateError::Invalid {
            field: "steps".to_string(),
            reason: "must be an array of step records".to_string(),
        })?;
        if steps_raw.len() != definition.steps().len() {
            return Err(EngineError::State(StateError::Invalid {
                field: "steps".to_string(),
                reason: "step count does not match the definition".to_string(),
            }));
        }
        let steps = definition
            .steps()
            .iter()
            .zip(steps_raw)
            .map(|(def, raw)| {
                let step_record = raw.as_object().ok_or_else(|| StateError::Invalid {
                    field: def.name().to_string(),
                    reason: "step record must be an object".to_string(),
                })?;
                Step::restore(def, step_record, secret.as_ref())
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let fail_step = Step::restore(
            definition.fail_step(),
            &sub_record(record, "fail_step")?,
            secret.as_ref(),
        )?;
        let finally_step = match definition.finally_step() {
            Some(def) => Some(Step::restore(
                def,
                &sub_record(record, "finally_step")?,
                secret.as_ref(),
            )?),
            None => None,
        };

        tracing::debug!(process_id = %core.id, "process restored");

        Ok(Self {
            definition,
            resources,
            secret,
            core_manager,
            core,
            fields,
            steps,
            fail_step,
            finally_step,
        })
    }

    /// The full nested record: core state, business fields, and every
    /// step's tasks. Round-trips through [`Process::restore`].
    pub fn serialize(&self) -> StateRecord {
        let mut record = StateRecord::new();
        record.insert(
            "process".to_string(),
            Value::Object(self.core_manager.serialize(&self.core)),
        );
        record.insert(
            "fields".to_string(),
            Value::Object(self.definition.fields().serialize(&self.fields)),
        );
        record.insert(
            "steps".to_string(),
            Value::Array(
                self.steps
                    .iter()
                    .map(|s| Value::Object(s.serialize()))
                    .collect(),
            ),
        );
        record.insert(
            "fail_step".to_string(),
            Value::Object(self.fail_step.serialize()),
        );
        record.insert(
            "finally_step".to_string(),
            match &self.finally_step {
                Some(step) => Value::Object(step.serialize()),
                None => Value::Null,
            },
        );
        record
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> &ProcessId {
        &self.core.id
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.core.created
    }

    pub fn requester(&self) -> &str {
        &self.core.requester
    }

    pub fn outcome(&self) -> Outcome {
        self.core.outcome
    }

    pub fn is_terminal(&self) -> bool {
        self.core.outcome.is_terminal()
    }

    pub fn fields(&self) -> &ProcessFields {
        &self.fields
    }

    pub fn definition(&self) -> &ProcessDefinition {
        &self.definition
    }

    /// The step at a locator, if it exists.
    pub fn step(&self, locator: StepLocator) -> Option<&Step> {
        match locator {
            StepLocator::Index(index) => self.steps.get(index),
            StepLocator::Fail => Some(&self.fail_step),
            StepLocator::Finally => self.finally_step.as_ref(),
        }
    }

    /// Address of the task currently suspended on an answer.
    pub fn awaiting_path(&self) -> Option<Path> {
        let locator = match self.core.cursor {
            Cursor::At(locator) => locator,
            Cursor::Done => return None,
        };
        let task = self.step(locator)?.awaiting_task()?;
        Some(Path::new(self.core.id.clone(), locator, task.name().clone()))
    }

    /// The human interaction currently requested, if the suspended task
    /// asked for one. Worker waits return `None`.
    pub fn requested_interaction(&self) -> Option<RequestedInteraction> {
        let locator = match self.core.cursor {
            Cursor::At(locator) => locator,
            Cursor::Done => return None,
        };
        let task = self.step(locator)?.awaiting_task()?;
        let (interaction, descriptor, callback_ticket) =
            task.requested_interaction(&self.fields)?;
        Some(RequestedInteraction {
            path: Path::new(self.core.id.clone(), locator, task.name().clone()),
            interaction,
            descriptor,
            callback_ticket,
        })
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Activate the current step and keep moving until the process
    /// suspends on an answer or reaches its terminal outcome.
    pub async fn advance(&mut self) -> EngineResult<()> {
        loop {
            let locator = match self.core.cursor {
                Cursor::Done => break,
                Cursor::At(locator) => locator,
            };

            {
                let Self {
                    steps,
                    fail_step,
                    finally_step,
                    fields,
                    core,
                    resources,
                    secret,
                    ..
                } = self;
                let step = match locator {
                    StepLocator::Index(index) => steps.get_mut(index).ok_or_else(|| {
                        EngineError::PathNotFound(format!("{}/{}", core.id, locator))
                    })?,
                    StepLocator::Fail => fail_step,
                    StepLocator::Finally => finally_step.as_mut().ok_or_else(|| {
                        EngineError::PathNotFound(format!("{}/{}", core.id, locator))
                    })?,
                };
                let mut env = TaskEnv {
                    process: &core.id,
                    locator,
                    fields,
                    resources: resources.as_ref(),
                    secret: secret.as_ref(),
                };
                step.advance(&mut env).await?;
            }

            let outcome = self
                .step(locator)
                .map(Step::outcome)
                .unwrap_or(Outcome::Failed);
            match outcome {
                Outcome::AwaitingAnswer => {
                    self.core.outcome = Outcome::AwaitingAnswer;
                    break;
                }
                Outcome::Ok => {
                    tracing::info!(process_id = %self.core.id, step = %locator, "step completed");
                    self.step_past(locator);
                }
                Outcome::Failed => {
                    if !self.core.failed && matches!(locator, StepLocator::Index(_)) {
                        // first failure routes to the designated fail step, once
                        self.core.failed = true;
                        self.core.cursor = Cursor::At(StepLocator::Fail);
                        tracing::warn!(
                            process_id = %self.core.id,
                            step = %locator,
                            "step failed, entering failure path"
                        );
                    } else {
                        self.core.failed = true;
                        self.step_past(locator);
                    }
                }
                Outcome::Pending | Outcome::Active => {
                    return Err(EngineError::StepUnsettled(locator.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Route an inbound answer to the task its path names, execute it,
    /// and propagate the resulting transitions.
    ///
    /// Routing failures leave process state untouched.
    pub async fn apply_answer(&mut self, message: &AnswerMessage) -> EngineResult<()> {
        if self.is_terminal() {
            return Err(EngineError::ProcessTerminal);
        }
        if message.target.process != self.core.id {
            return Err(EngineError::PathNotFound(message.target.to_string()));
        }

        {
            let Self {
                steps,
                fail_step,
                finally_step,
                fields,
                core,
                resources,
                secret,
                ..
            } = self;
            let locator = message.target.step;
            let step = match locator {
                StepLocator::Index(index) => steps
                    .get_mut(index)
                    .ok_or_else(|| EngineError::PathNotFound(message.target.to_string()))?,
                StepLocator::Fail => fail_step,
                StepLocator::Finally => finally_step
                    .as_mut()
                    .ok_or_else(|| EngineError::PathNotFound(message.target.to_string()))?,
            };
            let task = step
                .task_mut(&message.target.task)
                .ok_or_else(|| EngineError::PathNotFound(message.target.to_string()))?;
            if !task.is_awaiting() {
                return Err(EngineError::NoAwaitingTask(message.target.to_string()));
            }
            let mut env = TaskEnv {
                process: &core.id,
                locator,
                fields,
                resources: resources.as_ref(),
                secret: secret.as_ref(),
            };
            task.execute_answer(&mut env, message).await?;
        }

        self.advance().await
    }

    /// Move the cursor past a finished step.
    fn step_past(&mut self, locator: StepLocator) {
        let next = match locator {
            StepLocator::Index(index)
                if !self.core.failed && index + 1 < self.steps.len() =>
            {
                Cursor::At(StepLocator::Index(index + 1))
            }
            StepLocator::Index(_) | StepLocator::Fail => match self.finally_step {
                Some(_) => Cursor::At(StepLocator::Finally),
                None => Cursor::Done,
            },
            StepLocator::Finally => Cursor::Done,
        };
        self.core.cursor = next;
        if next == Cursor::Done {
            self.core.outcome = if self.core.failed {
                Outcome::Failed
            } else {
                Outcome::Ok
            };
            tracing::info!(
                process_id = %self.core.id,
                outcome = %self.core.outcome,
                "process finished"
            );
        }
    }
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.core.id)
            .field("cursor", &self.core.cursor)
            .field("outcome", &self.core.outcome)
            .finish()
    }
}

fn sub_record(record: &StateRecord, name: &str) -> Result<StateRecord, StateError> {
    let raw = record
        .get(name)
        .ok_or_else(|| StateError::MissingField(name.to_string()))?;
    match raw {
        Value::Object(map) => Ok(map.clone()),
        _ => Err(StateError::Invalid {
            field: name.to_string(),
            reason: "must be an object".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TaskContext;
    use crate::fields::value_field;
    use crate::program::{TaskProgram, TaskResult};
    use crate::step::StepDef;
    use async_trait::async_trait;
    use relay_resources::InMemoryResources;
    use relay_types::{CallbackId, Payload, StaticSecret, TaskName, Ticket};
    use serde_json::json;

    struct AutoOk;

    #[async_trait]
    impl TaskProgram for AutoOk {
        async fn activate(&self, ctx: &mut TaskContext<'_>) -> TaskResult {
            ctx.resolve_ok("done")?;
            Ok(())
        }
    }

    struct AutoFail;

    #[async_trait]
    impl TaskProgram for AutoFail {
        async fn activate(&self, ctx: &mut TaskContext<'_>) -> TaskResult {
            ctx.resolve_failed("broken")?;
            Ok(())
        }
    }

    struct Ask;

    #[async_trait]
    impl TaskProgram for Ask {
        fn callbacks(&self) -> Vec<CallbackId> {
            vec![CallbackId::new("confirm")]
        }

        async fn activate(&self, ctx: &mut TaskContext<'_>) -> TaskResult {
            ctx.expect_answer("confirmation", CallbackId::new("confirm"), None, Vec::new())?;
            Ok(())
        }

        async fn on_answer(
            &self,
            _callback: &CallbackId,
            _answer: crate::program::Answer,
            ctx: &mut TaskContext<'_>,
        ) -> TaskResult {
            ctx.resolve_ok("confirmed")?;
            Ok(())
        }
    }

    struct RejectAll;

    #[async_trait]
    impl crate::definition::InitPolicy for RejectAll {
        async fn validate(
            &self,
            _requester: &Requester,
            _args: &Value,
            _resources: &dyn ExternalResources,
        ) -> Result<Value, String> {
            Err("not today".to_string())
        }
    }

    fn definition(first: Arc<dyn TaskProgram>) -> Arc<ProcessDefinition> {
        Arc::new(
            ProcessDefinition::builder("test")
                .field(value_field("note"))
                .step(StepDef::new("First").task("First", first))
                .step(StepDef::new("Second").task("Second", Arc::new(AutoOk)))
                .fail_step(StepDef::new("Failure").task("Fail", Arc::new(AutoOk)))
                .finally_step(StepDef::new("Wrapup").task("WrapUp", Arc::new(AutoOk)))
                .build()
                .unwrap(),
        )
    }

    async fn make_process(first: Arc<dyn TaskProgram>) -> Process {
        Process::fresh(
            definition(first),
            Arc::new(InMemoryResources::new()),
            Arc::new(StaticSecret::new(b"process-tests".to_vec())),
            Requester::new("initiator"),
            json!({"note": "hello"}),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn straight_run_finishes_ok_through_finally() {
        let mut process = make_process(Arc::new(AutoOk)).await;
        assert_eq!(process.outcome(), Outcome::Pending);
        assert_eq!(process.fields().str_value("note"), Some("hello"));

        process.advance().await.unwrap();
        assert_eq!(process.outcome(), Outcome::Ok);
        assert!(process.is_terminal());
        assert_eq!(
            process.step(StepLocator::Finally).unwrap().outcome(),
            Outcome::Ok
        );
        // the fail step never ran
        assert_eq!(
            process.step(StepLocator::Fail).unwrap().outcome(),
            Outcome::Pending
        );
    }

    #[tokio::test]
    async fn first_failure_routes_to_the_fail_step_once() {
        let mut process = make_process(Arc::new(AutoFail)).await;
        process.advance().await.unwrap();

        assert_eq!(process.outcome(), Outcome::Failed);
        assert_eq!(
            process.step(StepLocator::Fail).unwrap().outcome(),
            Outcome::Ok
        );
        assert_eq!(
            process.step(StepLocator::Finally).unwrap().outcome(),
            Outcome::Ok
        );
        // the second normal step never activated
        assert_eq!(
            process
                .step(StepLocator::Index(1))
                .unwrap()
                .task(&TaskName::new("Second"))
                .unwrap()
                .outcome(),
            Outcome::Pending
        );
    }

    #[tokio::test]
    async fn suspension_surfaces_the_awaiting_path() {
        let mut process = make_process(Arc::new(Ask)).await;
        process.advance().await.unwrap();

        assert_eq!(process.outcome(), Outcome::AwaitingAnswer);
        let path = process.awaiting_path().unwrap();
        assert_eq!(path.step, StepLocator::Index(0));
        assert_eq!(path.task, TaskName::new("First"));
        // a worker wait requests no human interaction
        assert!(process.requested_interaction().is_none());
    }

    #[tokio::test]
    async fn answer_moves_the_process_forward() {
        let mut process = make_process(Arc::new(Ask)).await;
        process.advance().await.unwrap();

        let path = process.awaiting_path().unwrap();
        let expected = process
            .step(path.step)
            .unwrap()
            .task(&path.task)
            .unwrap()
            .expected_answer()
            .unwrap()
            .clone();
        let message = AnswerMessage::new(
            path,
            expected.callback,
            expected.ticket,
            Requester::new("reviewer"),
            Payload::Document(json!({})),
        );
        process.apply_answer(&message).await.unwrap();
        assert_eq!(process.outcome(), Outcome::Ok);

        // terminal processes reject further messages
        let result = process.apply_answer(&message).await;
        assert!(matches!(result, Err(EngineError::ProcessTerminal)));
    }

    #[tokio::test]
    async fn routing_errors_leave_state_untouched() {
        let mut process = make_process(Arc::new(Ask)).await;
        process.advance().await.unwrap();
        let before = process.serialize();

        let path = process.awaiting_path().unwrap();
        let bogus_ticket = Ticket("1970-01-01T00:00:00Z;junk".into());

        // wrong process id
        let mut message = AnswerMessage::new(
            Path::new(ProcessId::new("other"), path.step, path.task.clone()),
            CallbackId::new("confirm"),
            bogus_ticket.clone(),
            Requester::new("reviewer"),
            Payload::Document(json!({})),
        );
        assert!(matches!(
            process.apply_answer(&message).await,
            Err(EngineError::PathNotFound(_))
        ));

        // step out of range
        message.target = Path::new(process.id().clone(), StepLocator::Index(9), path.task.clone());
        assert!(matches!(
            process.apply_answer(&message).await,
            Err(EngineError::PathNotFound(_))
        ));

        // unknown task name
        message.target = Path::new(process.id().clone(), path.step, TaskName::new("Nope"));
        assert!(matches!(
            process.apply_answer(&message).await,
            Err(EngineError::PathNotFound(_))
        ));

        // task exists but is not awaiting
        message.target = Path::new(
            process.id().clone(),
            StepLocator::Index(1),
            TaskName::new("Second"),
        );
        assert!(matches!(
            process.apply_answer(&message).await,
            Err(EngineError::NoAwaitingTask(_))
        ));

        // valid target, wrong ticket
        message.target = path;
        assert!(matches!(
            process.apply_answer(&message).await,
            Err(EngineError::AnswerNotExpected { .. })
        ));

        assert_eq!(process.serialize(), before);
    }

    #[tokio::test]
    async fn record_roundtrips_to_an_equivalent_process() {
        let mut process = make_process(Arc::new(Ask)).await;
        process.advance().await.unwrap();
        let record = process.serialize();

        let restored = Process::restore(
            definition(Arc::new(Ask)),
            Arc::new(InMemoryResources::new()),
            Arc::new(StaticSecret::new(b"process-tests".to_vec())),
            &record,
        )
        .unwrap();
        assert_eq!(restored.id(), process.id());
        assert_eq!(restored.outcome(), Outcome::AwaitingAnswer);
        assert_eq!(restored.awaiting_path(), process.awaiting_path());
        assert_eq!(restored.serialize(), record);
    }

    #[tokio::test]
    async fn rejected_init_creates_nothing() {
        let definition = Arc::new(
            ProcessDefinition::builder("gated")
                .step(StepDef::new("Only").task("Only", Arc::new(AutoOk)))
                .fail_step(StepDef::new("Failure").task("Fail", Arc::new(AutoOk)))
                .init_policy(Arc::new(RejectAll))
                .build()
                .unwrap(),
        );
        let result = Process::fresh(
            definition,
            Arc::new(InMemoryResources::new()),
            Arc::new(StaticSecret::new(b"process-tests".to_vec())),
            Requester::new("initiator"),
            json!({}),
        )
        .await;
        assert!(matches!(result, Err(EngineError::InitRejected(reason)) if reason == "not today"));
    }

    #[tokio::test]
    async fn process_without_finally_step_terminates_after_last_step() {
        let definition = Arc::new(
            ProcessDefinition::builder("plain")
                .step(StepDef::new("Only").task("Only", Arc::new(AutoOk)))
                .fail_step(StepDef::new("Failure").task("Fail", Arc::new(AutoOk)))
                .build()
                .unwrap(),
        );
        let mut process = Process::fresh(
            definition,
            Arc::new(InMemoryResources::new()),
            Arc::new(StaticSecret::new(b"process-tests".to_vec())),
            Requester::new("initiator"),
            Value::Null,
        )
        .await
        .unwrap();
        process.advance().await.unwrap();
        assert_eq!(process.outcome(), Outcome::Ok);
    }
}
