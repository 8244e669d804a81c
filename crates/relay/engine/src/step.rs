//! Steps: named groups of tasks
//!
//! A step wraps an ordered set of named tasks. Tasks run strictly in
//! declared order: the task at position n+1 activates only after the
//! task at position n resolved OK. The step offers no cross-task
//! synchronization, and all tasks mutate the one shared process state.
//!
//! Outcome aggregation: FAILED as soon as any task fails, OK only once
//! every task resolved OK.

use crate::context::TaskEnv;
use crate::program::TaskProgram;
use crate::task::Task;
use relay_state::{StateError, StateRecord};
use relay_types::{EngineError, EngineResult, Outcome, SecretProvider, TaskName};
use serde_json::Value;
use std::sync::Arc;

// ── Step Definition ──────────────────────────────────────────────────

/// Blueprint of one step: named task programs in activation order.
#[derive(Clone)]
pub struct StepDef {
    name: String,
    tasks: Vec<(TaskName, Arc<dyn TaskProgram>)>,
}

impl StepDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Append a named task.
    pub fn task(mut self, name: impl Into<String>, program: Arc<dyn TaskProgram>) -> Self {
        self.tasks.push((TaskName::new(name), program));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn tasks(&self) -> &[(TaskName, Arc<dyn TaskProgram>)] {
        &self.tasks
    }

    /// Check the definition is usable: at least one task, unique task
    /// names, and every program's identifier registry builds.
    pub(crate) fn validate(&self) -> EngineResult<()> {
        if self.tasks.is_empty() {
            return Err(EngineError::InvalidDefinition(format!(
                "step '{}' declares no tasks",
                self.name
            )));
        }
        for (index, (name, program)) in self.tasks.iter().enumerate() {
            if self.tasks[..index].iter().any(|(other, _)| other == name) {
                return Err(EngineError::InvalidDefinition(format!(
                    "step '{}' declares task '{}' twice",
                    self.name, name
                )));
            }
            crate::program::HandlerRegistry::from_program(program.as_ref())?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for StepDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDef")
            .field("name", &self.name)
            .field("tasks", &self.tasks.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

// ── Step ─────────────────────────────────────────────────────────────

/// A live step instance.
#[derive(Debug)]
pub struct Step {
    name: String,
    tasks: Vec<Task>,
}

impl Step {
    pub(crate) fn fresh(def: &StepDef) -> EngineResult<Self> {
        let tasks = def
            .tasks()
            .iter()
            .map(|(name, program)| Task::fresh(name.clone(), Arc::clone(program)))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Self {
            name: def.name().to_string(),
            tasks,
        })
    }

    /// Restore a step: one record per declared task, keyed by task name.
    pub(crate) fn restore(
        def: &StepDef,
        record: &StateRecord,
        secret: &dyn SecretProvider,
    ) -> EngineResult<Self> {
        let mut tasks = Vec::with_capacity(def.tasks().len());
        for (name, program) in def.tasks() {
            let raw = record
                .get(&name.0)
                .ok_or_else(|| StateError::MissingField(name.0.clone()))?;
            let task_record = match raw {
                Value::Object(map) => map,
                _ => {
                    return Err(EngineError::State(StateError::Invalid {
                        field: name.0.clone(),
                        reason: "task record must be an object".to_string(),
                    }))
                }
            };
            tasks.push(Task::restore(
                name.clone(),
                Arc::clone(program),
                task_record,
                secret,
            )?);
        }
        Ok(Self {
            name: def.name().to_string(),
            tasks,
        })
    }

    /// The step's persisted record: task name to task record.
    pub(crate) fn serialize(&self) -> StateRecord {
        let mut record = StateRecord::new();
        for task in &self.tasks {
            record.insert(task.name().0.clone(), Value::Object(task.serialize()));
        }
        record
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, name: &TaskName) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name() == name)
    }

    pub(crate) fn task_mut(&mut self, name: &TaskName) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.name() == name)
    }

    /// The task currently suspended on an answer, if any.
    pub fn awaiting_task(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.is_awaiting())
    }

    /// Run tasks forward in declared order until one suspends, one
    /// fails, or all are OK.
    pub(crate) async fn advance(&mut self, env: &mut TaskEnv<'_>) -> EngineResult<()> {
        for task in &mut self.tasks {
            if task.outcome() == Outcome::Pending {
                task.activate(env).await?;
            }
            if task.outcome() != Outcome::Ok {
                break;
            }
        }
        Ok(())
    }

    /// Aggregate the tasks' outcomes.
    pub fn outcome(&self) -> Outcome {
        let mut all_ok = true;
        let mut all_pending = true;
        for task in &self.tasks {
            match task.outcome() {
                Outcome::Failed => return Outcome::Failed,
                Outcome::AwaitingAnswer => return Outcome::AwaitingAnswer,
                Outcome::Active => return Outcome::Active,
                Outcome::Ok => all_pending = false,
                Outcome::Pending => all_ok = false,
            }
        }
        if all_ok {
            Outcome::Ok
        } else if all_pending {
            Outcome::Pending
        } else {
            Outcome::Active
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TaskContext;
    use crate::fields::ProcessFields;
    use crate::program::{TaskProgram, TaskResult};
    use async_trait::async_trait;
    use relay_resources::InMemoryResources;
    use relay_types::{
        AnswerMessage, CallbackId, Path, Payload, ProcessId, Requester, StaticSecret, StepLocator,
    };
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

    struct Fixture {
        fields: ProcessFields,
        resources: InMemoryResources,
        secret: StaticSecret,
        process: ProcessId,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                fields: ProcessFields::default(),
                resources: InMemoryResources::new(),
                secret: StaticSecret::new(b"step-tests".to_vec()),
                process: ProcessId::new("proc-1"),
            }
        }

        fn env(&mut self) -> TaskEnv<'_> {
            TaskEnv {
                process: &self.process,
                locator: StepLocator::Index(0),
                fields: &mut self.fields,
                resources: &self.resources,
                secret: &self.secret,
            }
        }
    }

    #[test]
    fn definition_validation() {
        assert!(matches!(
            StepDef::new("Empty").validate(),
            Err(EngineError::InvalidDefinition(_))
        ));

        let duplicated = StepDef::new("Dup")
            .task("A", Arc::new(AutoOk))
            .task("A", Arc::new(AutoOk));
        assert!(matches!(
            duplicated.validate(),
            Err(EngineError::InvalidDefinition(_))
        ));

        let valid = StepDef::new("Ok").task("A", Arc::new(AutoOk));
        assert!(valid.validate().is_ok());
    }

    #[tokio::test]
    async fn tasks_run_in_declared_order_and_aggregate_ok() {
        let def = StepDef::new("Both")
            .task("First", Arc::new(AutoOk))
            .task("Second", Arc::new(AutoOk));
        let mut step = Step::fresh(&def).unwrap();
        assert_eq!(step.outcome(), Outcome::Pending);

        let mut fixture = Fixture::new();
        step.advance(&mut fixture.env()).await.unwrap();
        assert_eq!(step.outcome(), Outcome::Ok);
    }

    #[tokio::test]
    async fn successor_waits_until_predecessor_resolves() {
        let def = StepDef::new("Gated")
            .task("Gate", Arc::new(Ask))
            .task("After", Arc::new(AutoOk));
        let mut step = Step::fresh(&def).unwrap();
        let mut fixture = Fixture::new();

        step.advance(&mut fixture.env()).await.unwrap();
        assert_eq!(step.outcome(), Outcome::AwaitingAnswer);
        assert_eq!(
            step.task(&TaskName::new("After")).unwrap().outcome(),
            Outcome::Pending
        );

        // answer the gate, then the successor runs
        let expected = step
            .task(&TaskName::new("Gate"))
            .unwrap()
            .expected_answer()
            .unwrap()
            .clone();
        let message = AnswerMessage::new(
            Path::new(
                fixture.process.clone(),
                StepLocator::Index(0),
                TaskName::new("Gate"),
            ),
            expected.callback.clone(),
            expected.ticket.clone(),
            Requester::new("reviewer"),
            Payload::Document(json!({})),
        );
        step.task_mut(&TaskName::new("Gate"))
            .unwrap()
            .execute_answer(&mut fixture.env(), &message)
            .await
            .unwrap();
        step.advance(&mut fixture.env()).await.unwrap();
        assert_eq!(step.outcome(), Outcome::Ok);
    }

    #[tokio::test]
    async fn failure_is_fail_fast() {
        let def = StepDef::new("Failing")
            .task("Bad", Arc::new(AutoFail))
            .task("Never", Arc::new(AutoOk));
        let mut step = Step::fresh(&def).unwrap();
        let mut fixture = Fixture::new();

        step.advance(&mut fixture.env()).await.unwrap();
        assert_eq!(step.outcome(), Outcome::Failed);
        assert_eq!(
            step.task(&TaskName::new("Never")).unwrap().outcome(),
            Outcome::Pending
        );
    }

    #[tokio::test]
    async fn step_record_roundtrips() {
        let def = StepDef::new("Gated").task("Gate", Arc::new(Ask));
        let mut step = Step::fresh(&def).unwrap();
        let mut fixture = Fixture::new();
        step.advance(&mut fixture.env()).await.unwrap();

        let record = step.serialize();
        let restored = Step::restore(&def, &record, &fixture.secret).unwrap();
        assert_eq!(restored.outcome(), Outcome::AwaitingAnswer);
        assert_eq!(
            restored
                .task(&TaskName::new("Gate"))
                .unwrap()
                .expected_answer(),
            step.task(&TaskName::new("Gate")).unwrap().expected_answer()
        );

        let mut truncated = record.clone();
        truncated.remove("Gate");
        let result = Step::restore(&def, &truncated, &fixture.secret);
        assert!(result.is_err());
    }
}
