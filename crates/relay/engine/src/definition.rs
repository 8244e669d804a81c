//! Process definitions: the blueprint a process instance runs
//!
//! A definition declares the ordered steps of the normal sequence, the
//! designated fail step, an optional finally step, the business fields,
//! and an optional init policy evaluated before a process is created and
//! persisted.

use crate::fields::ProcessFields;
use crate::step::StepDef;
use async_trait::async_trait;
use relay_resources::ExternalResources;
use relay_state::{FieldDef, StateManager};
use relay_types::{EngineError, EngineResult, Requester};
use serde_json::Value;
use std::sync::Arc;

/// Gatekeeper run before a process instance is created.
///
/// Returns the accepted init args, or the rejection message shown to the
/// requester. Nothing is persisted for a rejected init.
#[async_trait]
pub trait InitPolicy: Send + Sync {
    async fn validate(
        &self,
        requester: &Requester,
        args: &Value,
        resources: &dyn ExternalResources,
    ) -> Result<Value, String>;
}

/// Blueprint of a process.
pub struct ProcessDefinition {
    name: String,
    steps: Vec<StepDef>,
    fail_step: StepDef,
    finally_step: Option<StepDef>,
    fields: StateManager<ProcessFields>,
    init_policy: Option<Arc<dyn InitPolicy>>,
}

impl ProcessDefinition {
    pub fn builder(name: impl Into<String>) -> ProcessDefinitionBuilder {
        ProcessDefinitionBuilder {
            name: name.into(),
            steps: Vec::new(),
            fail_step: None,
            finally_step: None,
            fields: Vec::new(),
            init_policy: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StepDef] {
        &self.steps
    }

    pub fn fail_step(&self) -> &StepDef {
        &self.fail_step
    }

    pub fn finally_step(&self) -> Option<&StepDef> {
        self.finally_step.as_ref()
    }

    pub(crate) fn fields(&self) -> &StateManager<ProcessFields> {
        &self.fields
    }

    pub(crate) fn init_policy(&self) -> Option<&Arc<dyn InitPolicy>> {
        self.init_policy.as_ref()
    }
}

impl std::fmt::Debug for ProcessDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessDefinition")
            .field("name", &self.name)
            .field("steps", &self.steps)
            .field("fail_step", &self.fail_step)
            .field("finally_step", &self.finally_step)
            .finish()
    }
}

/// Builder for [`ProcessDefinition`].
pub struct ProcessDefinitionBuilder {
    name: String,
    steps: Vec<StepDef>,
    fail_step: Option<StepDef>,
    finally_step: Option<StepDef>,
    fields: Vec<FieldDef<ProcessFields>>,
    init_policy: Option<Arc<dyn InitPolicy>>,
}

impl ProcessDefinitionBuilder {
    /// Append a step to the normal sequence.
    pub fn step(mut self, step: StepDef) -> Self {
        self.steps.push(step);
        self
    }

    /// The step run, once, in place of the normal sequence after the
    /// first failure.
    pub fn fail_step(mut self, step: StepDef) -> Self {
        self.fail_step = Some(step);
        self
    }

    /// The terminal cleanup step, run after normal completion or the
    /// fail step.
    pub fn finally_step(mut self, step: StepDef) -> Self {
        self.finally_step = Some(step);
        self
    }

    /// Declare a business field.
    pub fn field(mut self, field: FieldDef<ProcessFields>) -> Self {
        self.fields.push(field);
        self
    }

    pub fn init_policy(mut self, policy: Arc<dyn InitPolicy>) -> Self {
        self.init_policy = Some(policy);
        self
    }

    /// Validate and build the definition. Step and task problems surface
    /// here, not when the process runs.
    pub fn build(self) -> EngineResult<ProcessDefinition> {
        if self.steps.is_empty() {
            return Err(EngineError::InvalidDefinition(format!(
                "process '{}' declares no steps",
                self.name
            )));
        }
        let fail_step = self.fail_step.ok_or_else(|| {
            EngineError::InvalidDefinition(format!(
                "process '{}' declares no fail step",
                self.name
            ))
        })?;
        for step in self.steps.iter().chain(Some(&fail_step)).chain(self.finally_step.as_ref()) {
            step.validate()?;
        }
        let fields = StateManager::new(self.fields)?;
        Ok(ProcessDefinition {
            name: self.name,
            steps: self.steps,
            fail_step,
            finally_step: self.finally_step,
            fields,
            init_policy: self.init_policy,
        })
    }
}
