//! Process business fields
//!
//! A process definition declares its business fields through the state
//! manager; task programs read and write them through [`ProcessFields`]
//! accessors. Only declared fields can be set, so a typo surfaces as an
//! error instead of a silently ignored write.

use relay_state::{FieldDef, StateRecord};
use relay_types::{EngineError, EngineResult};
use serde_json::Value;

/// The live business fields of one process instance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProcessFields {
    values: StateRecord,
}

impl ProcessFields {
    /// Read a declared field. `None` means the field is not declared;
    /// a declared but unset field reads as JSON null.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str_value(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn bool_value(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Write a declared field.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> EngineResult<()> {
        if !self.values.contains_key(name) {
            return Err(EngineError::UnknownField(name.to_string()));
        }
        self.values.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Assign a whole init-args object through the field setters.
    pub fn assign_object(&mut self, args: Value) -> EngineResult<()> {
        match args {
            Value::Null => Ok(()),
            Value::Object(map) => {
                for (name, value) in map {
                    self.set(&name, value)?;
                }
                Ok(())
            }
            _ => Err(EngineError::InitRejected(
                "init args must be an object".to_string(),
            )),
        }
    }

    /// Declared field names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub(crate) fn raw(&self) -> &StateRecord {
        &self.values
    }

    pub(crate) fn raw_mut(&mut self) -> &mut StateRecord {
        &mut self.values
    }
}

/// A business field persisted verbatim as JSON, starting out null.
pub fn value_field(name: &'static str) -> FieldDef<ProcessFields> {
    FieldDef::new(
        name,
        move |fields: &mut ProcessFields| {
            fields.raw_mut().insert(name.to_string(), Value::Null);
        },
        move |fields, raw| {
            fields.raw_mut().insert(name.to_string(), raw.clone());
            Ok(())
        },
        move |fields| fields.raw().get(name).cloned().unwrap_or(Value::Null),
    )
}
