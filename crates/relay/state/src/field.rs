//! Field definitions: how one named field of a state struct persists
//!
//! A [`FieldDef`] declares, for a single named field of a concrete state
//! struct `S`, how the field is initialized for a brand-new entity, how it
//! is reconstructed from its persisted value, how it is serialized back,
//! and an optional validation step that may reject a loaded value.

use crate::{StateError, StateResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

type InitFn<S> = Box<dyn Fn(&mut S) + Send + Sync>;
type LoadFn<S> = Box<dyn Fn(&mut S, &Value) -> Result<(), String> + Send + Sync>;
type SerializeFn<S> = Box<dyn Fn(&S) -> Value + Send + Sync>;
type ValidateFn<S> = Box<dyn Fn(&S) -> Result<(), String> + Send + Sync>;

/// Declares one named, independently serialized field of a state struct `S`.
pub struct FieldDef<S> {
    name: &'static str,
    init: InitFn<S>,
    load: LoadFn<S>,
    serialize: SerializeFn<S>,
    validate: Option<ValidateFn<S>>,
}

impl<S> FieldDef<S> {
    /// Create a field definition from explicit init/load/serialize parts.
    pub fn new(
        name: &'static str,
        init: impl Fn(&mut S) + Send + Sync + 'static,
        load: impl Fn(&mut S, &Value) -> Result<(), String> + Send + Sync + 'static,
        serialize: impl Fn(&S) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            init: Box::new(init),
            load: Box::new(load),
            serialize: Box::new(serialize),
            validate: None,
        }
    }

    /// Attach a validation step, run against the struct after the field
    /// was loaded. A rejected value rejects the whole record.
    pub fn with_validate(
        mut self,
        validate: impl Fn(&S) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Box::new(validate));
        self
    }

    /// The field's name, the key of its value in the persisted record.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn apply_init(&self, state: &mut S) {
        (self.init)(state);
    }

    pub(crate) fn apply_load(&self, state: &mut S, raw: &Value) -> StateResult<()> {
        (self.load)(state, raw).map_err(|reason| StateError::LoadFailed {
            field: self.name.to_string(),
            reason,
        })?;
        if let Some(validate) = &self.validate {
            validate(state).map_err(|reason| StateError::Invalid {
                field: self.name.to_string(),
                reason,
            })?;
        }
        Ok(())
    }

    pub(crate) fn apply_serialize(&self, state: &S) -> Value {
        (self.serialize)(state)
    }
}

impl<S> std::fmt::Debug for FieldDef<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDef").field("name", &self.name).finish()
    }
}

/// Field whose value round-trips through serde, starting from `T::default()`.
pub fn serde_field<S, T>(
    name: &'static str,
    get: impl Fn(&S) -> &T + Send + Sync + 'static,
    put: impl Fn(&mut S, T) + Send + Sync + 'static,
) -> FieldDef<S>
where
    T: Serialize + DeserializeOwned + Default + 'static,
{
    serde_field_with(name, T::default, get, put)
}

/// Like [`serde_field`], with an explicit initializer for the fresh value.
pub fn serde_field_with<S, T>(
    name: &'static str,
    fresh: impl Fn() -> T + Send + Sync + 'static,
    get: impl Fn(&S) -> &T + Send + Sync + 'static,
    put: impl Fn(&mut S, T) + Send + Sync + 'static,
) -> FieldDef<S>
where
    T: Serialize + DeserializeOwned,
{
    let put = Arc::new(put);
    let put_on_load = Arc::clone(&put);
    FieldDef::new(
        name,
        move |state| put(state, fresh()),
        move |state, raw| {
            let value = serde_json::from_value::<T>(raw.clone()).map_err(|e| e.to_string())?;
            put_on_load(state, value);
            Ok(())
        },
        // to_value fails only for maps with non-string keys, which managed
        // field values never contain
        move |state| serde_json::to_value(get(state)).unwrap_or(Value::Null),
    )
}
