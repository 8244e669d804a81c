//! The state manager: restore-or-initialize over a set of field definitions
//!
//! Every Relay entity persists as one [`StateRecord`], a mapping from field
//! name to serialized value. A [`StateManager`] owns the entity's ordered
//! field definitions and offers the three operations of the persistence
//! contract: `fresh` (initialize every field), `restore` (load every field
//! from a record, rejecting corrupt ones) and `serialize` (produce the
//! record in full).
//!
//! Consumers read and write the concrete state struct directly; whether a
//! value came from `fresh` or `restore` is not observable.

use crate::{FieldDef, StateError, StateResult};
use serde_json::Value;
use std::collections::HashSet;

/// The persisted form of an entity's state: field name to serialized value.
pub type StateRecord = serde_json::Map<String, Value>;

/// Manages the named fields of a state struct `S`.
pub struct StateManager<S> {
    fields: Vec<FieldDef<S>>,
}

impl<S: Default> StateManager<S> {
    /// Create a manager over the given field definitions.
    ///
    /// Field names must be unique; a duplicate rejects the whole set.
    pub fn new(fields: Vec<FieldDef<S>>) -> StateResult<Self> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name()) {
                return Err(StateError::DuplicateField(field.name().to_string()));
            }
        }
        Ok(Self { fields })
    }

    /// State for a brand-new entity: `init` applied to every field.
    pub fn fresh(&self) -> S {
        let mut state = S::default();
        for field in &self.fields {
            field.apply_init(&mut state);
        }
        state
    }

    /// Reconstruct state from a persisted record: `load` applied to every
    /// field. A missing field, a parse failure, or a failed validation
    /// rejects the record.
    pub fn restore(&self, record: &StateRecord) -> StateResult<S> {
        let mut state = S::default();
        for field in &self.fields {
            let raw = record
                .get(field.name())
                .ok_or_else(|| StateError::MissingField(field.name().to_string()))?;
            field.apply_load(&mut state, raw)?;
        }
        Ok(state)
    }

    /// Produce the persisted record: `serialize` applied to every field.
    pub fn serialize(&self, state: &S) -> StateRecord {
        let mut record = StateRecord::new();
        for field in &self.fields {
            record.insert(field.name().to_string(), field.apply_serialize(state));
        }
        record
    }

    /// The declared field names, in definition order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name())
    }
}

impl<S> std::fmt::Debug for StateManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("fields", &self.fields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{serde_field, serde_field_with};
    use serde_json::json;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Sample {
        note: String,
        marker: Value,
        pair: (String, u32),
        nested: StateRecord,
    }

    fn manager() -> StateManager<Sample> {
        StateManager::new(vec![
            serde_field("note", |s: &Sample| &s.note, |s, v| s.note = v),
            serde_field_with(
                "marker",
                || Value::Null,
                |s: &Sample| &s.marker,
                |s, v| s.marker = v,
            ),
            serde_field("pair", |s: &Sample| &s.pair, |s, v| s.pair = v),
            serde_field("nested", |s: &Sample| &s.nested, |s, v| s.nested = v),
        ])
        .unwrap()
    }

    #[test]
    fn fresh_initializes_every_field() {
        let state = manager().fresh();
        assert_eq!(state.note, "");
        assert_eq!(state.marker, Value::Null);
        assert_eq!(state.pair, (String::new(), 0));
        assert!(state.nested.is_empty());
    }

    #[test]
    fn roundtrip_string_null_tuple_and_nested_record() {
        let manager = manager();
        let mut nested = StateRecord::new();
        nested.insert("inner".into(), json!({"deep": [1, 2, 3]}));
        let state = Sample {
            note: "approved".into(),
            marker: Value::Null,
            pair: ("qa".into(), 7),
            nested,
        };

        let record = manager.serialize(&state);
        let restored = manager.restore(&record).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn restore_rejects_missing_field() {
        let manager = manager();
        let mut record = manager.serialize(&Sample::default());
        record.remove("pair");
        let result = manager.restore(&record);
        assert!(matches!(result, Err(StateError::MissingField(name)) if name == "pair"));
    }

    #[test]
    fn restore_rejects_unparseable_field() {
        let manager = manager();
        let mut record = manager.serialize(&Sample::default());
        record.insert("pair".into(), json!("not a tuple"));
        let result = manager.restore(&record);
        assert!(matches!(result, Err(StateError::LoadFailed { field, .. }) if field == "pair"));
    }

    #[test]
    fn duplicate_field_names_are_rejected() {
        let result = StateManager::new(vec![
            serde_field("note", |s: &Sample| &s.note, |s, v| s.note = v),
            serde_field("note", |s: &Sample| &s.note, |s, v| s.note = v),
        ]);
        assert!(matches!(result, Err(StateError::DuplicateField(name)) if name == "note"));
    }

    #[test]
    fn serialized_record_lists_every_declared_field() {
        let manager = manager();
        let record = manager.serialize(&Sample::default());
        let names: Vec<_> = manager.field_names().collect();
        assert_eq!(names, vec!["note", "marker", "pair", "nested"]);
        for name in names {
            assert!(record.contains_key(name));
        }
    }
}
