//! State management for Relay entities
//!
//! Every level of the Relay hierarchy (process, step, task) persists its
//! state through the same mechanism: a named set of independently
//! serializable fields backed by one persisted record.
//!
//! - [`FieldDef`] declares how one named field of a concrete state struct
//!   is initialized, loaded, serialized, and optionally validated.
//! - [`StateManager`] applies a field set in full: `fresh` for a brand-new
//!   entity, `restore` for one reconstructed from storage, `serialize` to
//!   produce the persisted record.
//!
//! The round-trip law holds for every field: `restore(serialize(s))`
//! yields a state equal to `s`.

#![deny(unsafe_code)]

pub mod error;
pub mod field;
pub mod manager;

pub use error::{StateError, StateResult};
pub use field::{serde_field, serde_field_with, FieldDef};
pub use manager::{StateManager, StateRecord};
