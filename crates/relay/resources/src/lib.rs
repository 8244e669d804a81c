//! Collaborator interfaces for the Relay workflow engine
//!
//! Tasks consume external capability through the [`ExternalResources`]
//! bundle: durable persistence, an ephemeral cache, remote-worker job
//! dispatch, pull-request dispatch, and read-only data lookups. The
//! engine core implements none of them; [`InMemoryResources`] is the
//! reference adapter used by tests.

#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{ResourceError, ResourceResult};
pub use memory::{DispatchedJob, InMemoryResources};
pub use traits::{
    Cache, DataLookup, Document, ExternalResources, Persistence, PullRequestDispatch,
    WorkerDispatch,
};
