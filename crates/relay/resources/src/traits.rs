//! Collaborator contracts consumed by tasks
//!
//! The engine never assumes synchronous completion of any call crossing
//! this boundary; every result that matters to the workflow comes back,
//! if at all, as an inbound answer carrying a previously issued ticket.

use crate::ResourceResult;
use async_trait::async_trait;
use relay_types::{CacheKey, JobHandle, ProcessCommand, PullRequestDescriptor, QueueName, StorageKey};
use serde_json::Value;

/// Opaque item exchanged with the stores.
pub type Document = Value;

/// Durable persistence store.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Store items durably, returning one key per item, in order.
    async fn put(&self, items: Vec<Document>) -> ResourceResult<Vec<StorageKey>>;

    /// Fetch one previously stored item.
    async fn get(&self, key: &StorageKey) -> ResourceResult<Document>;
}

/// Ephemeral cache workers read their inputs from.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Cache items, returning one key per item, in order.
    async fn put(&self, items: Vec<Document>) -> ResourceResult<Vec<CacheKey>>;
}

/// Remote-worker job dispatch.
#[async_trait]
pub trait WorkerDispatch: Send + Sync {
    /// Enqueue an asynchronous job. The job's result arrives later as an
    /// inbound answer bearing the ticket embedded in `command`.
    async fn init_worker(
        &self,
        job_type: &str,
        cache_key: &CacheKey,
        command: ProcessCommand,
    ) -> ResourceResult<JobHandle>;
}

/// Pull-request dispatch.
#[async_trait]
pub trait PullRequestDispatch: Send + Sync {
    /// Hand a pull request to the dispatching service. Returning `Ok` only
    /// acknowledges the handoff; the dispatch report arrives as an inbound
    /// answer routed through the embedded command.
    async fn dispatch_pull_request(&self, descriptor: PullRequestDescriptor) -> ResourceResult<()>;
}

/// Read-only reference data.
#[async_trait]
pub trait DataLookup: Send + Sync {
    /// List the entry names of a collection.
    async fn lookup_list(&self, collection: &str) -> ResourceResult<Vec<String>>;

    /// Fetch one entry of a collection.
    async fn lookup_item(&self, collection: &str, key: &str) -> ResourceResult<Document>;
}

/// The collaborator bundle handed to tasks.
pub trait ExternalResources: Send + Sync {
    fn persistence(&self) -> &dyn Persistence;
    fn cache(&self) -> &dyn Cache;
    fn workers(&self) -> &dyn WorkerDispatch;
    fn pull_requests(&self) -> &dyn PullRequestDispatch;
    fn lookups(&self) -> &dyn DataLookup;

    /// Queue name embedded in outbound commands so answers find their way
    /// back to the engine.
    fn answer_queue(&self) -> &QueueName;
}
