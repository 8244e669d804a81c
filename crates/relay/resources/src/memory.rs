//! In-memory reference implementation of the collaborator contracts.
//!
//! Deterministic and test-friendly: lookup collections are scripted in,
//! dispatched jobs and pull requests are journaled for inspection instead
//! of leaving the process.

use crate::traits::{
    Cache, DataLookup, Document, ExternalResources, Persistence, PullRequestDispatch,
    WorkerDispatch,
};
use crate::{ResourceError, ResourceResult};
use async_trait::async_trait;
use relay_types::{CacheKey, JobHandle, JobId, ProcessCommand, PullRequestDescriptor, QueueName, StorageKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// A worker job recorded by the in-memory dispatcher.
#[derive(Clone, Debug)]
pub struct DispatchedJob {
    pub handle: JobHandle,
    pub cache_key: CacheKey,
    pub command: ProcessCommand,
}

/// In-memory collaborator adapter.
pub struct InMemoryResources {
    queue: QueueName,
    counter: AtomicU64,
    persisted: RwLock<HashMap<StorageKey, Document>>,
    cached: RwLock<HashMap<CacheKey, Document>>,
    lists: RwLock<HashMap<String, Vec<String>>>,
    items: RwLock<HashMap<(String, String), Document>>,
    jobs: RwLock<Vec<DispatchedJob>>,
    pull_requests: RwLock<Vec<PullRequestDescriptor>>,
}

impl InMemoryResources {
    pub fn new() -> Self {
        Self {
            queue: QueueName::new("answers"),
            counter: AtomicU64::new(0),
            persisted: RwLock::new(HashMap::new()),
            cached: RwLock::new(HashMap::new()),
            lists: RwLock::new(HashMap::new()),
            items: RwLock::new(HashMap::new()),
            jobs: RwLock::new(Vec::new()),
            pull_requests: RwLock::new(Vec::new()),
        }
    }

    pub fn with_queue(mut self, queue: QueueName) -> Self {
        self.queue = queue;
        self
    }

    /// Script a lookup collection's entry list.
    pub fn insert_list(&self, collection: impl Into<String>, entries: Vec<String>) {
        if let Ok(mut guard) = self.lists.write() {
            guard.insert(collection.into(), entries);
        }
    }

    /// Script one lookup entry.
    pub fn insert_item(
        &self,
        collection: impl Into<String>,
        key: impl Into<String>,
        item: Document,
    ) {
        if let Ok(mut guard) = self.items.write() {
            guard.insert((collection.into(), key.into()), item);
        }
    }

    /// Jobs handed to `init_worker` so far.
    pub fn dispatched_jobs(&self) -> Vec<DispatchedJob> {
        self.jobs.read().map(|g| g.clone()).unwrap_or_default()
    }

    /// Pull requests handed to `dispatch_pull_request` so far.
    pub fn dispatched_pull_requests(&self) -> Vec<PullRequestDescriptor> {
        self.pull_requests
            .read()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for InMemoryResources {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Persistence for InMemoryResources {
    async fn put(&self, items: Vec<Document>) -> ResourceResult<Vec<StorageKey>> {
        let mut guard = self
            .persisted
            .write()
            .map_err(|_| ResourceError::Backend("persistence lock poisoned".to_string()))?;
        let mut keys = Vec::with_capacity(items.len());
        for item in items {
            let key = StorageKey::new(format!("store-{}", self.next_id()));
            guard.insert(key.clone(), item);
            keys.push(key);
        }
        Ok(keys)
    }

    async fn get(&self, key: &StorageKey) -> ResourceResult<Document> {
        let guard = self
            .persisted
            .read()
            .map_err(|_| ResourceError::Backend("persistence lock poisoned".to_string()))?;
        guard
            .get(key)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(format!("storage key '{key}'")))
    }
}

#[async_trait]
impl Cache for InMemoryResources {
    async fn put(&self, items: Vec<Document>) -> ResourceResult<Vec<CacheKey>> {
        let mut guard = self
            .cached
            .write()
            .map_err(|_| ResourceError::Backend("cache lock poisoned".to_string()))?;
        let mut keys = Vec::with_capacity(items.len());
        for item in items {
            let key = CacheKey::new(format!("cache-{}", self.next_id()));
            guard.insert(key.clone(), item);
            keys.push(key);
        }
        Ok(keys)
    }
}

#[async_trait]
impl WorkerDispatch for InMemoryResources {
    async fn init_worker(
        &self,
        job_type: &str,
        cache_key: &CacheKey,
        command: ProcessCommand,
    ) -> ResourceResult<JobHandle> {
        let mut guard = self
            .jobs
            .write()
            .map_err(|_| ResourceError::Backend("jobs lock poisoned".to_string()))?;
        let handle = JobHandle {
            job_id: JobId::new(format!("job-{}", self.next_id())),
            job_type: job_type.to_string(),
        };
        guard.push(DispatchedJob {
            handle: handle.clone(),
            cache_key: cache_key.clone(),
            command,
        });
        Ok(handle)
    }
}

#[async_trait]
impl PullRequestDispatch for InMemoryResources {
    async fn dispatch_pull_request(&self, descriptor: PullRequestDescriptor) -> ResourceResult<()> {
        let mut guard = self
            .pull_requests
            .write()
            .map_err(|_| ResourceError::Backend("pull requests lock poisoned".to_string()))?;
        guard.push(descriptor);
        Ok(())
    }
}

#[async_trait]
impl DataLookup for InMemoryResources {
    async fn lookup_list(&self, collection: &str) -> ResourceResult<Vec<String>> {
        let guard = self
            .lists
            .read()
            .map_err(|_| ResourceError::Backend("lookup lock poisoned".to_string()))?;
        guard
            .get(collection)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(format!("collection '{collection}'")))
    }

    async fn lookup_item(&self, collection: &str, key: &str) -> ResourceResult<Document> {
        let guard = self
            .items
            .read()
            .map_err(|_| ResourceError::Backend("lookup lock poisoned".to_string()))?;
        guard
            .get(&(collection.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(format!("entry '{key}' in '{collection}'")))
    }
}

impl ExternalResources for InMemoryResources {
    fn persistence(&self) -> &dyn Persistence {
        self
    }

    fn cache(&self) -> &dyn Cache {
        self
    }

    fn workers(&self) -> &dyn WorkerDispatch {
        self
    }

    fn pull_requests(&self) -> &dyn PullRequestDispatch {
        self
    }

    fn lookups(&self) -> &dyn DataLookup {
        self
    }

    fn answer_queue(&self) -> &QueueName {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_types::{CallbackId, Path, ProcessId, StepLocator, TaskName, Ticket};
    use serde_json::json;

    fn command() -> ProcessCommand {
        ProcessCommand {
            target: Path::new(
                ProcessId::new("proc-1"),
                StepLocator::Index(0),
                TaskName::new("Qa"),
            ),
            callback: CallbackId::new("qa-finished"),
            ticket: Ticket("ts;digest".into()),
            response_queue: QueueName::new("answers"),
        }
    }

    #[tokio::test]
    async fn persistence_put_then_get() {
        let resources = InMemoryResources::new();
        let keys = Persistence::put(&resources, vec![json!({"a": 1}), json!({"b": 2})])
            .await
            .unwrap();
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1]);

        let item = resources.persistence().get(&keys[1]).await.unwrap();
        assert_eq!(item, json!({"b": 2}));

        let missing = resources.persistence().get(&StorageKey::new("nope")).await;
        assert!(matches!(missing, Err(ResourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn worker_dispatch_is_journaled() {
        let resources = InMemoryResources::new();
        let cache_keys = Cache::put(&resources, vec![json!({"files": []})])
            .await
            .unwrap();
        let handle = resources
            .workers()
            .init_worker("qa", &cache_keys[0], command())
            .await
            .unwrap();
        assert_eq!(handle.job_type, "qa");

        let jobs = resources.dispatched_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].handle, handle);
        assert_eq!(jobs[0].command.callback, CallbackId::new("qa-finished"));
    }

    #[tokio::test]
    async fn lookups_are_scripted() {
        let resources = InMemoryResources::new();
        resources.insert_list("upstream", vec!["alpha".into(), "beta".into()]);
        resources.insert_item("upstream", "alpha", json!({"files": ["a.bin"]}));

        let list = resources.lookups().lookup_list("upstream").await.unwrap();
        assert_eq!(list, vec!["alpha".to_string(), "beta".to_string()]);

        let item = resources
            .lookups()
            .lookup_item("upstream", "alpha")
            .await
            .unwrap();
        assert_eq!(item, json!({"files": ["a.bin"]}));

        let missing = resources.lookups().lookup_item("upstream", "gamma").await;
        assert!(matches!(missing, Err(ResourceError::NotFound(_))));
    }
}
