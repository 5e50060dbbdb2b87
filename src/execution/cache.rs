//! Task Output Cache
//!
//! Holds the most recent successful output of every script task,
//! keyed by workflow and task. Entries live for the lifetime of the
//! process and are never written to disk.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;
use serde_json::Value;

/// Composite cache key.
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct CacheKey {
    pub workflow_id: String,
    pub task_id: String,
}

impl CacheKey {
    pub fn new(workflow_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            task_id: task_id.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.workflow_id, self.task_id)
    }
}

/// Shared handle to the output cache.
///
/// Cloning the handle shares the underlying map. Construct one at the
/// application root and pass it to every component that needs it.
///
/// # Example
///
/// ```
/// use jarvis::execution::OutputCache;
/// use serde_json::json;
///
/// let cache = OutputCache::new();
/// cache.record("w1", "3", json!({"user": {"name": "Ada"}}));
///
/// assert_eq!(cache.get("w1", "3"), Some(json!({"user": {"name": "Ada"}})));
/// assert!(cache.get("w2", "3").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct OutputCache {
    entries: Arc<RwLock<HashMap<CacheKey, Value>>>,
}

impl OutputCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, Value>> {
        // Entries are replaced whole, so a poisoned map is still consistent.
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, Value>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a copy of the cached output for a task.
    pub fn get(&self, workflow_id: &str, task_id: &str) -> Option<Value> {
        self.read().get(&CacheKey::new(workflow_id, task_id)).cloned()
    }

    /// Returns true if the task has a cached output.
    pub fn contains(&self, workflow_id: &str, task_id: &str) -> bool {
        self.read().contains_key(&CacheKey::new(workflow_id, task_id))
    }

    /// Stores a task's output, replacing any previous entry.
    pub fn record(&self, workflow_id: &str, task_id: &str, output: Value) {
        let key = CacheKey::new(workflow_id, task_id);
        debug!("Caching output for {}", key);
        self.write().insert(key, output);
    }

    /// Returns all cached outputs of one workflow, keyed by task id.
    pub fn workflow_outputs(&self, workflow_id: &str) -> BTreeMap<String, Value> {
        self.read()
            .iter()
            .filter(|(key, _)| key.workflow_id == workflow_id)
            .map(|(key, value)| (key.task_id.clone(), value.clone()))
            .collect()
    }

    /// Returns every entry keyed by `<workflowId>-<taskId>`.
    ///
    /// Intended for debugging and introspection.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.read()
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    /// Returns the number of cached outputs.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
