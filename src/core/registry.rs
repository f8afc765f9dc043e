//! Executor registration indices.

use crate::error::{Result, SentinelError};
use crate::executor::Executor;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Shared executor reference held by the registry.
pub type ExecutorRef = Arc<dyn Executor>;

/// Registry of executors indexed by name and by watch key.
///
/// The registry is append-only: entries are added during setup and read for
/// the rest of the process lifetime.
///
/// # Examples
///
/// ```rust
/// use keyward::core::Registry;
/// use keyward::FnExecutor;
/// use std::sync::Arc;
///
/// let mut registry = Registry::new();
/// registry.add(["web", "db"], Arc::new(FnExecutor::new("reload", |_| Ok(()))));
///
/// assert!(registry.get("reload").is_some());
/// assert_eq!(registry.subscribers("web").len(), 1);
/// assert!(registry.subscribers("cache").is_empty());
/// ```
#[derive(Default, Clone)]
pub struct Registry {
    by_name: HashMap<String, ExecutorRef>,
    by_key: HashMap<String, Vec<ExecutorRef>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `executor` under every key in `keys`.
    ///
    /// The executor is appended to each key's subscriber list, so adding the
    /// same executor twice under a key lists it twice. The name index keeps
    /// the most recent executor for a given name.
    pub fn add<I, K>(&mut self, keys: I, executor: ExecutorRef)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        for key in keys {
            let key = key.into();
            debug!(executor = executor.name(), key = %key, "executor subscribed");
            self.by_key
                .entry(key)
                .or_default()
                .push(Arc::clone(&executor));
        }

        let name = executor.name().to_string();
        if let Some(previous) = self.by_name.insert(name, Arc::clone(&executor)) {
            if !Arc::ptr_eq(&previous, &executor) {
                debug!(executor = executor.name(), "executor name rebound");
            }
        }
    }

    /// Register `executor`, rejecting a name already bound to a different
    /// executor instance.
    ///
    /// Re-registering the same instance behaves like [`add`](Self::add).
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::DuplicateExecutor`] and leaves the registry
    /// untouched if the name is taken by another executor.
    pub fn try_add<I, K>(&mut self, keys: I, executor: ExecutorRef) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        if let Some(existing) = self.by_name.get(executor.name()) {
            if !Arc::ptr_eq(existing, &executor) {
                return Err(SentinelError::DuplicateExecutor(executor.name().to_string()));
            }
        }
        self.add(keys, executor);
        Ok(())
    }

    /// Look up an executor by name.
    pub fn get(&self, name: &str) -> Option<&ExecutorRef> {
        self.by_name.get(name)
    }

    /// Executors subscribed to `key`, in registration order.
    ///
    /// Returns an empty slice for keys without subscribers.
    pub fn subscribers(&self, key: &str) -> &[ExecutorRef] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Names of all registered executors, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Keys with at least one subscriber, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.by_key.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of distinct executor names.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether no executor has been registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let by_key: HashMap<&str, Vec<&str>> = self
            .by_key
            .iter()
            .map(|(key, executors)| (key.as_str(), executors.iter().map(|e| e.name()).collect()))
            .collect();
        f.debug_struct("Registry")
            .field("names", &self.names())
            .field("by_key", &by_key)
            .finish()
    }
}
