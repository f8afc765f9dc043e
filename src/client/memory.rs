//! In-process key/value store client.

use super::Client;
use crate::context::Context;
use crate::error::{Result, SentinelError};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::trace;

/// Client backed by an in-memory JSON tree.
///
/// Writes through [`set`](Self::set) and [`remove`](Self::remove) notify
/// every active watcher with the last segment of the written path, mirroring
/// how a store reports the changed key.
///
/// # Examples
///
/// ```rust
/// use keyward::client::{Client, MemoryClient};
/// use serde_json::json;
///
/// # async fn example() -> keyward::Result<()> {
/// let client = MemoryClient::new();
/// let mut changes = client.watch()?;
///
/// client.set(&["sentinel", "app"], json!({ "replicas": 3 }))?;
/// assert_eq!(changes.recv().await.as_deref(), Some("app"));
///
/// let context = client.fetch(&["sentinel", "app"]).await?.unwrap();
/// assert_eq!(context.get("replicas"), Some(&json!(3)));
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MemoryClient {
    root: RwLock<Map<String, Value>>,
    watchers: Mutex<Vec<mpsc::UnboundedSender<String>>>,
}

impl MemoryClient {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `root`.
    pub fn with_root(root: Map<String, Value>) -> Self {
        Self {
            root: RwLock::new(root),
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Store `value` at `path`, creating intermediate objects as needed, and
    /// notify watchers.
    ///
    /// Intermediate values that are not objects are replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::InvalidPath`] if `path` is empty.
    pub fn set(&self, path: &[&str], value: Value) -> Result<()> {
        let (last, parents) = path
            .split_last()
            .ok_or_else(|| SentinelError::InvalidPath("cannot set an empty path".to_string()))?;

        {
            let mut root = self.root.write();
            let mut node = &mut *root;
            for segment in parents {
                let entry = node
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Map::new());
                }
                node = entry.as_object_mut().ok_or_else(|| {
                    SentinelError::InvalidPath(format!("segment '{}' is not an object", segment))
                })?;
            }
            node.insert(last.to_string(), value);
        }

        self.notify(last);
        Ok(())
    }

    /// Remove the value at `path` and notify watchers.
    ///
    /// Returns the removed value, if any. Watchers are notified even when
    /// nothing was stored.
    pub fn remove(&self, path: &[&str]) -> Option<Value> {
        let (last, parents) = path.split_last()?;

        let removed = {
            let mut root = self.root.write();
            let mut node = Some(&mut *root);
            for segment in parents {
                node = node
                    .and_then(|map| map.get_mut(*segment))
                    .and_then(Value::as_object_mut);
            }
            node.and_then(|map| map.remove(*last))
        };

        self.notify(last);
        removed
    }

    /// Send a change notification for `key` without modifying the store.
    ///
    /// Watchers whose receiver has been dropped are discarded.
    pub fn notify(&self, key: &str) {
        let mut watchers = self.watchers.lock();
        watchers.retain(|tx| tx.send(key.to_string()).is_ok());
        trace!(key, watchers = watchers.len(), "change notified");
    }

    /// Drop every watcher, ending their change streams.
    pub fn close(&self) {
        self.watchers.lock().clear();
    }

    /// Number of live watchers.
    pub fn watcher_count(&self) -> usize {
        self.watchers.lock().len()
    }
}

#[async_trait]
impl Client for MemoryClient {
    fn watch(&self) -> Result<mpsc::UnboundedReceiver<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.lock().push(tx);
        Ok(rx)
    }

    async fn fetch(&self, path: &[&str]) -> Result<Option<Context>> {
        let root = self.root.read();
        let Some((first, rest)) = path.split_first() else {
            return Ok(Some(Context::from(root.clone())));
        };

        let mut current = match root.get(*first) {
            Some(value) => value,
            None => return Ok(None),
        };
        for segment in rest {
            current = match current.as_object().and_then(|map| map.get(*segment)) {
                Some(value) => value,
                None => return Ok(None),
            };
        }

        Context::try_from(current.clone()).map(Some)
    }

    fn name(&self) -> String {
        "memory".to_string()
    }
}
