//! Key/value store clients.
//!
//! A client produces the stream of changed key names consumed by the watch
//! loop and fetches the context tree for a key path.

#[cfg(feature = "file-watch")]
mod file;
mod memory;

#[cfg(feature = "file-watch")]
pub use file::FileClient;
pub use memory::MemoryClient;

use crate::context::Context;
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Trait for key/value store clients.
///
/// Implement this trait to connect the dispatcher to a store (etcd, Consul,
/// a directory tree, ...).
#[async_trait]
pub trait Client: Send + Sync {
    /// Start streaming changed key names.
    ///
    /// Each received item is the bare name of a key that changed, in the
    /// order the store reported them. The stream ends when the client shuts
    /// down.
    ///
    /// # Errors
    ///
    /// Returns an error if the change stream cannot be established.
    fn watch(&self) -> Result<mpsc::UnboundedReceiver<String>>;

    /// Fetch the value tree rooted at `path`.
    ///
    /// Returns `Ok(None)` if nothing is stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the stored value is
    /// not a tree.
    async fn fetch(&self, path: &[&str]) -> Result<Option<Context>>;

    /// Get a human-readable name for this client (for logging/debugging).
    fn name(&self) -> String {
        "client".to_string()
    }
}
