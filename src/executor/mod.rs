//! Executor capability and built-in executors.
//!
//! An executor is a named unit of work invoked when a key it is registered
//! under changes, or on demand by name.

mod command;
mod function;

pub use command::CommandExecutor;
pub use function::FnExecutor;

use crate::context::Context;
use crate::error::ExecutorError;
use async_trait::async_trait;

/// Trait for executors.
///
/// Implement this trait to react to key changes (render a template, restart
/// a service, call a webhook, ...). The same instance may be registered under
/// many keys and may be invoked concurrently from the watch loop and from
/// [`Sentinel::execute`](crate::core::Sentinel::execute); implementations are
/// responsible for their own synchronization.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use keyward::{Context, Executor, ExecutorError};
///
/// struct Reload;
///
/// #[async_trait]
/// impl Executor for Reload {
///     fn name(&self) -> &str {
///         "reload"
///     }
///
///     async fn execute(&self, context: Option<&Context>) -> Result<(), ExecutorError> {
///         if let Some(context) = context {
///             println!("reloading with {} values", context.as_map().len());
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Executor: Send + Sync {
    /// Unique name of this executor.
    fn name(&self) -> &str;

    /// Run the executor.
    ///
    /// `context` is the value fetched for the changed key when triggered by
    /// the watch loop, and `None` when invoked explicitly by name.
    ///
    /// # Errors
    ///
    /// Any error is reported to the dispatcher, which records it and carries
    /// on with the remaining executors.
    async fn execute(&self, context: Option<&Context>) -> Result<(), ExecutorError>;
}
