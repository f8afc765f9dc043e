//! Closure-backed executor.

use super::Executor;
use crate::context::Context;
use crate::error::ExecutorError;
use async_trait::async_trait;

type Callback = Box<dyn Fn(Option<&Context>) -> Result<(), ExecutorError> + Send + Sync>;

/// Executor that runs a synchronous closure.
///
/// # Examples
///
/// ```rust
/// use keyward::FnExecutor;
///
/// let executor = FnExecutor::new("log", |context| {
///     println!("changed: {:?}", context);
///     Ok(())
/// });
/// ```
pub struct FnExecutor {
    name: String,
    callback: Callback,
}

impl FnExecutor {
    /// Create a new closure executor.
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Option<&Context>) -> Result<(), ExecutorError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callback: Box::new(callback),
        }
    }
}

#[async_trait]
impl Executor for FnExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, context: Option<&Context>) -> Result<(), ExecutorError> {
        (self.callback)(context)
    }
}

impl std::fmt::Debug for FnExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnExecutor").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_callback_receives_context() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        let executor = FnExecutor::new("count", move |context| {
            if context.is_some() {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });

        assert_eq!(executor.name(), "count");
        executor.execute(Some(&Context::new())).await.unwrap();
        executor.execute(None).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_callback_error_is_returned() {
        let executor = FnExecutor::new("fail", |_| Err("nope".into()));
        let err = executor.execute(None).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}
