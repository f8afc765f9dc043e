//! Error types for keyward.

use std::fmt;

/// Result type alias for keyward operations.
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Opaque error returned by an executor.
pub type ExecutorError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while registering or dispatching executors.
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    /// No executor is registered under the requested name.
    #[error("Unknown executor: {0}")]
    UnknownExecutor(String),

    /// An executor returned an error.
    #[error("Executor '{name}' failed: {source}")]
    ExecutorFailed {
        /// Name of the failing executor
        name: String,
        /// The error reported by the executor
        #[source]
        source: ExecutorError,
    },

    /// The context for a changed key could not be fetched.
    #[error("Failed to fetch context for key '{key}': {reason}")]
    Fetch {
        /// The key whose context was requested
        key: String,
        /// Why the fetch failed
        reason: String,
    },

    /// A different executor is already registered under this name.
    #[error("Executor '{0}' is already registered")]
    DuplicateExecutor(String),

    /// A key path could not be used.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The change stream could not be started.
    #[error("Watch error: {0}")]
    Watch(String),

    /// Failed to load settings or a context file.
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// Failed to parse settings or a context file.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// One or more executors failed, or names could not be resolved.
    #[error("{0}")]
    Dispatch(DispatchErrors),
}

/// Ordered collection of the failures produced by one dispatch.
///
/// Entries appear in the order the executors were invoked (or, for unknown
/// names, the order the names were given). An empty collection means every
/// executor succeeded.
#[derive(Debug, Default)]
pub struct DispatchErrors {
    errors: Vec<SentinelError>,
}

impl DispatchErrors {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Append a failure.
    pub fn push(&mut self, error: SentinelError) {
        self.errors.push(error);
    }

    /// Whether no failure was recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether at least one failure was recorded.
    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Number of recorded failures.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over the recorded failures in order.
    pub fn iter(&self) -> std::slice::Iter<'_, SentinelError> {
        self.errors.iter()
    }

    /// Consume the collection, returning the failures in order.
    pub fn into_vec(self) -> Vec<SentinelError> {
        self.errors
    }

    /// `Ok(())` when empty, otherwise [`SentinelError::Dispatch`].
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(SentinelError::Dispatch(self))
        }
    }
}

impl fmt::Display for DispatchErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "No dispatch errors"),
            [only] => write!(f, "{}", only),
            errors => {
                writeln!(f, "{} dispatch errors:", errors.len())?;
                for (i, err) in errors.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, err)?;
                }
                Ok(())
            }
        }
    }
}

impl From<Vec<SentinelError>> for DispatchErrors {
    fn from(errors: Vec<SentinelError>) -> Self {
        Self { errors }
    }
}

impl IntoIterator for DispatchErrors {
    type Item = SentinelError;
    type IntoIter = std::vec::IntoIter<SentinelError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a DispatchErrors {
    type Item = &'a SentinelError;
    type IntoIter = std::slice::Iter<'a, SentinelError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_into_result() {
        let errors = DispatchErrors::new();
        assert!(errors.is_empty());
        assert!(!errors.has_failures());
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn test_display_lists_every_failure() {
        let errors = DispatchErrors::from(vec![
            SentinelError::UnknownExecutor("a".to_string()),
            SentinelError::ExecutorFailed {
                name: "b".to_string(),
                source: "boom".into(),
            },
        ]);
        assert_eq!(errors.len(), 2);

        let rendered = errors.to_string();
        assert!(rendered.contains("1. Unknown executor: a"));
        assert!(rendered.contains("2. Executor 'b' failed: boom"));
    }

    #[test]
    fn test_single_failure_display() {
        let errors = DispatchErrors::from(vec![SentinelError::UnknownExecutor("x".to_string())]);
        let err = errors.into_result().unwrap_err();
        assert_eq!(err.to_string(), "Unknown executor: x");
    }
}
