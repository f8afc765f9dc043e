//! Context values passed to executors.

use crate::error::{Result, SentinelError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Nested value tree fetched for a changed key.
///
/// A context is a string-keyed JSON object whose values may be nested
/// objects, arrays, or typed leaves. It is fetched fresh from the client for
/// every change notification and handed to each subscribed executor.
///
/// # Examples
///
/// ```rust
/// use keyward::Context;
/// use serde_json::json;
///
/// let context = Context::try_from(json!({
///     "server": { "port": 8080 }
/// })).unwrap();
///
/// assert_eq!(context.lookup(&["server", "port"]), Some(&json!(8080)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Map<String, Value>);

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Get a top-level value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Walk nested objects along `path`.
    ///
    /// Returns `None` if any segment is missing or an intermediate value is
    /// not an object. An empty path yields `None`.
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get(*first)?;
        for segment in rest {
            current = current.as_object()?.get(*segment)?;
        }
        Some(current)
    }

    /// Whether the context holds no values.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the context, returning the underlying map.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Deserialize the context into a typed structure.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::ParseError`] if the tree does not match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| SentinelError::ParseError(format!("Failed to deserialize context: {}", e)))
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Context {
    type Error = SentinelError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(SentinelError::ParseError(format!(
                "Expected an object at the context root, found {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested() {
        let context = Context::try_from(json!({
            "a": { "b": { "c": "deep" } },
            "list": [1, 2, 3]
        }))
        .unwrap();

        assert_eq!(context.lookup(&["a", "b", "c"]), Some(&json!("deep")));
        assert_eq!(context.lookup(&["list"]), Some(&json!([1, 2, 3])));
        assert_eq!(context.lookup(&["list", "0"]), None);
        assert_eq!(context.lookup(&["missing"]), None);
        assert_eq!(context.lookup(&[]), None);
    }

    #[test]
    fn test_try_from_non_object() {
        assert!(Context::try_from(json!([1, 2])).is_err());
        assert!(Context::try_from(json!("scalar")).is_err());
    }

    #[test]
    fn test_deserialize_typed() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Upstream {
            host: String,
            port: u16,
        }

        let context = Context::try_from(json!({ "host": "db", "port": 5432 })).unwrap();
        let upstream: Upstream = context.deserialize().unwrap();
        assert_eq!(
            upstream,
            Upstream {
                host: "db".to_string(),
                port: 5432
            }
        );

        let bad = Context::try_from(json!({ "host": 1 })).unwrap();
        assert!(bad.deserialize::<Upstream>().is_err());
    }
}
