//! Scope mapping for connection metadata.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key holding the list of server identifiers
pub const SCOPE_SERVERS: &str = "SENTRY_SERVERS";
/// Key holding the project key
pub const SCOPE_PROJECT: &str = "SENTRY_PROJECT";
/// Key holding the public key
pub const SCOPE_PUBLIC_KEY: &str = "SENTRY_PUBLIC_KEY";
/// Key holding the secret key
pub const SCOPE_SECRET_KEY: &str = "SENTRY_SECRET_KEY";

/// Context the reporting client keeps per connection configuration.
///
/// Transports only add to it; the client decides what else lives here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope {
    entries: HashMap<String, Value>,
}

impl Scope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Get a string value by key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Set a value, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the scope has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

impl From<HashMap<String, Value>> for Scope {
    fn from(entries: HashMap<String, Value>) -> Self {
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let mut scope = Scope::new();
        assert!(scope.is_empty());

        assert_eq!(scope.set(SCOPE_PROJECT, "proj"), None);
        assert_eq!(scope.get_str(SCOPE_PROJECT), Some("proj"));
        assert_eq!(scope.set(SCOPE_PROJECT, "other"), Some(json!("proj")));
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut scope = Scope::new();
        scope.set(SCOPE_SERVERS, json!(["unix://a:b@c/d"]));

        let value = serde_json::to_value(&scope).unwrap();
        assert_eq!(value, json!({ "SENTRY_SERVERS": ["unix://a:b@c/d"] }));

        let back: Scope = serde_json::from_value(value).unwrap();
        assert_eq!(back, scope);
    }
}
