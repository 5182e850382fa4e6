//! Opaque `extensions` / `extras` payloads.
//!
//! The decoder never interprets these; they are kept verbatim next to the
//! entity that carried them so a host can read application-specific data.
//! `extras` may hold any JSON value: objects become keyed entries, `null` is
//! empty, and anything else is kept whole as [`PropertyBag::value`].

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Untyped key-value bag with typed accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    entries: BTreeMap<String, Value>,
    other: Option<Value>,
}

impl<'de> Deserialize<'de> for PropertyBag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(PropertyBag::from)
    }
}

impl From<Value> for PropertyBag {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::default(),
            Value::Object(map) => Self {
                entries: map.into_iter().collect(),
                other: None,
            },
            other => Self {
                entries: BTreeMap::new(),
                other: Some(other),
            },
        }
    }
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.other.is_none()
    }

    /// Number of keyed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The payload when it was not a JSON object.
    pub fn value(&self) -> Option<&Value> {
        self.other.as_ref()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Raw JSON value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.entries.get(key).and_then(Value::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.entries.get(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.entries.get(key).and_then(Value::as_bool)
    }

    /// Nested object stored under `key`, as its own bag.
    pub fn get_bag(&self, key: &str) -> Option<PropertyBag> {
        match self.entries.get(key) {
            Some(value @ Value::Object(_)) => Some(PropertyBag::from(value.clone())),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_accessors() {
        let bag: PropertyBag = serde_json::from_value(json!({
            "author": "someone",
            "weight": 0.5,
            "lod": 2,
            "hidden": true,
            "nested": {"key": "value"}
        }))
        .unwrap();

        assert_eq!(bag.len(), 5);
        assert_eq!(bag.get_str("author"), Some("someone"));
        assert_eq!(bag.get_f64("weight"), Some(0.5));
        assert_eq!(bag.get_i64("lod"), Some(2));
        assert_eq!(bag.get_bool("hidden"), Some(true));
        assert_eq!(bag.get_bag("nested").unwrap().get_str("key"), Some("value"));

        // Wrong type is absent, not coerced
        assert_eq!(bag.get_str("lod"), None);
        assert!(bag.get_bag("author").is_none());
    }

    #[test]
    fn test_non_object_payloads_kept() {
        let bag: PropertyBag = serde_json::from_value(json!("door")).unwrap();
        assert!(!bag.is_empty());
        assert_eq!(bag.len(), 0);
        assert_eq!(bag.value(), Some(&json!("door")));
        assert_eq!(bag.get_str("door"), None);

        let bag: PropertyBag = serde_json::from_value(json!([1, 2])).unwrap();
        assert_eq!(bag.value(), Some(&json!([1, 2])));

        let bag: PropertyBag = serde_json::from_value(Value::Null).unwrap();
        assert!(bag.is_empty());
        assert_eq!(bag.value(), None);
    }

    #[test]
    fn test_insert_and_keys() {
        let mut bag = PropertyBag::new();
        assert!(bag.is_empty());
        bag.insert("b", json!(1));
        bag.insert("a", json!(2));
        assert!(bag.contains("a"));
        assert_eq!(bag.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
