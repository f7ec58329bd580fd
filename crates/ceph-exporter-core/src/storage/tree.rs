//! Payload tree returned by the admin commands.
//!
//! `perf schema` and `perf dump` both answer with arbitrarily nested JSON.
//! Instead of walking `serde_json::Value` with ad-hoc casts, payloads are
//! converted into `PerfValue` and navigated through fallible accessors.

use std::collections::BTreeMap;

/// A node of an admin command payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PerfValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<PerfValue>),
    Map(BTreeMap<String, PerfValue>),
}

impl PerfValue {
    /// Returns an empty map node.
    pub fn empty_map() -> Self {
        PerfValue::Map(BTreeMap::new())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PerfValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PerfValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, PerfValue>> {
        match self {
            PerfValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, PerfValue>> {
        match self {
            PerfValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up a child of a map node. Returns `None` for missing keys and for
    /// nodes that are not maps.
    pub fn get(&self, key: &str) -> Option<&PerfValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Returns `true` for a map with no entries or any non-map node.
    pub fn is_empty(&self) -> bool {
        self.as_map().is_none_or(|m| m.is_empty())
    }
}

impl From<serde_json::Value> for PerfValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PerfValue::Null,
            serde_json::Value::Bool(b) => PerfValue::Bool(b),
            // Integers above 2^53 lose precision, same as the exposition format.
            serde_json::Value::Number(n) => n.as_f64().map_or(PerfValue::Null, PerfValue::Number),
            serde_json::Value::String(s) => PerfValue::String(s),
            serde_json::Value::Array(items) => {
                PerfValue::List(items.into_iter().map(PerfValue::from).collect())
            }
            serde_json::Value::Object(map) => PerfValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, PerfValue::from(v)))
                    .collect(),
            ),
        }
    }
}
