//! Dotted-path configuration store.
//!
//! A read-on-demand view over the merged configuration tree. Lookups
//! take dotted paths (`agent.default_sleep_ms`) and the typed accessors
//! coerce stored strings into the caller's type so a value set as
//! `"500"` still reads as an integer. No observers; `set` simply
//! rewrites the node.

use serde_json::{Map, Value};
use std::sync::RwLock;

/// Nested key/value configuration with dotted-path access.
pub struct ConfigStore {
    values: RwLock<Value>,
}

impl ConfigStore {
    /// Wraps an already-merged configuration tree.
    pub fn from_value(values: Value) -> Self {
        let values = if values.is_object() {
            values
        } else {
            Value::Object(Map::new())
        };
        Self {
            values: RwLock::new(values),
        }
    }

    pub fn empty() -> Self {
        Self::from_value(Value::Object(Map::new()))
    }

    /// Raw lookup; `None` when any path segment is missing.
    pub fn get(&self, path: &str) -> Option<Value> {
        let values = self.values.read().expect("config lock");
        let mut node = &*values;
        for segment in path.split('.') {
            node = node.as_object()?.get(segment)?;
        }
        Some(node.clone())
    }

    /// Sets a value, creating intermediate objects along the path.
    /// A scalar in the middle of the path is replaced by an object.
    pub fn set(&self, path: &str, value: Value) {
        let mut values = self.values.write().expect("config lock");
        let mut node = &mut *values;
        let segments: Vec<&str> = path.split('.').collect();
        for segment in &segments[..segments.len() - 1] {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            node = node
                .as_object_mut()
                .expect("just ensured object")
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node.as_object_mut()
            .expect("just ensured object")
            .insert(segments[segments.len() - 1].to_string(), value);
    }

    /// Integer lookup with string coercion.
    pub fn get_i64(&self, path: &str, default: i64) -> i64 {
        match self.get(path) {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            Some(Value::Bool(b)) => i64::from(b),
            _ => default,
        }
    }

    /// Float lookup with string coercion.
    pub fn get_f64(&self, path: &str, default: f64) -> f64 {
        match self.get(path) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Bool lookup; accepts the usual string spellings and 0/1.
    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        match self.get(path) {
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => true,
                "false" | "no" | "off" | "0" => false,
                _ => default,
            },
            Some(Value::Number(n)) => n.as_i64().map_or(default, |v| v != 0),
            _ => default,
        }
    }

    /// String lookup; numbers and bools render to their display form.
    pub fn get_str(&self, path: &str, default: &str) -> String {
        match self.get(path) {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => default.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> ConfigStore {
        ConfigStore::from_value(json!({
            "agent": {
                "default_sleep_ms": 1000,
                "paused_sleep_ms": "500",
                "auto_restart": "yes",
                "xp_decay_rate": "0.999",
            },
            "storage": { "path": ".syndicate/agents.json" },
        }))
    }

    #[test]
    fn dotted_get() {
        let store = store();
        assert_eq!(store.get("agent.default_sleep_ms"), Some(json!(1000)));
        assert_eq!(store.get("agent.missing"), None);
        assert_eq!(store.get("missing.path"), None);
    }

    #[test]
    fn string_values_coerce_to_caller_types() {
        let store = store();
        assert_eq!(store.get_i64("agent.paused_sleep_ms", 0), 500);
        assert!((store.get_f64("agent.xp_decay_rate", 0.0) - 0.999).abs() < f64::EPSILON);
        assert!(store.get_bool("agent.auto_restart", false));
    }

    #[test]
    fn defaults_apply_on_missing_or_unparseable() {
        let store = store();
        assert_eq!(store.get_i64("agent.nope", 42), 42);
        assert_eq!(store.get_i64("storage.path", 42), 42);
        assert_eq!(store.get_str("agent.default_sleep_ms", ""), "1000");
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let store = ConfigStore::empty();
        store.set("swarm.backend", json!("memory"));
        store.set("swarm.channel_capacity", json!(100));

        assert_eq!(store.get_str("swarm.backend", ""), "memory");
        assert_eq!(store.get_i64("swarm.channel_capacity", 0), 100);
    }

    #[test]
    fn set_replaces_scalar_in_path() {
        let store = store();
        store.set("storage.path.nested", json!(1));
        assert_eq!(store.get_i64("storage.path.nested", 0), 1);
    }
}
