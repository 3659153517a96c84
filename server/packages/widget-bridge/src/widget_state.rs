use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

/// Host-side persistence of opaque widget state blobs, keyed per widget.
/// Last write wins.
#[derive(Debug, Clone, Default)]
pub struct WidgetStateStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl WidgetStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let Ok(guard) = self.entries.read() else {
            tracing::warn!(key = key, "widget state lock poisoned");
            return None;
        };
        guard.get(key).cloned()
    }

    pub fn set(&self, key: &str, state: Value) {
        if let Ok(mut guard) = self.entries.write() {
            guard.insert(key.to_string(), state);
        } else {
            tracing::warn!(key = key, "widget state lock poisoned; write dropped");
        }
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.write().ok()?.remove(key)
    }
}
