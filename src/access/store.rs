//! Permission store interface
//!
//! The store is owned by the host; this crate only reads and writes raw
//! JSON under `(access_level_key, resource_type)`. The persistence format is
//! the host's business.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

/// Read/write access to explicitly stored permissions
pub trait PermissionStore: Send + Sync {
    /// Raw data stored for an access level and resource type
    ///
    /// May return anything; non-map data is treated as "no permissions".
    fn read(&self, access_level_key: &str, resource_type: &str) -> Option<Value>;

    /// Replace the data stored for an access level and resource type
    fn write(&self, access_level_key: &str, resource_type: &str, data: Value) -> bool;
}

/// In-memory store, shared across requests behind a lock
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    entries: RwLock<HashMap<(String, String), Value>>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_entry(
        self,
        access_level_key: impl Into<String>,
        resource_type: impl Into<String>,
        data: Value,
    ) -> Self {
        self.write(&access_level_key.into(), &resource_type.into(), data);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PermissionStore for MemoryPermissionStore {
    fn read(&self, access_level_key: &str, resource_type: &str) -> Option<Value> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(access_level_key.to_string(), resource_type.to_string()))
            .cloned()
    }

    fn write(&self, access_level_key: &str, resource_type: &str, data: Value) -> bool {
        tracing::debug!(
            "[MemoryPermissionStore] Writing {} for {}",
            resource_type,
            access_level_key
        );
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((access_level_key.to_string(), resource_type.to_string()), data);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_write() {
        let store = MemoryPermissionStore::new();
        assert!(store.is_empty());
        assert!(store.read("default", "post").is_none());

        assert!(store.write("default", "post", json!({"1": {"read": true}})));
        assert_eq!(store.read("default", "post"), Some(json!({"1": {"read": true}})));
        assert!(store.read("default", "menu").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_write_replaces() {
        let store = MemoryPermissionStore::new().with_entry("role:editor", "post", json!({}));
        store.write("role:editor", "post", json!({"2": {"edit": false}}));
        assert_eq!(store.read("role:editor", "post"), Some(json!({"2": {"edit": false}})));
    }
}
