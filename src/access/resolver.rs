//! Inheritance resolver
//!
//! Computes the effective permission map of an access level by walking its
//! parent chain:
//!
//! 1. read the level's explicit map from the store
//! 2. resolve the parent, then fold the parent's siblings into that result
//!    (left to right, with the resource type's merge preference)
//! 3. overlay the explicit map on the folded parent result
//!
//! Results are cached for the lifetime of the resolver, which is meant to
//! live for one request. Entries are keyed by the level's whole lineage, so
//! the same user resolved with a different role set is computed afresh.
//! Writes made through the resolver clear the cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::Value;

use super::level::AccessLevel;
use super::merge::{merge, overlay};
use super::permission::{
    permission_map_from_value, permission_map_to_value, MergePreferences, PermissionMap,
    PermissionValue,
};
use super::store::PermissionStore;

/// A resolved permission plus where it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEntry {
    pub value: PermissionValue,
    /// `false` when the key is set explicitly on the resolved level
    pub inherited: bool,
}

/// Effective permissions of one access level for one resource type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPermissions {
    pub resource_type: String,
    pub entries: BTreeMap<String, BTreeMap<String, ResolvedEntry>>,
}

impl ResolvedPermissions {
    fn tagged(resource_type: &str, merged: PermissionMap, explicit: &PermissionMap) -> Self {
        let entries = merged
            .into_iter()
            .map(|(resource_id, keys)| {
                let own = explicit.get(&resource_id);
                let keys = keys
                    .into_iter()
                    .map(|(key, value)| {
                        let inherited = !own.map(|o| o.contains_key(&key)).unwrap_or(false);
                        (key, ResolvedEntry { value, inherited })
                    })
                    .collect();
                (resource_id, keys)
            })
            .collect();

        Self {
            resource_type: resource_type.to_string(),
            entries,
        }
    }

    pub fn get(&self, resource_id: &str, key: &str) -> Option<&PermissionValue> {
        self.entries
            .get(resource_id)
            .and_then(|keys| keys.get(key))
            .map(|entry| &entry.value)
    }

    /// Whether a key is set on the resolved level itself
    pub fn is_customized(&self, resource_id: &str, key: &str) -> bool {
        self.entries
            .get(resource_id)
            .and_then(|keys| keys.get(key))
            .map(|entry| !entry.inherited)
            .unwrap_or(false)
    }

    /// Whether any key is set on the resolved level itself
    pub fn has_customizations(&self) -> bool {
        self.entries
            .values()
            .any(|keys| keys.values().any(|entry| !entry.inherited))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop the origin tags
    pub fn to_map(&self) -> PermissionMap {
        self.entries
            .iter()
            .map(|(resource_id, keys)| {
                let keys = keys
                    .iter()
                    .map(|(key, entry)| (key.clone(), entry.value.clone()))
                    .collect();
                (resource_id.clone(), keys)
            })
            .collect()
    }
}

/// Request-scoped permission resolver
pub struct InheritanceResolver {
    store: Arc<dyn PermissionStore>,
    preferences: MergePreferences,
    cache: RwLock<HashMap<(String, String), ResolvedPermissions>>,
}

impl InheritanceResolver {
    pub fn new(store: Arc<dyn PermissionStore>, preferences: MergePreferences) -> Self {
        Self {
            store,
            preferences,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn preferences(&self) -> &MergePreferences {
        &self.preferences
    }

    /// Explicit permissions stored for a level, without inheritance
    pub fn read_explicit(&self, level: &AccessLevel, resource_type: &str) -> PermissionMap {
        match self.store.read(&level.storage_key(), resource_type) {
            Some(raw) => permission_map_from_value(&raw),
            None => PermissionMap::new(),
        }
    }

    /// Effective permissions of `level` for `resource_type`
    pub fn resolve(&self, level: &AccessLevel, resource_type: &str) -> ResolvedPermissions {
        let cache_key = (level.lineage_key(), resource_type.to_string());
        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&cache_key)
        {
            return hit.clone();
        }

        let base = self.read_explicit(level, resource_type);
        let merged = match level.parent() {
            Some(parent) => {
                let mut parent_result = self.resolve(parent, resource_type).to_map();

                if !parent.siblings().is_empty() {
                    let preference = self.preferences.for_type(resource_type);
                    for sibling in parent.siblings() {
                        let sibling_result = self.resolve(sibling, resource_type).to_map();
                        parent_result = merge(&sibling_result, &parent_result, preference);
                    }
                    tracing::debug!(
                        "[InheritanceResolver] Folded {} sibling(s) of {} for {} ({:?})",
                        parent.siblings().len(),
                        parent,
                        resource_type,
                        preference
                    );
                }

                overlay(&parent_result, &base)
            }
            None => base.clone(),
        };

        let resolved = ResolvedPermissions::tagged(resource_type, merged, &base);
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(cache_key, resolved.clone());
        resolved
    }

    /// Effective decision for a single key
    ///
    /// Unset keys are off.
    pub fn is_allowed(
        &self,
        level: &AccessLevel,
        resource_type: &str,
        resource_id: &str,
        key: &str,
    ) -> bool {
        self.resolve(level, resource_type)
            .get(resource_id, key)
            .map(PermissionValue::is_enabled)
            .unwrap_or(false)
    }

    /// Set one key explicitly on `level` and persist it
    pub fn set_permission(
        &self,
        level: &AccessLevel,
        resource_type: &str,
        resource_id: &str,
        key: &str,
        value: PermissionValue,
    ) -> bool {
        let mut explicit = self.read_explicit(level, resource_type);
        explicit
            .entry(resource_id.to_string())
            .or_default()
            .insert(key.to_string(), value);

        let written = self.store.write(
            &level.storage_key(),
            resource_type,
            permission_map_to_value(&explicit),
        );
        self.clear_cache();

        tracing::info!(
            "[InheritanceResolver] Set {}.{} on {} for {} (written: {})",
            resource_id,
            key,
            level,
            resource_type,
            written
        );
        written
    }

    /// Remove every explicit permission of `level` for `resource_type`
    pub fn reset(&self, level: &AccessLevel, resource_type: &str) -> bool {
        let written = self.store.write(
            &level.storage_key(),
            resource_type,
            Value::Object(Default::default()),
        );
        self.clear_cache();
        tracing::info!(
            "[InheritanceResolver] Reset {} on {} (written: {})",
            resource_type,
            level,
            written
        );
        written
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl std::fmt::Debug for InheritanceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InheritanceResolver")
            .field("preferences", &self.preferences)
            .field(
                "cached",
                &self.cache.read().map(|c| c.len()).unwrap_or_default(),
            )
            .finish()
    }
}
