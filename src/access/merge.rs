//! Combining permission maps
//!
//! Two operations:
//! - `merge` - fold co-equal maps (sibling roles) using a `MergePreference`
//! - `overlay` - put a more specific map on top of an inherited one
//!
//! # Merge rule
//!
//! Per `(resource_id, key)` over the union of both sides, a missing side
//! counts as `false`:
//!
//! | preference | combined |
//! |------------|----------|
//! | `deny`     | `a OR b` |
//! | `allow`    | `a AND b`|
//!
//! Flags become `combined`. Structured values are never merged field by
//! field: the result is whichever side's own `enabled` equals `combined`
//! (the second side on a tie), so thresholds and messages stay with the
//! decision that produced them. A one-sided structured value keeps its
//! fields and only has `enabled` rewritten.

use super::permission::{MergePreference, PermissionMap, PermissionValue, ResourcePermissions};

/// Merge two maps key by key
pub fn merge(a: &PermissionMap, b: &PermissionMap, preference: MergePreference) -> PermissionMap {
    let empty = ResourcePermissions::new();
    let mut result = PermissionMap::new();

    for resource_id in a.keys().chain(b.keys()) {
        if result.contains_key(resource_id) {
            continue;
        }
        let left = a.get(resource_id).unwrap_or(&empty);
        let right = b.get(resource_id).unwrap_or(&empty);

        let mut merged = ResourcePermissions::new();
        for key in left.keys().chain(right.keys()) {
            if merged.contains_key(key) {
                continue;
            }
            merged.insert(
                key.clone(),
                merge_value(left.get(key), right.get(key), preference),
            );
        }
        result.insert(resource_id.clone(), merged);
    }

    result
}

/// Merge a single permission value
pub fn merge_value(
    a: Option<&PermissionValue>,
    b: Option<&PermissionValue>,
    preference: MergePreference,
) -> PermissionValue {
    let left = a.map(PermissionValue::is_enabled).unwrap_or(false);
    let right = b.map(PermissionValue::is_enabled).unwrap_or(false);

    let combined = match preference {
        MergePreference::Deny => left || right,
        MergePreference::Allow => left && right,
    };

    match (a, b) {
        (Some(a), Some(b)) if a.is_structured() || b.is_structured() => {
            if left == combined && right != combined {
                a.clone()
            } else {
                b.clone()
            }
        }
        (Some(only), None) | (None, Some(only)) => only.with_enabled(combined),
        _ => PermissionValue::Flag(combined),
    }
}

/// Put `base` on top of `inherited`
///
/// Every key present in `base` wins outright; every other key is taken from
/// `inherited`.
pub fn overlay(inherited: &PermissionMap, base: &PermissionMap) -> PermissionMap {
    let mut result = inherited.clone();
    for (resource_id, keys) in base {
        let entry = result.entry(resource_id.clone()).or_default();
        for (key, value) in keys {
            entry.insert(key.clone(), value.clone());
        }
    }
    result
}
