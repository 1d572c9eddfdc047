//! Permission values, maps and merge preferences

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ConfigTree;
use crate::core::value::is_truthy;
use crate::core::PolicyError;

/// Field carrying the decision inside a structured value
pub const ENABLED_FIELD: &str = "enabled";

/// Value stored for a single permission key
///
/// Either a plain flag, or a structured value whose `enabled` field carries
/// the decision and whose other fields (threshold, message, ...) travel
/// along with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionValue {
    Flag(bool),
    Structured(Map<String, Value>),
}

impl PermissionValue {
    /// Interpret a raw store value
    ///
    /// Objects become structured values; anything else is read as a
    /// boolean-like flag (`1`, `"1"`, `true` are on).
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => PermissionValue::Structured(map.clone()),
            other => PermissionValue::Flag(is_truthy(other)),
        }
    }

    /// Effective decision
    ///
    /// A structured value without an `enabled` field counts as off.
    pub fn is_enabled(&self) -> bool {
        match self {
            PermissionValue::Flag(b) => *b,
            PermissionValue::Structured(map) => {
                map.get(ENABLED_FIELD).map(is_truthy).unwrap_or(false)
            }
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, PermissionValue::Structured(_))
    }

    /// Copy of this value with its decision replaced
    ///
    /// Auxiliary fields of a structured value are kept as they are.
    pub fn with_enabled(&self, enabled: bool) -> Self {
        match self {
            PermissionValue::Flag(_) => PermissionValue::Flag(enabled),
            PermissionValue::Structured(map) => {
                let mut map = map.clone();
                map.insert(ENABLED_FIELD.to_string(), Value::Bool(enabled));
                PermissionValue::Structured(map)
            }
        }
    }

    /// Auxiliary field of a structured value
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            PermissionValue::Structured(map) => map.get(name),
            PermissionValue::Flag(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            PermissionValue::Flag(b) => Value::Bool(*b),
            PermissionValue::Structured(map) => Value::Object(map.clone()),
        }
    }
}

impl From<bool> for PermissionValue {
    fn from(value: bool) -> Self {
        PermissionValue::Flag(value)
    }
}

/// Permission keys of a single resource
pub type ResourcePermissions = BTreeMap<String, PermissionValue>;

/// `resource_id -> permission_key -> value` for one resource type
pub type PermissionMap = BTreeMap<String, ResourcePermissions>;

/// Build a permission map from raw store data
///
/// Anything that is not an object is treated as an empty map, and resource
/// entries that are not objects are dropped.
pub fn permission_map_from_value(value: &Value) -> PermissionMap {
    let Value::Object(resources) = value else {
        if !value.is_null() {
            tracing::warn!("[PermissionMap] Ignoring non-map permission data: {}", value);
        }
        return PermissionMap::new();
    };

    let mut map = PermissionMap::new();
    for (resource_id, keys) in resources {
        let Value::Object(keys) = keys else {
            tracing::warn!(
                "[PermissionMap] Ignoring non-map entry for resource '{}'",
                resource_id
            );
            continue;
        };

        let entry: ResourcePermissions = keys
            .iter()
            .map(|(key, raw)| (key.clone(), PermissionValue::from_value(raw)))
            .collect();
        map.insert(resource_id.clone(), entry);
    }
    map
}

/// Serialize a permission map back into store data
pub fn permission_map_to_value(map: &PermissionMap) -> Value {
    let resources: Map<String, Value> = map
        .iter()
        .map(|(resource_id, keys)| {
            let keys: Map<String, Value> = keys
                .iter()
                .map(|(key, value)| (key.clone(), value.to_value()))
                .collect();
            (resource_id.clone(), Value::Object(keys))
        })
        .collect();
    Value::Object(resources)
}

/// Which side wins when two permission values are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePreference {
    /// Restrictive wins: the merged key is on if either side is on
    #[default]
    Deny,
    /// Permissive wins: the merged key is on only if both sides are on
    Allow,
}

impl FromStr for MergePreference {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deny" => Ok(MergePreference::Deny),
            "allow" => Ok(MergePreference::Allow),
            other => Err(PolicyError::statement(format!(
                "merge preference must be 'allow' or 'deny', got '{}'",
                other
            ))),
        }
    }
}

/// Merge preference per resource type
#[derive(Debug, Clone, Default)]
pub struct MergePreferences {
    default: MergePreference,
    per_type: HashMap<String, MergePreference>,
}

impl MergePreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the preference used for types without an explicit entry
    pub fn with_default(mut self, preference: MergePreference) -> Self {
        self.default = preference;
        self
    }

    pub fn with(mut self, resource_type: impl Into<String>, preference: MergePreference) -> Self {
        self.set(resource_type, preference);
        self
    }

    pub fn set(&mut self, resource_type: impl Into<String>, preference: MergePreference) {
        self.per_type.insert(resource_type.into(), preference);
    }

    pub fn for_type(&self, resource_type: &str) -> MergePreference {
        self.per_type
            .get(resource_type)
            .copied()
            .unwrap_or(self.default)
    }

    /// Read preferences from configuration
    ///
    /// `core.settings.merge.preference` sets the default and
    /// `core.settings.<type>.merge.preference` sets a single type. Invalid
    /// values are logged and ignored.
    pub fn from_config(config: &ConfigTree) -> Self {
        let mut prefs = Self::new();

        if let Some(raw) = config.get_str("core.settings.merge.preference") {
            match raw.parse() {
                Ok(pref) => prefs.default = pref,
                Err(e) => tracing::warn!("[MergePreferences] {}", e),
            }
        }

        let Some(Value::Object(settings)) = config.get("core.settings") else {
            return prefs;
        };

        for (resource_type, section) in settings {
            let raw = section
                .get("merge")
                .and_then(|m| m.get("preference"))
                .and_then(Value::as_str);
            let Some(raw) = raw else { continue };
            match raw.parse() {
                Ok(pref) => prefs.set(resource_type.clone(), pref),
                Err(e) => tracing::warn!("[MergePreferences] {} ({})", e, resource_type),
            }
        }

        prefs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_flag_and_structured() {
        assert_eq!(PermissionValue::from_value(&json!(1)), PermissionValue::Flag(true));
        assert_eq!(PermissionValue::from_value(&json!("0")), PermissionValue::Flag(false));

        let structured = PermissionValue::from_value(&json!({"enabled": true, "threshold": 3}));
        assert!(structured.is_structured());
        assert!(structured.is_enabled());
        assert_eq!(structured.field("threshold"), Some(&json!(3)));
    }

    #[test]
    fn test_structured_without_enabled_is_off() {
        let value = PermissionValue::from_value(&json!({"message": "nope"}));
        assert!(!value.is_enabled());
    }

    #[test]
    fn test_with_enabled_keeps_fields() {
        let value = PermissionValue::from_value(&json!({"enabled": true, "message": "m"}));
        let flipped = value.with_enabled(false);
        assert!(!flipped.is_enabled());
        assert_eq!(flipped.field("message"), Some(&json!("m")));
    }

    #[test]
    fn test_corrupted_map_is_empty() {
        assert!(permission_map_from_value(&json!("garbage")).is_empty());
        assert!(permission_map_from_value(&json!([1, 2])).is_empty());

        let map = permission_map_from_value(&json!({"12": {"read": true}, "13": 5}));
        assert_eq!(map.len(), 1);
        assert!(map["12"]["read"].is_enabled());
    }

    #[test]
    fn test_map_value_conversion() {
        let raw = json!({"12": {"read": true, "edit": {"enabled": false, "limit": 2}}});
        let map = permission_map_from_value(&raw);
        assert_eq!(permission_map_to_value(&map), raw);
    }

    #[test]
    fn test_preference_parse() {
        assert_eq!("Allow".parse::<MergePreference>().unwrap(), MergePreference::Allow);
        assert_eq!(" deny ".parse::<MergePreference>().unwrap(), MergePreference::Deny);
        assert!("maybe".parse::<MergePreference>().is_err());
        assert_eq!(MergePreference::default(), MergePreference::Deny);
    }

    #[test]
    fn test_preferences_lookup() {
        let prefs = MergePreferences::new().with("post", MergePreference::Allow);
        assert_eq!(prefs.for_type("post"), MergePreference::Allow);
        assert_eq!(prefs.for_type("menu"), MergePreference::Deny);
    }

    #[test]
    fn test_preferences_from_config() {
        let config = ConfigTree::from_value(json!({
            "core": {"settings": {
                "merge": {"preference": "allow"},
                "menu": {"merge": {"preference": "deny"}},
                "route": {"merge": {"preference": "bogus"}}
            }}
        }));
        let prefs = MergePreferences::from_config(&config);

        assert_eq!(prefs.for_type("post"), MergePreference::Allow);
        assert_eq!(prefs.for_type("menu"), MergePreference::Deny);
        assert_eq!(prefs.for_type("route"), MergePreference::Allow);
    }
}
