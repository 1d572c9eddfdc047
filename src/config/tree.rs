//! Parsed configuration tree

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use super::parser::{deep_merge, ConfigParser};
use crate::core::value::is_truthy;
use crate::core::{DiagnosticsSink, PolicyResult};
use crate::expression::{EvalContext, ExpressionEvaluator};

/// Nested configuration, read with dotted paths
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigTree {
    root: Value,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wrap an already-built tree
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Parse configuration text
    ///
    /// Section problems go to `sink`; only an evaluator setup failure is an
    /// error here.
    pub fn parse(text: &str, ctx: &EvalContext, sink: &dyn DiagnosticsSink) -> PolicyResult<Self> {
        let evaluator = ExpressionEvaluator::new()?;
        let root = ConfigParser::new(&evaluator, ctx, sink).parse(text);
        Ok(Self { root })
    }

    /// Read and parse a configuration file
    pub fn from_file(
        path: impl AsRef<Path>,
        ctx: &EvalContext,
        sink: &dyn DiagnosticsSink,
    ) -> PolicyResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        tracing::info!("[ConfigTree] Loaded configuration from {}", path.display());
        Self::parse(&text, ctx, sink)
    }

    /// Value at a dotted path
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .filter(|s| !s.is_empty())
            .try_fold(&self.root, |current, segment| match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Truthiness of a path, `default` when unset
    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        self.get(path).map(is_truthy).unwrap_or(default)
    }

    /// Merge another tree on top of this one
    pub fn merge(&mut self, other: ConfigTree) {
        deep_merge(&mut self.root, other.root);
    }

    pub fn root(&self) -> &Value {
        &self.root
    }
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CollectingDiagnostics, Severity};
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_get_paths() {
        let tree = ConfigTree::from_value(json!({
            "core": {"settings": {"enabled": "1", "name": "main", "list": [10, 20]}}
        }));

        assert_eq!(tree.get("core.settings.list.1"), Some(&json!(20)));
        assert_eq!(tree.get_str("core.settings.name"), Some("main"));
        assert!(tree.get_bool("core.settings.enabled", false));
        assert!(tree.get_bool("core.settings.missing", true));
        assert!(tree.get("core.nothing.here").is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("access.ini");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[core]").unwrap();
        writeln!(file, "settings.post.merge.preference = allow").unwrap();
        writeln!(file, "[0 as never]").unwrap();
        writeln!(file, "x = 1").unwrap();

        let sink = CollectingDiagnostics::new();
        let tree = ConfigTree::from_file(&path, &EvalContext::new(), &sink).unwrap();

        assert_eq!(tree.get_str("core.settings.post.merge.preference"), Some("allow"));
        assert!(tree.get("never").is_none());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let sink = CollectingDiagnostics::new();
        let result = ConfigTree::from_file(temp_dir.path().join("nope.ini"), &EvalContext::new(), &sink);
        assert!(matches!(result, Err(crate::core::PolicyError::Io(_))));
    }

    #[test]
    fn test_parse_reports_bad_sections() {
        let sink = CollectingDiagnostics::new();
        let tree = ConfigTree::parse("[ok]\na = 1\n[bad]\nnope\n", &EvalContext::new(), &sink).unwrap();
        assert_eq!(tree.get("ok.a"), Some(&json!(1)));
        assert_eq!(sink.count_at_least(Severity::Error), 1);
    }

    #[test]
    fn test_merge_trees() {
        let mut base = ConfigTree::from_value(json!({"a": {"b": 1}}));
        base.merge(ConfigTree::from_value(json!({"a": {"c": 2}})));
        assert_eq!(base.root(), &json!({"a": {"b": 1, "c": 2}}));
    }
}
