//! Section-based configuration parser
//!
//! ```text
//! ; keys before the first section land in the root
//! core.settings.merge.preference = deny
//!
//! [$user.level >= 3 as editor]
//! toolbar.hidden[] = comments
//! toolbar.hidden[] = media
//! redirect.url = "/dashboard"
//! ```
//!
//! Every section header is an expression. A section is kept only when its
//! header is truthy, and it is stored under the header's alias. Bodies are
//! `dotted.key = value` lines expanded into nested maps.

use serde_json::{Map, Value};

use crate::core::value::parse_literal;
use crate::core::{DiagnosticsSink, PolicyError, Severity};
use crate::expression::{EvalContext, ExpressionEvaluator};

/// Suffix that turns a key into a list append
const APPEND_SUFFIX: &str = "[]";

#[derive(Debug)]
struct Entry {
    key: String,
    value: Value,
}

#[derive(Debug)]
struct Section {
    header: String,
    line: usize,
    entries: Vec<Entry>,
    problem: Option<PolicyError>,
}

/// One-shot parser bound to an evaluator, a context and a sink
pub struct ConfigParser<'a> {
    evaluator: &'a ExpressionEvaluator,
    ctx: &'a EvalContext,
    sink: &'a dyn DiagnosticsSink,
}

impl<'a> ConfigParser<'a> {
    pub fn new(
        evaluator: &'a ExpressionEvaluator,
        ctx: &'a EvalContext,
        sink: &'a dyn DiagnosticsSink,
    ) -> Self {
        Self {
            evaluator,
            ctx,
            sink,
        }
    }

    /// Parse configuration text into a nested map
    ///
    /// Never fails: malformed sections are reported and left out.
    pub fn parse(&self, text: &str) -> Value {
        let mut root_entries = Vec::new();
        let mut sections: Vec<Section> = Vec::new();

        for (index, raw_line) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw_line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') {
                let problem = if line.ends_with(']') && line.len() > 2 {
                    None
                } else {
                    Some(PolicyError::config(line_no, format!("malformed section header '{}'", line)))
                };
                let header = line
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .trim()
                    .to_string();
                sections.push(Section {
                    header,
                    line: line_no,
                    entries: Vec::new(),
                    problem,
                });
                continue;
            }

            let entry = parse_entry(line, line_no);
            match (sections.last_mut(), entry) {
                (Some(section), Ok(entry)) => section.entries.push(entry),
                (Some(section), Err(e)) => {
                    if section.problem.is_none() {
                        section.problem = Some(e);
                    }
                }
                (None, Ok(entry)) => root_entries.push(entry),
                (None, Err(e)) => self.sink.report(&e.to_string(), Severity::Warning),
            }
        }

        let mut root = expand(root_entries);

        for section in sections {
            if let Some(problem) = section.problem {
                self.sink.report(
                    &format!("Skipping section [{}]: {}", section.header, problem),
                    Severity::Error,
                );
                continue;
            }

            let evaluation = match self.evaluator.try_evaluate(&section.header, self.ctx) {
                Ok(evaluation) => evaluation,
                Err(e) => {
                    let problem = PolicyError::config(section.line, e.to_string());
                    self.sink.report(
                        &format!("Skipping section [{}]: {}", section.header, problem),
                        Severity::Error,
                    );
                    continue;
                }
            };

            if !evaluation.is_truthy() {
                tracing::debug!(
                    "[ConfigParser] Section [{}] is inactive, skipping",
                    section.header
                );
                continue;
            }

            let mut wrapper = Map::new();
            wrapper.insert(evaluation.alias, expand(section.entries));
            deep_merge(&mut root, Value::Object(wrapper));
        }

        root
    }
}

fn parse_entry(line: &str, line_no: usize) -> Result<Entry, PolicyError> {
    let Some((key, value)) = line.split_once('=') else {
        return Err(PolicyError::config(line_no, format!("expected 'key = value', got '{}'", line)));
    };
    let key = key.trim();
    if key.is_empty() || key.trim_end_matches(APPEND_SUFFIX).split('.').any(str::is_empty) {
        return Err(PolicyError::config(line_no, format!("invalid key in '{}'", line)));
    }

    Ok(Entry {
        key: key.to_string(),
        value: parse_literal(value),
    })
}

/// Expand `a.b.c = v` entries into nested maps
fn expand(entries: Vec<Entry>) -> Value {
    let mut root = Value::Object(Map::new());

    for Entry { key, value } in entries {
        let (path, append) = match key.strip_suffix(APPEND_SUFFIX) {
            Some(path) => (path, true),
            None => (key.as_str(), false),
        };
        let segments: Vec<&str> = path.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            continue;
        };

        let mut current = &mut root;
        for segment in parents {
            current = child_object(current, segment);
        }

        let Value::Object(map) = current else {
            continue;
        };
        if append {
            let slot = map
                .entry(last.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(items) = slot {
                items.push(value);
            }
        } else {
            map.insert(last.to_string(), value);
        }
    }

    root
}

/// Child map under `key`, replacing scalars that are in the way
fn child_object<'v>(parent: &'v mut Value, key: &str) -> &'v mut Value {
    if !parent.is_object() {
        *parent = Value::Object(Map::new());
    }
    let child = &mut parent[key];
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    child
}

/// Recursively merge `source` into `target`; non-map values replace
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CollectingDiagnostics;
    use serde_json::json;

    fn parse_with(text: &str, ctx: &EvalContext) -> (Value, CollectingDiagnostics) {
        let evaluator = ExpressionEvaluator::new().unwrap();
        let sink = CollectingDiagnostics::new();
        let value = ConfigParser::new(&evaluator, ctx, &sink).parse(text);
        (value, sink)
    }

    fn parse(text: &str) -> (Value, CollectingDiagnostics) {
        parse_with(text, &EvalContext::new())
    }

    #[test]
    fn test_dotted_keys_expand() {
        let (value, sink) = parse("[core]\na.b.c = 1\na.b.d = text \na.e = true\n");
        assert!(sink.is_empty());
        assert_eq!(
            value,
            json!({"core": {"a": {"b": {"c": 1, "d": "text"}, "e": true}}})
        );
    }

    #[test]
    fn test_root_keys_and_comments() {
        let (value, _) = parse("; comment\n# another\nx.y = 2\n\n[s]\nk = v\n");
        assert_eq!(value, json!({"x": {"y": 2}, "s": {"k": "v"}}));
    }

    #[test]
    fn test_conditional_sections() {
        let ctx = EvalContext::new().with_var("user", json!({"level": 5}));
        let text = "\
[$user.level >= 3 as editor]
toolbar.hidden = false

[$user.level > 10 as admin]
everything = true
";
        let (value, sink) = parse_with(text, &ctx);
        assert!(sink.is_empty());
        assert_eq!(value, json!({"editor": {"toolbar": {"hidden": false}}}));
    }

    #[test]
    fn test_list_append_and_quotes() {
        let (value, _) = parse("[menu]\nhidden[] = posts\nhidden[] = ' media '\n");
        assert_eq!(value, json!({"menu": {"hidden": ["posts", " media "]}}));
    }

    #[test]
    fn test_repeated_sections_merge() {
        let (value, _) = parse("[core]\na = 1\nb.c = 2\n[core]\nb.d = 3\na = 4\n");
        assert_eq!(value, json!({"core": {"a": 4, "b": {"c": 2, "d": 3}}}));
    }

    #[test]
    fn test_malformed_section_is_reported_and_skipped() {
        let text = "\
[good]
k = 1
[broken]
this line has no equals sign
k = 2
[(1 + ]
k = 3
[also good]
k = 4
";
        let (value, sink) = parse(text);
        assert_eq!(value, json!({"good": {"k": 1}, "also good": {"k": 4}}));
        assert_eq!(sink.count_at_least(Severity::Error), 2);
    }

    #[test]
    fn test_unterminated_header_is_malformed() {
        let (value, sink) = parse("[core\nk = 1\n");
        assert_eq!(value, json!({}));
        assert_eq!(sink.count_at_least(Severity::Error), 1);
    }

    #[test]
    fn test_deep_merge_replaces_scalars() {
        let mut target = json!({"a": {"b": 1}, "c": [1]});
        deep_merge(&mut target, json!({"a": {"d": 2}, "c": [2]}));
        assert_eq!(target, json!({"a": {"b": 1, "d": 2}, "c": [2]}));
    }
}
