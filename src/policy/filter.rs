//! Response filters
//!
//! A response of the form `&:filter(<source> <op> <literal>)` narrows an
//! iterable chain value instead of replacing it:
//!
//! | Source | Meaning |
//! |--------|---------|
//! | `$key` | the entry's index or key |
//! | `$value` | the entry itself |
//! | `$value.a.b` | a field inside the entry |
//!
//! Operators: `==` `!=` `*=` (contains) `^=` (starts with) `$=` (ends with)
//! `in` `!in` `>` `<` `>=` `<=`. Set literals for `in`/`!in` may be written
//! `(a, b)`, `[a, b]` or `a, b`.

use regex::Regex;
use serde_json::{Map, Value};

use crate::core::value::{as_text, compare, loose_eq, parse_literal};
use crate::core::{PolicyError, PolicyResult};

const FILTER_PATTERN: &str = r"^\s*&:filter\((?s)(.*)\)\s*$";
const MODIFIER_PATTERN: &str =
    r"^\s*\$(key|value)((?:\.[^\s.]+)*)\s+(==|!=|\*=|\^=|\$=|!in|in|>=|<=|>|<)\s+(.*?)\s*$";

static NULL: Value = Value::Null;

/// Whether a string looks like a filter response
pub fn is_filter(text: &str) -> bool {
    let text = text.trim();
    text.starts_with("&:filter(") && text.ends_with(')')
}

#[derive(Debug, Clone, PartialEq)]
enum Source {
    Key,
    Value(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    NotEq,
    Contains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Operator {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "==" => Operator::Eq,
            "!=" => Operator::NotEq,
            "*=" => Operator::Contains,
            "^=" => Operator::StartsWith,
            "$=" => Operator::EndsWith,
            "in" => Operator::In,
            "!in" => Operator::NotIn,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            ">=" => Operator::Ge,
            "<=" => Operator::Le,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Single(Value),
    Set(Vec<Value>),
}

/// A parsed `&:filter(...)` expression
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    source: Source,
    operator: Operator,
    operand: Operand,
}

/// Compiled filter grammar
///
/// Build one per policy load and reuse it for every response.
#[derive(Debug, Clone)]
pub struct FilterParser {
    outer: Regex,
    modifier: Regex,
}

impl FilterParser {
    pub fn new() -> PolicyResult<Self> {
        Ok(Self {
            outer: Regex::new(FILTER_PATTERN)?,
            modifier: Regex::new(MODIFIER_PATTERN)?,
        })
    }

    /// Parse `&:filter(<modifier>)`
    pub fn parse(&self, text: &str) -> PolicyResult<Filter> {
        let modifier = self
            .outer
            .captures(text)
            .and_then(|c| c.get(1))
            .ok_or_else(|| PolicyError::InvalidFilter(text.to_string()))?
            .as_str();
        self.parse_modifier(modifier)
    }

    /// Parse the bare `<source> <op> <literal>` part
    pub fn parse_modifier(&self, modifier: &str) -> PolicyResult<Filter> {
        let caps = self
            .modifier
            .captures(modifier)
            .ok_or_else(|| PolicyError::InvalidFilter(modifier.to_string()))?;

        let path: Vec<String> = caps
            .get(2)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split('.')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        let source = match caps.get(1).map(|m| m.as_str()) {
            Some("key") if path.is_empty() => Source::Key,
            Some("value") => Source::Value(path),
            _ => return Err(PolicyError::InvalidFilter(modifier.to_string())),
        };

        let operator = caps
            .get(3)
            .and_then(|m| Operator::parse(m.as_str()))
            .ok_or_else(|| PolicyError::InvalidFilter(modifier.to_string()))?;

        let raw = caps.get(4).map(|m| m.as_str()).unwrap_or_default();
        let operand = match operator {
            Operator::In | Operator::NotIn => Operand::Set(parse_set(raw)),
            _ => Operand::Single(parse_literal(raw)),
        };

        Ok(Filter {
            source,
            operator,
            operand,
        })
    }

    /// Interpret a statement's raw response
    ///
    /// A filter string, or a non-empty list made only of filter strings,
    /// becomes a filter chain. Anything else is a literal.
    pub fn response(&self, value: &Value) -> PolicyResult<Response> {
        match value {
            Value::String(text) if is_filter(text) => Ok(Response::Filters(vec![self.parse(text)?])),
            Value::Array(items)
                if !items.is_empty()
                    && items.iter().all(|i| i.as_str().is_some_and(is_filter)) =>
            {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|text| self.parse(text))
                    .collect::<PolicyResult<Vec<_>>>()
                    .map(Response::Filters)
            }
            other => Ok(Response::Literal(other.clone())),
        }
    }
}

impl Filter {
    /// Keep the entries of `input` the comparison holds for
    ///
    /// Lists stay lists (in order), maps keep their keys. Anything else is
    /// returned unchanged.
    pub fn apply(&self, input: &Value) -> Value {
        match input {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .filter(|(index, item)| self.matches(&Value::from(*index), item))
                    .map(|(_, item)| item.clone())
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(key, item)| self.matches(&Value::String((*key).clone()), item))
                    .map(|(key, item)| (key.clone(), item.clone()))
                    .collect::<Map<String, Value>>(),
            ),
            other => {
                tracing::debug!("[Filter] Input is not iterable, returning it unchanged");
                other.clone()
            }
        }
    }

    fn matches(&self, key: &Value, item: &Value) -> bool {
        let actual = match &self.source {
            Source::Key => key,
            Source::Value(path) => lookup(item, path),
        };

        match (&self.operand, self.operator) {
            (Operand::Set(set), Operator::In) => set.iter().any(|v| loose_eq(actual, v)),
            (Operand::Set(set), Operator::NotIn) => !set.iter().any(|v| loose_eq(actual, v)),
            (Operand::Single(expected), op) => compare_single(actual, op, expected),
            (Operand::Set(_), _) => false,
        }
    }
}

fn compare_single(actual: &Value, op: Operator, expected: &Value) -> bool {
    match op {
        Operator::Eq => loose_eq(actual, expected),
        Operator::NotEq => !loose_eq(actual, expected),
        Operator::Contains => match actual {
            Value::Array(items) => items.iter().any(|v| loose_eq(v, expected)),
            _ => as_text(actual).contains(&as_text(expected)),
        },
        Operator::StartsWith => as_text(actual).starts_with(&as_text(expected)),
        Operator::EndsWith => as_text(actual).ends_with(&as_text(expected)),
        Operator::Gt => compare(actual, expected).is_some_and(|o| o.is_gt()),
        Operator::Lt => compare(actual, expected).is_some_and(|o| o.is_lt()),
        Operator::Ge => compare(actual, expected).is_some_and(|o| o.is_ge()),
        Operator::Le => compare(actual, expected).is_some_and(|o| o.is_le()),
        Operator::In | Operator::NotIn => false,
    }
}

fn lookup<'v>(value: &'v Value, path: &[String]) -> &'v Value {
    let mut current = value;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get(segment).unwrap_or(&NULL),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .unwrap_or(&NULL),
            _ => &NULL,
        };
    }
    current
}

fn parse_set(raw: &str) -> Vec<Value> {
    let raw = raw.trim();
    let inner = raw
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .or_else(|| raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')))
        .unwrap_or(raw);

    inner
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(parse_literal)
        .collect()
}

/// Resolved form of a statement's response
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Used as-is
    Literal(Value),
    /// Applied in order, each one narrowing the previous output
    Filters(Vec<Filter>),
}

impl Response {
    /// Whether the response is a literal map
    pub fn is_map(&self) -> bool {
        matches!(self, Response::Literal(Value::Object(_)))
    }

    /// Produce the value a chain callback should return for `current`
    pub fn resolve(&self, current: &Value) -> Value {
        match self {
            Response::Literal(value) => value.clone(),
            Response::Filters(filters) => filters
                .iter()
                .fold(current.clone(), |acc, filter| filter.apply(&acc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn posts() -> Value {
        json!([
            {"id": 1, "status": "published", "tags": ["news"]},
            {"id": 2, "status": "draft", "tags": []},
            {"id": 3, "status": "published", "tags": ["news", "tech"]}
        ])
    }

    fn parser() -> FilterParser {
        FilterParser::new().unwrap()
    }

    #[test]
    fn test_is_filter() {
        assert!(is_filter("&:filter($key == 1)"));
        assert!(!is_filter("filter($key == 1)"));
        assert!(!is_filter("&:filter($key == 1"));
    }

    #[test]
    fn test_filter_by_field() {
        let filter = parser().parse("&:filter($value.status == published)").unwrap();
        let out = filter.apply(&posts());
        let ids: Vec<i64> = out
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_filter_keeps_map_keys() {
        let menu = json!({"posts": {"order": 1}, "tools": {"order": 9}, "media": {"order": 2}});
        let filter = parser().parse("&:filter($key !in (tools, plugins))").unwrap();
        assert_eq!(
            filter.apply(&menu),
            json!({"posts": {"order": 1}, "media": {"order": 2}})
        );

        let filter = parser().parse("&:filter($value.order >= 2)").unwrap();
        let out = filter.apply(&menu);
        assert_eq!(out.as_object().unwrap().keys().collect::<Vec<_>>(), vec!["tools", "media"]);
    }

    #[test]
    fn test_string_operators() {
        let slugs = json!(["edit-post", "edit-page", "upload", "post-new"]);
        let parser = parser();
        let check = |modifier: &str| parser.parse_modifier(modifier).unwrap().apply(&slugs);

        assert_eq!(check("$value ^= edit"), json!(["edit-post", "edit-page"]));
        assert_eq!(check("$value $= post"), json!(["edit-post"]));
        assert_eq!(check("$value *= post"), json!(["edit-post", "post-new"]));
        assert_eq!(check("$value != upload"), json!(["edit-post", "edit-page", "post-new"]));
        assert_eq!(check("$value in [upload, 'post-new']"), json!(["upload", "post-new"]));
        assert_eq!(check("$key < 1"), json!(["edit-post"]));
    }

    #[test]
    fn test_contains_on_list_field() {
        let filter = parser().parse_modifier("$value.tags *= tech").unwrap();
        assert_eq!(filter.apply(&posts()).as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_non_iterable_input_unchanged() {
        let filter = parser().parse_modifier("$value == 1").unwrap();
        assert_eq!(filter.apply(&json!("text")), json!("text"));
        assert_eq!(filter.apply(&NULL), Value::Null);
    }

    #[test]
    fn test_invalid_filters() {
        assert!(parser().parse("&:filter(status == published)").is_err());
        assert!(parser().parse("&:filter($value ~= x)").is_err());
        assert!(parser().parse("&:filter($key.x == 1)").is_err());
        assert!(parser().parse("$value == 1").is_err());
    }

    #[test]
    fn test_response_resolution() {
        let literal = parser().response(&json!({"hidden": true})).unwrap();
        assert!(literal.is_map());
        assert_eq!(literal.resolve(&json!(1)), json!({"hidden": true}));

        let chained = parser().response(&json!([
            "&:filter($value.status == published)",
            "&:filter($value.id > 1)"
        ]))
        .unwrap();
        assert_eq!(chained.resolve(&posts()), json!([posts()[2].clone()]));

        let mixed = parser().response(&json!(["&:filter($value == 1)", "plain"])).unwrap();
        assert_eq!(
            mixed,
            Response::Literal(json!(["&:filter($value == 1)", "plain"]))
        );
    }
}
