//! Policy statements
//!
//! A statement targets one extension point, optionally at a priority, and
//! says what to do with it:
//!
//! ```json
//! [
//!   {"Target": "admin_menu_items:10", "Effect": "apply",
//!    "Response": "&:filter($value.slug !in (tools, plugins))"},
//!   {"Target": "show_toolbar", "Effect": "replace", "Response": false},
//!   {"Target": "comment_form:true", "Effect": "deny"}
//! ]
//! ```
//!
//! Statements are validated when loaded: unknown effects, malformed targets,
//! malformed filters and non-map `merge` responses make a statement
//! unusable. An unusable statement is reported and skipped; the rest of the
//! document still loads.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::filter::{FilterParser, Response};
use crate::core::{DiagnosticsSink, PolicyError, PolicyResult, Severity, TracingDiagnostics};
use crate::hooks::DEFAULT_PRIORITY;

/// What a statement does to its extension point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Remove existing callbacks so the chain returns its input
    Deny,
    /// Replace the chain's value with the resolved response
    Apply,
    /// Same as `Apply`
    Override,
    /// Shallow-merge the response map into the chain's value
    Merge,
    /// Remove existing callbacks and always return the response
    Replace,
}

impl FromStr for Effect {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deny" => Ok(Effect::Deny),
            "apply" => Ok(Effect::Apply),
            "override" => Ok(Effect::Override),
            "merge" => Ok(Effect::Merge),
            "replace" => Ok(Effect::Replace),
            other => Err(PolicyError::UnknownEffect(other.to_string())),
        }
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Effect::Deny => "deny",
            Effect::Apply => "apply",
            Effect::Override => "override",
            Effect::Merge => "merge",
            Effect::Replace => "replace",
        };
        write!(f, "{}", name)
    }
}

/// Priority part of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// A concrete priority
    Level(i32),
    /// Boolean form (`:true` / `:false`): every priority when removing,
    /// the last priority when binding
    Any,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Level(DEFAULT_PRIORITY)
    }
}

fn parse_priority(raw: &str) -> Option<Priority> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("false") {
        return Some(Priority::Any);
    }
    raw.parse::<i32>().ok().map(Priority::Level)
}

/// `<extension_point>[:<priority>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub point: String,
    pub priority: Priority,
}

impl FromStr for Target {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // a suffix that is not a priority belongs to the point name (`ns:hook`)
        let (point, priority) = match s.rsplit_once(':') {
            Some((point, raw)) => match parse_priority(raw) {
                Some(priority) => (point.trim(), priority),
                None => (s, Priority::default()),
            },
            None => (s, Priority::default()),
        };

        if point.is_empty() {
            return Err(PolicyError::statement(format!("empty extension point in '{}'", s)));
        }

        Ok(Target {
            point: point.to_string(),
            priority,
        })
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.priority {
            Priority::Level(p) => write!(f, "{}:{}", self.point, p),
            Priority::Any => write!(f, "{}:true", self.point),
        }
    }
}

/// A validated policy statement
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub target: Target,
    pub effect: Effect,
    pub response: Response,
}

/// Statement loader
///
/// Holds the compiled filter grammar so a whole document is parsed with a
/// single compilation.
#[derive(Debug, Clone)]
pub struct StatementParser {
    filters: FilterParser,
}

impl StatementParser {
    pub fn new() -> PolicyResult<Self> {
        Ok(Self {
            filters: FilterParser::new()?,
        })
    }

    /// Build and validate a single statement
    pub fn statement(
        &self,
        target: &str,
        effect: Effect,
        response: Value,
    ) -> PolicyResult<PolicyStatement> {
        let response = self.filters.response(&response)?;
        if effect == Effect::Merge && !response.is_map() {
            return Err(PolicyError::statement(format!(
                "merge response for '{}' must be a map",
                target
            )));
        }

        Ok(PolicyStatement {
            target: target.parse()?,
            effect,
            response,
        })
    }

    /// Parse one statement object
    ///
    /// Keys are matched case-insensitively. `Target` may be a list, which
    /// yields one statement per entry.
    pub fn from_value(&self, value: &Value) -> PolicyResult<Vec<PolicyStatement>> {
        let Value::Object(map) = value else {
            return Err(PolicyError::statement(format!("expected an object, got {}", value)));
        };

        let effect: Effect = field(map, "effect")
            .and_then(Value::as_str)
            .ok_or_else(|| PolicyError::statement("missing 'Effect'"))?
            .parse()?;
        let response = field(map, "response").cloned().unwrap_or(Value::Null);

        let targets: Vec<&str> = match field(map, "target") {
            Some(Value::String(target)) => vec![target.as_str()],
            Some(Value::Array(targets)) => targets
                .iter()
                .map(|t| {
                    t.as_str()
                        .ok_or_else(|| PolicyError::statement(format!("invalid target {}", t)))
                })
                .collect::<PolicyResult<_>>()?,
            _ => return Err(PolicyError::statement("missing 'Target'")),
        };

        targets
            .into_iter()
            .map(|target| self.statement(target, effect, response.clone()))
            .collect()
    }

    /// Parse a policy document
    ///
    /// Only a document that is not a statement list is an error. Each
    /// unusable statement is reported to `sink` and left out; the others
    /// are returned.
    pub fn parse(
        &self,
        document: &Value,
        sink: &dyn DiagnosticsSink,
    ) -> PolicyResult<Vec<PolicyStatement>> {
        let statements = match document {
            Value::Array(items) => items,
            Value::Object(map) => match field(map, "statement") {
                Some(Value::Array(items)) => items,
                _ => return Err(PolicyError::statement("document has no 'Statement' list")),
            },
            other => {
                return Err(PolicyError::statement(format!(
                    "expected a list of statements, got {}",
                    other
                )))
            }
        };

        let mut parsed = Vec::new();
        for (index, statement) in statements.iter().enumerate() {
            match self.from_value(statement) {
                Ok(found) => parsed.extend(found),
                Err(e) => sink.report(
                    &format!("Skipping policy statement #{}: {}", index + 1, e),
                    Severity::Error,
                ),
            }
        }
        tracing::debug!(
            "[PolicyStatement] Parsed {} of {} statement(s)",
            parsed.len(),
            statements.len()
        );
        Ok(parsed)
    }
}

fn field<'m>(map: &'m Map<String, Value>, name: &str) -> Option<&'m Value> {
    map.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// Parse a policy document, reporting skipped statements to `tracing`
pub fn parse_statements(document: &Value) -> PolicyResult<Vec<PolicyStatement>> {
    parse_statements_with(document, &TracingDiagnostics)
}

/// Parse a policy document, reporting skipped statements to `sink`
pub fn parse_statements_with(
    document: &Value,
    sink: &dyn DiagnosticsSink,
) -> PolicyResult<Vec<PolicyStatement>> {
    StatementParser::new()?.parse(document, sink)
}
