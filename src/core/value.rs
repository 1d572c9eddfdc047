//! Loose value semantics shared by the evaluator, the filter grammar and
//! the permission merge.
//!
//! Rules arrive as text (configuration files, policy documents), so values
//! are compared the way a human would read them: `"5"` equals `5`, `"0"` is
//! falsy, a missing value behaves like `false`.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Whether a value counts as "on"
///
/// `null`, `false`, `0`, `""`, `"0"`, `"false"` and empty arrays are falsy.
/// Everything else (including every object) is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Numeric view of a value, if it has one
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Build a JSON number, keeping integral results as integers
pub fn number(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Text view of a scalar value
///
/// Strings are returned verbatim, `null` becomes the empty string and
/// compound values are serialized as JSON.
pub fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Loose equality (`==`)
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, other) | (other, Value::Null) => !is_truthy(other),
        (Value::Bool(x), other) | (other, Value::Bool(x)) => *x == is_truthy(other),
        (Value::Array(_), _) | (_, Value::Array(_)) | (Value::Object(_), _) | (_, Value::Object(_)) => {
            a == b
        }
        _ => match (to_number(a), to_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => as_text(a) == as_text(b),
        },
    }
}

/// Strict equality (`===`): same type and same value
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering used by `<`, `>`, `<=`, `>=`
///
/// Numeric when both sides are numeric, lexical otherwise.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (to_number(a), to_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => Some(as_text(a).cmp(&as_text(b))),
    }
}

/// Parse a bare literal as written in configuration or expressions
///
/// `true`, `false` and `null` become their JSON counterparts, numbers become
/// numbers, single- or double-quoted text is unquoted verbatim and anything
/// else is kept as a trimmed string.
pub fn parse_literal(raw: &str) -> Value {
    let text = raw.trim();

    if let Some(inner) = unquote(text) {
        return Value::String(inner.to_string());
    }

    match text.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    if let Ok(i) = text.parse::<i64>() {
        return Value::Number(Number::from(i));
    }
    if let Ok(f) = text.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }

    Value::String(text.to_string())
}

/// Strip one pair of matching quotes, if present
pub fn unquote(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' || first == b'\'') && first == last {
            return Some(&text[1..text.len() - 1]);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("0")));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!("no")));
        assert!(is_truthy(&json!(2.5)));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn test_loose_vs_strict_equality() {
        assert!(loose_eq(&json!("5"), &json!(5)));
        assert!(!strict_eq(&json!("5"), &json!(5)));
        assert!(loose_eq(&json!(true), &json!("yes")));
        assert!(loose_eq(&Value::Null, &json!(0)));
        assert!(strict_eq(&json!(1), &json!(1.0)));
    }

    #[test]
    fn test_compare_numeric_and_lexical() {
        assert_eq!(compare(&json!("10"), &json!(9)), Some(Ordering::Greater));
        assert_eq!(compare(&json!("abc"), &json!("abd")), Some(Ordering::Less));
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(parse_literal(" true "), json!(true));
        assert_eq!(parse_literal("42"), json!(42));
        assert_eq!(parse_literal("1.5"), json!(1.5));
        assert_eq!(parse_literal("'quoted text '"), json!("quoted text "));
        assert_eq!(parse_literal("plain"), json!("plain"));
        assert_eq!(parse_literal("NULL"), Value::Null);
    }

    #[test]
    fn test_number_keeps_integers() {
        assert_eq!(number(14.0), json!(14));
        assert_eq!(number(2.5), json!(2.5));
        assert_eq!(number(f64::NAN), Value::Null);
    }
}
