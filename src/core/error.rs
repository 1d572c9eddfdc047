//! Policy engine error types

use thiserror::Error;

/// Errors that can occur while loading or evaluating access rules
#[derive(Error, Debug)]
pub enum PolicyError {
    /// Expression could not be tokenized or evaluated
    #[error("Expression error: {0}")]
    Expression(String),

    /// Configuration text is malformed
    #[error("Configuration error at line {line}: {message}")]
    Config { line: usize, message: String },

    /// Policy statement is missing fields or has the wrong shape
    #[error("Invalid policy statement: {0}")]
    InvalidStatement(String),

    /// Policy statement names an effect the engine does not know
    #[error("Unknown policy effect: {0}")]
    UnknownEffect(String),

    /// Filter modifier does not match the filter grammar
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Regular expression failed to compile
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PolicyError {
    /// Create an expression error
    pub fn expression(msg: impl Into<String>) -> Self {
        PolicyError::Expression(msg.into())
    }

    /// Create a configuration error for a given line
    pub fn config(line: usize, msg: impl Into<String>) -> Self {
        PolicyError::Config {
            line,
            message: msg.into(),
        }
    }

    /// Create an invalid statement error
    pub fn statement(msg: impl Into<String>) -> Self {
        PolicyError::InvalidStatement(msg.into())
    }
}

/// Result type alias for policy operations
pub type PolicyResult<T> = Result<T, PolicyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PolicyError::UnknownEffect("allow-ish".into());
        assert_eq!(err.to_string(), "Unknown policy effect: allow-ish");

        let err = PolicyError::config(7, "missing '='");
        assert_eq!(err.to_string(), "Configuration error at line 7: missing '='");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let policy_err: PolicyError = io_err.into();
        assert!(matches!(policy_err, PolicyError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let policy_err: PolicyError = json_err.into();
        assert!(matches!(policy_err, PolicyError::Serialization(_)));
    }
}
