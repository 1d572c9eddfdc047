//! Diagnostics sink for recoverable rule errors
//!
//! Malformed configuration sections and unusable policy statements are not
//! errors for the caller: they are reported here and the offending rule is
//! dropped. A sink must never panic and never halt processing.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Severity of a reported problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Notice,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Notice => write!(f, "notice"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Receives reports about rules that were skipped
pub trait DiagnosticsSink: Send + Sync {
    /// Record a problem. Must not fail.
    fn report(&self, message: &str, severity: Severity);
}

/// Default sink: forwards every report to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn report(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Notice => tracing::info!("[Diagnostics] {}", message),
            Severity::Warning => tracing::warn!("[Diagnostics] {}", message),
            Severity::Error => tracing::error!("[Diagnostics] {}", message),
        }
    }
}

/// A single recorded report
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    pub reported_at: DateTime<Utc>,
}

/// Sink that keeps every report in memory
///
/// Useful for admin screens that list configuration problems, and in tests.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of reports at or above `severity`
    pub fn count_at_least(&self, severity: Severity) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|d| d.severity >= severity)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}

impl DiagnosticsSink for CollectingDiagnostics {
    fn report(&self, message: &str, severity: Severity) {
        tracing::debug!("[Diagnostics] collected {}: {}", severity, message);
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Diagnostic {
                message: message.to_string(),
                severity,
                reported_at: Utc::now(),
            });
    }
}
