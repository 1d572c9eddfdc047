//! Core types shared by every part of the engine
//!
//! - `PolicyError` / `PolicyResult` - Error types
//! - `DiagnosticsSink` - Where skipped rules are reported
//! - `value` - Loose comparison and truthiness over `serde_json::Value`

pub mod diagnostics;
pub mod error;
pub mod value;

pub use diagnostics::{
    CollectingDiagnostics, Diagnostic, DiagnosticsSink, Severity, TracingDiagnostics,
};
pub use error::{PolicyError, PolicyResult};
