pub mod core;

// Permission inheritance across access levels
pub mod access;

// Conditional rules: expressions and the configuration format built on them
pub mod expression;
pub mod config;

// Extension points and the policy engine that rewires them
pub mod hooks;
pub mod policy;

// Optional components
pub mod logging;

pub use crate::core::{PolicyError, PolicyResult};
