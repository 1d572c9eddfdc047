//! Conditional configuration
//!
//! Line-oriented, section-based text whose section headers are expressions
//! (see `crate::expression`). Parsed once at load time into a `ConfigTree`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use access_policy_sdk::config::ConfigTree;
//! use access_policy_sdk::core::TracingDiagnostics;
//! use access_policy_sdk::expression::EvalContext;
//!
//! let ctx = EvalContext::new().with_var("user", serde_json::json!({"level": 4}));
//! let tree = ConfigTree::parse(
//!     "[$user.level >= 3 as editor]\ntoolbar.hidden[] = comments\n",
//!     &ctx,
//!     &TracingDiagnostics,
//! )?;
//! assert!(tree.get("editor.toolbar.hidden").is_some());
//! ```

mod parser;
mod tree;

pub use parser::{deep_merge, ConfigParser};
pub use tree::ConfigTree;
