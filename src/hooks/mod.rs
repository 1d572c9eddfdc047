//! Hooks Module
//!
//! Named extension points with ordered callback chains.
//!
//! # Overview
//!
//! An extension point is fired with a value; every registered callback
//! receives the current value and returns the next one. The final value is
//! what the caller gets back.
//!
//! The policy engine only talks to the `ExtensionRegistry` trait, so a host
//! with its own hook system can plug it in. `HookRegistry` is the in-process
//! implementation.
//!
//! # Example
//!
//! ```ignore
//! use access_policy_sdk::hooks::{HookContext, HookRegistry};
//! use serde_json::{json, Value};
//!
//! let mut hooks = HookRegistry::new();
//!
//! hooks.add_with_priority("menu_items", |items: Value, _ctx: &HookContext| {
//!     // drop the last item
//!     let mut items = items;
//!     if let Some(list) = items.as_array_mut() {
//!         list.pop();
//!     }
//!     items
//! }, 20);
//!
//! let items = hooks.apply("menu_items", json!(["posts", "media"]), &[]);
//! ```
//!
//! # Ordering
//!
//! | Rule | Effect |
//! |------|--------|
//! | Lower priority first | `1` runs before `10` |
//! | Same priority | registration order |
//! | Fire listeners | run before the chain, may rewire it |

mod registry;
mod types;

pub use registry::{ArcHook, ExtensionRegistry, FireListener, Hook, HookRegistry};
pub use types::{HookContext, HookId, ListenerId, DEFAULT_PRIORITY, LAST_PRIORITY};
