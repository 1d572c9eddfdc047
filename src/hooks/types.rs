//! Hook Types
//!
//! Core types for extension points:
//! - `HookId` - Handle of a registered callback
//! - `ListenerId` - Handle of a fire listener
//! - `HookContext` - Read-only context passed to callbacks

use serde_json::Value;
use uuid::Uuid;

/// Priority used when none is given
pub const DEFAULT_PRIORITY: i32 = 10;

/// Highest possible priority (runs last)
pub const LAST_PRIORITY: i32 = i32::MAX;

/// Handle of a registered callback, needed to unregister it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(Uuid);

impl HookId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HookId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "hook_{}", self.0)
    }
}

/// Handle of a fire listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Context passed to every callback of a chain
#[derive(Debug, Clone)]
pub struct HookContext {
    /// Name of the extension point being fired
    pub point: String,
    /// Extra arguments supplied by the caller (never modified by the chain)
    pub args: Vec<Value>,
}

impl HookContext {
    pub fn new(point: impl Into<String>, args: &[Value]) -> Self {
        Self {
            point: point.into(),
            args: args.to_vec(),
        }
    }

    /// Positional argument
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}
