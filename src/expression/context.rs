//! Evaluation context - live state visible to expressions
//!
//! Operands prefixed with `$` are dotted paths into the state
//! (`$user.roles.0`), operands prefixed with `@` call a registered
//! zero-argument callback (`@is_admin`). Anything missing evaluates to
//! `null`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

/// Sigil for state lookups
pub const VARIABLE_SIGIL: char = '$';

/// Sigil for callback invocations
pub const CALLBACK_SIGIL: char = '@';

/// Zero-argument callable exposed to expressions
pub type ContextCallback = Arc<dyn Fn() -> Value + Send + Sync>;

/// State and callables an expression can see
#[derive(Clone)]
pub struct EvalContext {
    state: Value,
    callbacks: HashMap<String, ContextCallback>,
}

impl EvalContext {
    /// Empty context
    pub fn new() -> Self {
        Self {
            state: Value::Object(Map::new()),
            callbacks: HashMap::new(),
        }
    }

    /// Context over an existing state tree
    pub fn with_state(state: Value) -> Self {
        Self {
            state,
            callbacks: HashMap::new(),
        }
    }

    /// Set a top-level variable
    pub fn with_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set_var(name, value);
        self
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        if !self.state.is_object() {
            self.state = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut self.state {
            map.insert(name.into(), value);
        }
    }

    /// Register a callable
    pub fn with_callback<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.callbacks.insert(name.into(), Arc::new(callback));
        self
    }

    /// Resolve a dotted path
    ///
    /// Objects are indexed by key, arrays by position. A missing step
    /// short-circuits to `null`.
    pub fn lookup(&self, path: &str) -> Value {
        let mut current = &self.state;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Value::Null,
            }
        }
        current.clone()
    }

    /// Invoke a callable if it exists
    pub fn call(&self, name: &str) -> Option<Value> {
        self.callbacks.get(name).map(|callback| callback())
    }

    pub fn state(&self) -> &Value {
        &self.state
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalContext")
            .field("state", &self.state)
            .field("callbacks", &self.callbacks.keys().collect::<Vec<_>>())
            .finish()
    }
}
