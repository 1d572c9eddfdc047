//! Hook Registry
//!
//! Contains:
//! - `Hook` trait - a callback in an extension point's chain
//! - `FireListener` trait - notified before any extension point runs
//! - `ExtensionRegistry` trait - what the policy engine needs from a host
//! - `HookRegistry` - in-process implementation with chain semantics

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use super::types::{HookContext, HookId, ListenerId, DEFAULT_PRIORITY};

/// A callback in an extension point's chain
///
/// Receives the chain's current value and returns the next one.
pub trait Hook: Send + Sync {
    fn call(&self, value: Value, ctx: &HookContext) -> Value;
}

/// Implement Hook for closures
impl<F> Hook for F
where
    F: Fn(Value, &HookContext) -> Value + Send + Sync,
{
    fn call(&self, value: Value, ctx: &HookContext) -> Value {
        (self)(value, ctx)
    }
}

/// Type alias for stored hooks
pub type ArcHook = Arc<dyn Hook>;

/// Notified every time any extension point fires, before its chain runs
///
/// Listeners may rewire the registry (register or unregister callbacks);
/// the chain that runs afterwards sees those changes.
pub trait FireListener: Send + Sync {
    fn on_fire(&self, point: &str, registry: &mut dyn ExtensionRegistry);
}

impl<F> FireListener for F
where
    F: Fn(&str, &mut dyn ExtensionRegistry) + Send + Sync,
{
    fn on_fire(&self, point: &str, registry: &mut dyn ExtensionRegistry) {
        (self)(point, registry)
    }
}

/// Registry of named extension points, as seen by the policy engine
pub trait ExtensionRegistry {
    /// Attach a listener to the "any extension point fired" signal
    fn on_any_fire(&mut self, listener: Arc<dyn FireListener>) -> ListenerId;

    /// Detach a listener
    fn remove_fire_listener(&mut self, id: ListenerId) -> bool;

    /// Add a callback to a chain
    fn register(&mut self, point: &str, hook: ArcHook, priority: i32) -> HookId;

    /// Remove one callback
    fn unregister(&mut self, point: &str, id: HookId, priority: i32) -> bool;

    /// Remove every callback at `priority`, or at every priority for `None`
    ///
    /// Returns how many callbacks were removed.
    fn unregister_all(&mut self, point: &str, priority: Option<i32>) -> usize;
}

/// Central registry for extension points
///
/// Callbacks run in ascending priority, and in registration order within a
/// priority. An extension point without callbacks returns its input.
///
/// # Example
///
/// ```ignore
/// let mut hooks = HookRegistry::new();
///
/// hooks.add("the_title", |value: Value, _ctx: &HookContext| {
///     json!(format!("[draft] {}", value.as_str().unwrap_or_default()))
/// });
///
/// let title = hooks.apply("the_title", json!("Hello"), &[]);
/// ```
#[derive(Default)]
pub struct HookRegistry {
    points: HashMap<String, BTreeMap<i32, Vec<(HookId, ArcHook)>>>,
    listeners: Vec<(ListenerId, Arc<dyn FireListener>)>,
}

impl HookRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback at the default priority
    pub fn add<H: Hook + 'static>(&mut self, point: &str, hook: H) -> HookId {
        self.register(point, Arc::new(hook), DEFAULT_PRIORITY)
    }

    /// Add a callback at a given priority
    pub fn add_with_priority<H: Hook + 'static>(
        &mut self,
        point: &str,
        hook: H,
        priority: i32,
    ) -> HookId {
        self.register(point, Arc::new(hook), priority)
    }

    /// Check if there are any callbacks for an extension point
    pub fn has_hooks(&self, point: &str) -> bool {
        self.hook_count(point) > 0
    }

    /// Get the number of callbacks for an extension point
    pub fn hook_count(&self, point: &str) -> usize {
        self.points
            .get(point)
            .map(|chain| chain.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Get the number of callbacks at one priority
    pub fn hook_count_at(&self, point: &str, priority: i32) -> usize {
        self.points
            .get(point)
            .and_then(|chain| chain.get(&priority))
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Get the number of fire listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Fire an extension point
    ///
    /// Fire listeners run first, then the chain folds `value` through every
    /// callback.
    pub fn apply(&mut self, point: &str, value: Value, args: &[Value]) -> Value {
        let listeners: Vec<Arc<dyn FireListener>> =
            self.listeners.iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener.on_fire(point, &mut *self);
        }

        let chain: Vec<ArcHook> = match self.points.get(point) {
            Some(chain) => chain
                .values()
                .flat_map(|hooks| hooks.iter().map(|(_, hook)| hook.clone()))
                .collect(),
            None => return value,
        };

        let ctx = HookContext::new(point, args);
        chain
            .into_iter()
            .fold(value, |current, hook| hook.call(current, &ctx))
    }
}

impl ExtensionRegistry for HookRegistry {
    fn on_any_fire(&mut self, listener: Arc<dyn FireListener>) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.push((id, listener));
        id
    }

    fn remove_fire_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    fn register(&mut self, point: &str, hook: ArcHook, priority: i32) -> HookId {
        let id = HookId::new();
        tracing::debug!(
            "[HookRegistry] Registering {} on '{}' at priority {}",
            id,
            point,
            priority
        );
        self.points
            .entry(point.to_string())
            .or_default()
            .entry(priority)
            .or_default()
            .push((id, hook));
        id
    }

    fn unregister(&mut self, point: &str, id: HookId, priority: i32) -> bool {
        let Some(hooks) = self
            .points
            .get_mut(point)
            .and_then(|chain| chain.get_mut(&priority))
        else {
            return false;
        };

        let before = hooks.len();
        hooks.retain(|(existing, _)| *existing != id);
        let removed = hooks.len() != before;
        if removed {
            tracing::debug!("[HookRegistry] Unregistered {} from '{}'", id, point);
        }
        removed
    }

    fn unregister_all(&mut self, point: &str, priority: Option<i32>) -> usize {
        let Some(chain) = self.points.get_mut(point) else {
            return 0;
        };

        let removed = match priority {
            Some(priority) => chain.remove(&priority).map(|h| h.len()).unwrap_or(0),
            None => {
                let count: usize = chain.values().map(Vec::len).sum();
                chain.clear();
                count
            }
        };

        if removed > 0 {
            tracing::debug!(
                "[HookRegistry] Removed {} callback(s) from '{}' ({:?})",
                removed,
                point,
                priority
            );
        }
        removed
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (point, chain) in &self.points {
            map.entry(point, &chain.values().map(Vec::len).sum::<usize>());
        }
        map.finish()
    }
}
