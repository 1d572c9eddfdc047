//! Policy Engine
//!
//! Keeps one interception registration per extension point and rewires the
//! point's chain every time it fires. Nothing is bound up front: a single
//! fire listener looks the point up and applies the statement's effect just
//! before the chain runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use super::filter::Response;
use super::statement::{Effect, PolicyStatement, Priority};
use crate::hooks::{
    ExtensionRegistry, FireListener, Hook, HookContext, HookId, ListenerId, LAST_PRIORITY,
};

/// What is registered for one extension point
#[derive(Debug, Clone)]
pub struct InterceptionRegistration {
    pub priority: Priority,
    pub effect: Effect,
    pub response: Arc<Response>,
    /// Wrapper currently bound in the registry, with the priority it was
    /// bound at
    pub bound: Option<(HookId, i32)>,
}

impl InterceptionRegistration {
    fn from_statement(statement: &PolicyStatement) -> Self {
        Self {
            priority: statement.target.priority,
            effect: statement.effect,
            response: Arc::new(statement.response.clone()),
            bound: None,
        }
    }

    fn unbind(&mut self, point: &str, registry: &mut dyn ExtensionRegistry) {
        if let Some((id, priority)) = self.bound.take() {
            registry.unregister(point, id, priority);
        }
    }

    fn bind(&mut self, point: &str, registry: &mut dyn ExtensionRegistry) {
        self.unbind(point, registry);
        let priority = match self.priority {
            Priority::Level(priority) => priority,
            Priority::Any => LAST_PRIORITY,
        };
        let wrapper = InterceptWrapper {
            effect: self.effect,
            response: self.response.clone(),
        };
        let id = registry.register(point, Arc::new(wrapper), priority);
        self.bound = Some((id, priority));
    }

    fn remove_existing(&mut self, point: &str, registry: &mut dyn ExtensionRegistry) -> usize {
        let priority = match self.priority {
            Priority::Level(priority) => Some(priority),
            Priority::Any => None,
        };
        let removed = registry.unregister_all(point, priority);
        // our own wrapper may have been among them
        if let Some((_, bound_at)) = self.bound {
            if priority.map_or(true, |p| p == bound_at) {
                self.bound = None;
            }
        }
        removed
    }

    /// Apply the effect to `point` right before its chain runs
    fn dispatch(&mut self, point: &str, registry: &mut dyn ExtensionRegistry) {
        match self.effect {
            Effect::Deny => {
                let removed = self.remove_existing(point, registry);
                tracing::debug!("[PolicyEngine] Denied '{}' ({} callback(s))", point, removed);
            }
            Effect::Apply | Effect::Override | Effect::Merge => {
                self.bind(point, registry);
            }
            Effect::Replace => {
                self.remove_existing(point, registry);
                self.bind(point, registry);
            }
        }
    }
}

/// Callback bound into a chain on behalf of a statement
struct InterceptWrapper {
    effect: Effect,
    response: Arc<Response>,
}

impl Hook for InterceptWrapper {
    fn call(&self, value: Value, ctx: &HookContext) -> Value {
        match self.effect {
            Effect::Merge => merge_response(value, &self.response, &ctx.point),
            Effect::Deny => value,
            Effect::Apply | Effect::Override | Effect::Replace => self.response.resolve(&value),
        }
    }
}

fn merge_response(value: Value, response: &Response, point: &str) -> Value {
    let Response::Literal(Value::Object(patch)) = response else {
        return value;
    };

    match value {
        Value::Object(mut current) => {
            for (key, entry) in patch {
                current.insert(key.clone(), entry.clone());
            }
            Value::Object(current)
        }
        Value::Null => Value::Object(patch.clone()),
        other => {
            tracing::debug!(
                "[PolicyEngine] Cannot merge into non-map value of '{}', leaving it unchanged",
                point
            );
            other
        }
    }
}

#[derive(Debug, Default)]
struct EngineState {
    registrations: HashMap<String, InterceptionRegistration>,
}

fn lock(state: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fire listener that routes every fired point to its registration
struct PolicyDispatcher {
    state: Arc<Mutex<EngineState>>,
}

impl FireListener for PolicyDispatcher {
    fn on_fire(&self, point: &str, registry: &mut dyn ExtensionRegistry) {
        let mut state = lock(&self.state);
        if let Some(registration) = state.registrations.get_mut(point) {
            registration.dispatch(point, registry);
        }
    }
}

/// Interception engine
///
/// # Example
///
/// ```ignore
/// let statements = parse_statements(&json!([
///     {"Target": "show_toolbar", "Effect": "replace", "Response": false}
/// ]))?;
///
/// let mut engine = PolicyEngine::new();
/// engine.register_policy(&mut hooks, &statements);
///
/// assert_eq!(hooks.apply("show_toolbar", json!(true), &[]), json!(false));
/// ```
#[derive(Debug, Default)]
pub struct PolicyEngine {
    state: Arc<Mutex<EngineState>>,
    listener: Option<ListenerId>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register statements; a later statement for the same point wins
    ///
    /// Registering the same set again does not stack wrappers: any wrapper
    /// already bound for a point is removed before its registration is
    /// replaced.
    pub fn register_policy(
        &mut self,
        registry: &mut dyn ExtensionRegistry,
        statements: &[PolicyStatement],
    ) {
        if self.listener.is_none() {
            let dispatcher = PolicyDispatcher {
                state: self.state.clone(),
            };
            self.listener = Some(registry.on_any_fire(Arc::new(dispatcher)));
            tracing::debug!("[PolicyEngine] Attached dispatcher");
        }

        let mut state = lock(&self.state);
        for statement in statements {
            let point = statement.target.point.as_str();
            if let Some(mut previous) = state.registrations.remove(point) {
                previous.unbind(point, registry);
            }
            state.registrations.insert(
                point.to_string(),
                InterceptionRegistration::from_statement(statement),
            );
        }

        tracing::info!(
            "[PolicyEngine] {} statement(s) registered, {} extension point(s) intercepted",
            statements.len(),
            state.registrations.len()
        );
    }

    /// Drop every registration and detach from the registry
    pub fn reset_policies(&mut self, registry: &mut dyn ExtensionRegistry) {
        let mut state = lock(&self.state);
        for (point, registration) in state.registrations.iter_mut() {
            registration.unbind(point, registry);
        }
        state.registrations.clear();
        drop(state);

        if let Some(id) = self.listener.take() {
            registry.remove_fire_listener(id);
        }
        tracing::debug!("[PolicyEngine] Policies reset");
    }

    /// Registration for an extension point, if any
    pub fn registration(&self, point: &str) -> Option<InterceptionRegistration> {
        lock(&self.state).registrations.get(point).cloned()
    }

    /// Number of intercepted extension points
    pub fn len(&self) -> usize {
        lock(&self.state).registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_attached(&self) -> bool {
        self.listener.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{HookRegistry, DEFAULT_PRIORITY};
    use crate::policy::parse_statements;
    use serde_json::json;

    fn engine_with(registry: &mut HookRegistry, document: Value) -> PolicyEngine {
        let statements = parse_statements(&document).unwrap();
        let mut engine = PolicyEngine::new();
        engine.register_policy(registry, &statements);
        engine
    }

    fn shout(value: Value, _ctx: &HookContext) -> Value {
        json!(value.as_str().unwrap_or_default().to_uppercase())
    }

    #[test]
    fn test_untargeted_point_passes_through() {
        let mut registry = HookRegistry::new();
        registry.add("title", shout);
        let _engine = engine_with(&mut registry, json!([{"Target": "other", "Effect": "deny"}]));

        assert_eq!(registry.apply("title", json!("hi"), &[]), json!("HI"));
        assert_eq!(registry.apply("nothing", json!(3), &[]), json!(3));
    }

    #[test]
    fn test_register_twice_keeps_one_wrapper() {
        let mut registry = HookRegistry::new();
        let statements = parse_statements(&json!([
            {"Target": "title", "Effect": "apply", "Response": "policy"}
        ]))
        .unwrap();

        let mut engine = PolicyEngine::new();
        engine.register_policy(&mut registry, &statements);
        registry.apply("title", json!("t"), &[]);
        engine.register_policy(&mut registry, &statements);
        registry.apply("title", json!("t"), &[]);
        registry.apply("title", json!("t"), &[]);

        assert_eq!(registry.hook_count("title"), 1);
        assert_eq!(registry.listener_count(), 1);
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_last_statement_wins() {
        let mut registry = HookRegistry::new();
        let engine = engine_with(
            &mut registry,
            json!([
                {"Target": "title", "Effect": "apply", "Response": "first"},
                {"Target": "title:5", "Effect": "apply", "Response": "second"}
            ]),
        );

        assert_eq!(registry.apply("title", json!("t"), &[]), json!("second"));
        let registration = engine.registration("title").unwrap();
        assert_eq!(registration.priority, Priority::Level(5));
        assert_eq!(registration.bound.map(|(_, p)| p), Some(5));
    }

    #[test]
    fn test_override_replaces_value_like_apply() {
        let mut registry = HookRegistry::new();
        registry.add("title", shout);
        registry.add("excerpt", shout);
        let engine = engine_with(
            &mut registry,
            json!([
                {"Target": "title:20", "Effect": "override", "Response": "policy"},
                {"Target": "excerpt:20", "Effect": "apply", "Response": "policy"}
            ]),
        );

        assert_eq!(registry.apply("title", json!("hi"), &[]), json!("policy"));
        assert_eq!(
            registry.apply("title", json!("hi"), &[]),
            registry.apply("excerpt", json!("hi"), &[])
        );
        // host callback stays, wrapper is added next to it
        assert_eq!(registry.hook_count("title"), 2);
        assert_eq!(engine.registration("title").unwrap().effect, Effect::Override);
    }

    #[test]
    fn test_deny_at_priority() {
        let mut registry = HookRegistry::new();
        registry.add("title", shout);
        registry.add_with_priority(
            "title",
            |v: Value, _: &HookContext| json!(format!("{}!", v.as_str().unwrap_or_default())),
            20,
        );
        let _engine = engine_with(&mut registry, json!([{"Target": "title", "Effect": "deny"}]));

        assert_eq!(registry.apply("title", json!("hi"), &[]), json!("hi!"));
        assert_eq!(registry.hook_count_at("title", DEFAULT_PRIORITY), 0);
    }

    #[test]
    fn test_deny_every_priority() {
        let mut registry = HookRegistry::new();
        registry.add("title", shout);
        registry.add_with_priority("title", shout, 99);
        let _engine = engine_with(&mut registry, json!([{"Target": "title:true", "Effect": "deny"}]));

        assert_eq!(registry.apply("title", json!("hi"), &[]), json!("hi"));
        assert!(!registry.has_hooks("title"));
    }

    #[test]
    fn test_apply_filter_response() {
        let mut registry = HookRegistry::new();
        let _engine = engine_with(
            &mut registry,
            json!([{"Target": "posts", "Effect": "apply", "Response": "&:filter($value.status == published)"}]),
        );

        let posts = json!([
            {"id": 1, "status": "published"},
            {"id": 2, "status": "draft"},
            {"id": 3, "status": "published"}
        ]);
        let out = registry.apply("posts", posts, &[]);
        assert_eq!(out, json!([{"id": 1, "status": "published"}, {"id": 3, "status": "published"}]));

        // non-iterable value degrades to the input
        assert_eq!(registry.apply("posts", json!("none"), &[]), json!("none"));
    }

    #[test]
    fn test_merge_runs_after_host_callbacks() {
        let mut registry = HookRegistry::new();
        registry.add("options", |mut v: Value, _: &HookContext| {
            v["host"] = json!(true);
            v
        });
        let _engine = engine_with(
            &mut registry,
            json!([{"Target": "options:true", "Effect": "merge", "Response": {"comments": false, "host": "policy"}}]),
        );

        let out = registry.apply("options", json!({"comments": true, "title": "x"}), &[]);
        assert_eq!(out, json!({"comments": false, "title": "x", "host": "policy"}));
    }

    #[test]
    fn test_merge_into_non_map_is_unchanged() {
        let mut registry = HookRegistry::new();
        let _engine = engine_with(
            &mut registry,
            json!([{"Target": "options", "Effect": "merge", "Response": {"a": 1}}]),
        );

        assert_eq!(registry.apply("options", json!(5), &[]), json!(5));
        assert_eq!(registry.apply("options", Value::Null, &[]), json!({"a": 1}));
    }

    #[test]
    fn test_replace_removes_host_callbacks() {
        let mut registry = HookRegistry::new();
        registry.add("show_toolbar", |_: Value, _: &HookContext| json!(true));
        let _engine = engine_with(
            &mut registry,
            json!([{"Target": "show_toolbar", "Effect": "replace", "Response": false}]),
        );

        assert_eq!(registry.apply("show_toolbar", json!(true), &[]), json!(false));
        assert_eq!(registry.apply("show_toolbar", json!(true), &[]), json!(false));
        assert_eq!(registry.hook_count("show_toolbar"), 1);
    }

    #[test]
    fn test_reset_restores_registry() {
        let mut registry = HookRegistry::new();
        registry.add("title", shout);
        let mut engine = engine_with(
            &mut registry,
            json!([
                {"Target": "title:20", "Effect": "apply", "Response": "policy"},
                {"Target": "footer", "Effect": "replace", "Response": ""}
            ]),
        );

        assert_eq!(registry.apply("title", json!("hi"), &[]), json!("policy"));
        engine.reset_policies(&mut registry);

        assert!(engine.is_empty());
        assert!(!engine.is_attached());
        assert_eq!(registry.listener_count(), 0);
        assert_eq!(registry.apply("title", json!("hi"), &[]), json!("HI"));
        assert_eq!(registry.hook_count("title"), 1);
    }
}
