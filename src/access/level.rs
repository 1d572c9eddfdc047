//! Access levels - nodes of the permission hierarchy
//!
//! An actor's chain is built per request from the host's identity context:
//!
//! ```text
//! authenticated:  user ──► primary role ──► default
//!                           (+ sibling roles, each ──► default)
//! anonymous:      visitor ──► default
//! ```
//!
//! Nodes are never persisted; they only address the permission store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Kind of access level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevelKind {
    /// Root of every chain
    Default,
    /// Anonymous actor
    Visitor,
    /// A role (an actor may hold several)
    Role,
    /// A specific authenticated user
    User,
}

impl std::fmt::Display for AccessLevelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessLevelKind::Default => write!(f, "default"),
            AccessLevelKind::Visitor => write!(f, "visitor"),
            AccessLevelKind::Role => write!(f, "role"),
            AccessLevelKind::User => write!(f, "user"),
        }
    }
}

/// A node in the access-level tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLevel {
    kind: AccessLevelKind,
    id: Option<String>,
    parent: Option<Arc<AccessLevel>>,
    siblings: Vec<Arc<AccessLevel>>,
}

impl AccessLevel {
    fn new(kind: AccessLevelKind, id: Option<String>) -> Self {
        Self {
            kind,
            id,
            parent: None,
            siblings: Vec::new(),
        }
    }

    /// The root level every other level inherits from
    pub fn default_level() -> Self {
        Self::new(AccessLevelKind::Default, None)
    }

    /// Anonymous visitor (no parent until one is attached)
    pub fn visitor() -> Self {
        Self::new(AccessLevelKind::Visitor, None)
    }

    pub fn role(id: impl Into<String>) -> Self {
        Self::new(AccessLevelKind::Role, Some(id.into()))
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(AccessLevelKind::User, Some(id.into()))
    }

    /// Attach the parent this level inherits from
    pub fn with_parent(mut self, parent: AccessLevel) -> Self {
        self.parent = Some(Arc::new(parent));
        self
    }

    /// Attach a co-equal sibling (an additional role)
    ///
    /// Siblings belong to the parent side of a chain: when a child is
    /// resolved, its parent's siblings are folded into the parent's result.
    pub fn with_sibling(mut self, sibling: AccessLevel) -> Self {
        self.siblings.push(Arc::new(sibling));
        self
    }

    pub fn kind(&self) -> AccessLevelKind {
        self.kind
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn parent(&self) -> Option<&AccessLevel> {
        self.parent.as_deref()
    }

    pub fn siblings(&self) -> &[Arc<AccessLevel>] {
        &self.siblings
    }

    /// Key used to address this level in the permission store
    ///
    /// `default`, `visitor`, `role:<id>` or `user:<id>`.
    pub fn storage_key(&self) -> String {
        match &self.id {
            Some(id) => format!("{}:{}", self.kind, id),
            None => self.kind.to_string(),
        }
    }

    /// Key covering this level and everything it inherits from
    ///
    /// Two levels with the same storage key but different parents or
    /// siblings (e.g. the same user with another role set) get different
    /// lineage keys.
    pub fn lineage_key(&self) -> String {
        let mut key = self.storage_key();
        for sibling in &self.siblings {
            key.push_str(&format!("+({})", sibling.lineage_key()));
        }
        if let Some(parent) = &self.parent {
            key.push('>');
            key.push_str(&parent.lineage_key());
        }
        key
    }

    /// Build the full chain for the current actor
    pub fn from_identity(identity: &IdentityContext) -> Self {
        let Some(user_id) = &identity.user_id else {
            return Self::visitor().with_parent(Self::default_level());
        };

        let mut roles = identity.roles.iter();
        let parent = match roles.next() {
            Some(primary) => roles.fold(
                Self::role(primary.clone()).with_parent(Self::default_level()),
                |level, extra| {
                    level.with_sibling(Self::role(extra.clone()).with_parent(Self::default_level()))
                },
            ),
            None => Self::default_level(),
        };

        tracing::debug!(
            "[AccessLevel] Built chain for user {} with {} role(s)",
            user_id,
            identity.roles.len()
        );

        Self::user(user_id.clone()).with_parent(parent)
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// What the host knows about the current actor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityContext {
    /// Authenticated user id (`None` for anonymous visitors)
    pub user_id: Option<String>,
    /// Roles in priority order; the first is the primary role
    #[serde(default)]
    pub roles: Vec<String>,
}

impl IdentityContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(id: impl Into<String>, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            user_id: Some(id.into()),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}
