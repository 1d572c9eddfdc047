//! Access levels and permission inheritance
//!
//! Permissions are stored per access level and resource type, and inherited
//! down the chain `default → role(s) → user` (or `default → visitor`):
//!
//! - **Explicit** keys set on a level always win over inherited ones
//! - **Siblings** (extra roles) are folded into the parent's result first,
//!   using the resource type's `MergePreference`
//! - **Missing** keys on either side of a merge count as `false`
//!
//! ## Example
//!
//! ```rust,ignore
//! use access_policy_sdk::access::{
//!     AccessLevel, IdentityContext, InheritanceResolver, MemoryPermissionStore, MergePreferences,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryPermissionStore::new());
//! let resolver = InheritanceResolver::new(store, MergePreferences::new());
//!
//! let level = AccessLevel::from_identity(&IdentityContext::user("5", ["editor", "author"]));
//! if resolver.is_allowed(&level, "post", "12", "edit") {
//!     // ...
//! }
//! ```

mod level;
mod merge;
mod permission;
mod resolver;
mod store;

pub use level::{AccessLevel, AccessLevelKind, IdentityContext};
pub use merge::{merge, merge_value, overlay};
pub use permission::{
    permission_map_from_value, permission_map_to_value, MergePreference, MergePreferences,
    PermissionMap, PermissionValue, ResourcePermissions, ENABLED_FIELD,
};
pub use resolver::{InheritanceResolver, ResolvedEntry, ResolvedPermissions};
pub use store::{MemoryPermissionStore, PermissionStore};
