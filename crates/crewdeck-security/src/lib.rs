//! Access control for crewdeck.
//!
//! Every request carries a [`GroupContext`](crewdeck_core::GroupContext);
//! the role in that context decides which [`Permission`]s apply.
//!
//! # Main types
//!
//! - [`Permission`]: an action on group resources.
//! - [`PermissionSet`]: the permissions granted to one role.
//! - [`authorize`]: checks a group context against a permission.

/// Role grants and authorization checks.
pub mod rbac;

pub use rbac::{authorize, grants_for, Permission, PermissionSet};
