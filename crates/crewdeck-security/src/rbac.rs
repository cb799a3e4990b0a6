use crewdeck_core::{CrewError, CrewResult, GroupContext, GroupRole};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

/// An action a group member may take.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Run a crew and receive its output.
    ExecuteCrew,
    /// Create, edit or delete crew configurations and schedules.
    ManageCrews,
    /// Read execution records and logs.
    ViewExecutions,
    /// Add or remove group members.
    ManageMembers,
}

impl Permission {
    /// All permissions, in declaration order.
    pub const ALL: [Permission; 4] = [
        Permission::ExecuteCrew,
        Permission::ManageCrews,
        Permission::ViewExecutions,
        Permission::ManageMembers,
    ];
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::ExecuteCrew => "execute_crew",
            Permission::ManageCrews => "manage_crews",
            Permission::ViewExecutions => "view_executions",
            Permission::ManageMembers => "manage_members",
        };
        f.write_str(name)
    }
}

/// A set of granted permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    permissions: HashSet<Permission>,
}

impl PermissionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a permission.
    pub fn grant(&mut self, permission: Permission) {
        self.permissions.insert(permission);
    }

    /// Remove a permission.
    pub fn revoke(&mut self, permission: &Permission) {
        self.permissions.remove(permission);
    }

    /// Whether `permission` is granted.
    pub fn has(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }

    /// True when nothing is granted.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Number of granted permissions.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Granted permissions, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self {
            permissions: iter.into_iter().collect(),
        }
    }
}

/// Permissions granted to a role.
///
/// Admins hold everything. Managers run and maintain crews but cannot change
/// membership. Users run crews and read results. Viewers only read.
pub fn grants_for(role: GroupRole) -> PermissionSet {
    match role {
        GroupRole::Admin => Permission::ALL.into_iter().collect(),
        GroupRole::Manager => [
            Permission::ExecuteCrew,
            Permission::ManageCrews,
            Permission::ViewExecutions,
        ]
        .into_iter()
        .collect(),
        GroupRole::User => [Permission::ExecuteCrew, Permission::ViewExecutions]
            .into_iter()
            .collect(),
        GroupRole::Viewer => [Permission::ViewExecutions].into_iter().collect(),
    }
}

/// Check that `ctx` may perform `permission` in its primary group.
pub fn authorize(ctx: &GroupContext, permission: Permission) -> CrewResult<()> {
    if ctx.primary_group_id.trim().is_empty() {
        warn!(%permission, "Rejected request without a group");
        return Err(CrewError::Permission(format!(
            "{permission} requires a group context"
        )));
    }

    if grants_for(ctx.role).has(&permission) {
        debug!(group_id = %ctx.primary_group_id, role = %ctx.role, %permission, "Authorized");
        Ok(())
    } else {
        warn!(group_id = %ctx.primary_group_id, role = %ctx.role, %permission, "Permission denied");
        Err(CrewError::Permission(format!(
            "role {} cannot {permission} in group {}",
            ctx.role, ctx.primary_group_id
        )))
    }
}
