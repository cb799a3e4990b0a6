use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CrewError;

/// Role of a user inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    /// Full control within the group.
    Admin,
    /// Can run and maintain crews.
    Manager,
    /// Can execute crews.
    User,
    /// Read-only access.
    Viewer,
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupRole::Admin => write!(f, "admin"),
            GroupRole::Manager => write!(f, "manager"),
            GroupRole::User => write!(f, "user"),
            GroupRole::Viewer => write!(f, "viewer"),
        }
    }
}

impl FromStr for GroupRole {
    type Err = CrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(GroupRole::Admin),
            "manager" => Ok(GroupRole::Manager),
            "user" => Ok(GroupRole::User),
            "viewer" => Ok(GroupRole::Viewer),
            other => Err(CrewError::Configuration(format!(
                "unknown group role '{other}'"
            ))),
        }
    }
}

/// Identity of the caller and the group it is acting in.
///
/// Everything an execution produces (logs, stored outputs, history records)
/// carries the primary group id so reads can be isolated per group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupContext {
    /// The group the current request is scoped to.
    pub primary_group_id: String,
    /// Every group the caller belongs to.
    #[serde(default)]
    pub group_ids: Vec<String>,
    /// Email of the caller, kept for audit.
    pub group_email: Option<String>,
    /// Role of the caller inside the primary group.
    pub role: GroupRole,
}

impl GroupContext {
    /// Create a context for a single group.
    pub fn new(group_id: impl Into<String>, role: GroupRole) -> Self {
        let group_id = group_id.into();
        Self {
            group_ids: vec![group_id.clone()],
            primary_group_id: group_id,
            group_email: None,
            role,
        }
    }

    /// Attach the caller's email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.group_email = Some(email.into());
        self
    }

    /// Whether the caller is a member of `group_id`.
    pub fn is_member_of(&self, group_id: &str) -> bool {
        self.primary_group_id == group_id || self.group_ids.iter().any(|g| g == group_id)
    }
}
