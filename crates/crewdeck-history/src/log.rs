use chrono::{DateTime, Utc};
use crewdeck_core::GroupContext;
use serde::{Deserialize, Serialize};

/// One line of output produced while a crew executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    /// Execution the entry belongs to.
    pub execution_id: String,
    /// Log line.
    pub content: String,
    /// When the line was produced.
    pub timestamp: DateTime<Utc>,
    /// Primary group of the caller; `None` for system entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Email of the caller, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_email: Option<String>,
}

impl ExecutionLog {
    /// Entry stamped with the current time and no group.
    pub fn new(execution_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            group_id: None,
            group_email: None,
        }
    }

    /// Override the timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Scope the entry to the caller's primary group.
    pub fn with_group(mut self, ctx: &GroupContext) -> Self {
        self.group_id = Some(ctx.primary_group_id.clone());
        self.group_email = ctx.group_email.clone();
        self
    }

    /// Entries without a group are only visible to unscoped readers.
    pub fn visible_to(&self, group_id: Option<&str>) -> bool {
        match group_id {
            None => true,
            Some(group) => self.group_id.as_deref() == Some(group),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crewdeck_core::GroupRole;

    #[test]
    fn test_group_fields_copied_from_context() {
        let ctx = GroupContext::new("team-a", GroupRole::User).with_email("ana@example.com");
        let entry = ExecutionLog::new("exec-1", "hello").with_group(&ctx);
        assert_eq!(entry.group_id.as_deref(), Some("team-a"));
        assert_eq!(entry.group_email.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn test_visibility() {
        let ctx = GroupContext::new("team-a", GroupRole::User);
        let scoped = ExecutionLog::new("exec-1", "x").with_group(&ctx);
        let unscoped = ExecutionLog::new("exec-1", "y");

        assert!(scoped.visible_to(None));
        assert!(scoped.visible_to(Some("team-a")));
        assert!(!scoped.visible_to(Some("team-b")));
        assert!(!unscoped.visible_to(Some("team-a")));
    }

    #[test]
    fn test_unscoped_entry_omits_group_fields() {
        let json = serde_json::to_value(ExecutionLog::new("e", "c")).unwrap();
        assert!(json.get("group_id").is_none());
        assert_eq!(json["execution_id"], "e");
    }
}
