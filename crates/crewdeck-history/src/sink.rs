use crate::log::ExecutionLog;
use async_trait::async_trait;
use crewdeck_core::{CrewError, CrewResult};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Destination for drained log batches.
#[async_trait]
pub trait ExecutionLogSink: Send + Sync {
    /// Persist `entries` in order.
    async fn write_batch(&self, entries: &[ExecutionLog]) -> CrewResult<()>;
}

/// Append-only JSON-lines file.
pub struct JsonlLogSink {
    path: PathBuf,
}

impl JsonlLogSink {
    /// Open (or create) `execution_logs.jsonl` inside `dir`.
    pub async fn new(dir: &Path) -> CrewResult<Self> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self {
            path: dir.join("execution_logs.jsonl"),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry back, skipping lines that fail to parse.
    pub async fn read_all(&self) -> CrewResult<Vec<ExecutionLog>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(&self.path).await?;
        Ok(data
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Entries for one execution, limited to those visible to `group_id`.
    pub async fn for_execution(
        &self,
        execution_id: &str,
        group_id: Option<&str>,
    ) -> CrewResult<Vec<ExecutionLog>> {
        let mut entries = self.read_all().await?;
        entries.retain(|e| e.execution_id == execution_id && e.visible_to(group_id));
        Ok(entries)
    }
}

#[async_trait]
impl ExecutionLogSink for JsonlLogSink {
    async fn write_batch(&self, entries: &[ExecutionLog]) -> CrewResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut buf = String::new();
        for entry in entries {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| CrewError::Storage(format!("{}: {e}", self.path.display())))?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// In-process sink, used by tests and short-lived CLI runs.
#[derive(Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<ExecutionLog>>,
}

impl MemoryLogSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing was written.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Entries for one execution, in arrival order, limited to `group_id`
    /// when given.
    pub fn for_execution(&self, execution_id: &str, group_id: Option<&str>) -> Vec<ExecutionLog> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.execution_id == execution_id && e.visible_to(group_id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ExecutionLogSink for MemoryLogSink {
    async fn write_batch(&self, entries: &[ExecutionLog]) -> CrewResult<()> {
        self.entries.lock().extend_from_slice(entries);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crewdeck_core::{GroupContext, GroupRole};

    #[tokio::test]
    async fn test_memory_sink_isolates_groups() {
        let sink = MemoryLogSink::new();
        let a = GroupContext::new("team-a", GroupRole::User);
        let b = GroupContext::new("team-b", GroupRole::User);
        sink.write_batch(&[
            ExecutionLog::new("exec-1", "a1").with_group(&a),
            ExecutionLog::new("exec-1", "b1").with_group(&b),
            ExecutionLog::new("exec-2", "a2").with_group(&a),
        ])
        .await
        .unwrap();

        assert_eq!(sink.len(), 3);
        let seen: Vec<_> = sink
            .for_execution("exec-1", Some("team-a"))
            .into_iter()
            .map(|e| e.content)
            .collect();
        assert_eq!(seen, vec!["a1"]);
        assert_eq!(sink.for_execution("exec-1", None).len(), 2);
    }

    #[tokio::test]
    async fn test_jsonl_sink_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = JsonlLogSink::new(&tmp.path().join("logs")).await.unwrap();

        sink.write_batch(&[ExecutionLog::new("exec-1", "first")])
            .await
            .unwrap();
        sink.write_batch(&[ExecutionLog::new("exec-1", "second")])
            .await
            .unwrap();

        let all = sink.read_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].content, "second");
    }

    #[tokio::test]
    async fn test_jsonl_sink_missing_file_reads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = JsonlLogSink::new(tmp.path()).await.unwrap();
        assert!(sink.read_all().await.unwrap().is_empty());
    }
}
