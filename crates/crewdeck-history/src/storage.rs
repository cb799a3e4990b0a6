use async_trait::async_trait;
use chrono::{Datelike, Local};
use crewdeck_core::{CrewError, CrewResult};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

/// Persists an execution output and returns where it was written.
#[async_trait]
pub trait OutputStore: Send + Sync {
    /// Write `output` for `task_key` and return the file path.
    async fn store(&self, task_key: &str, output: &Value, metadata: &Value) -> CrewResult<PathBuf>;
}

fn file_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Make `name` safe to use as one file name component.
///
/// Path separators, `..` and other characters that are not portable in file
/// names become `_`, so the result never leaves the output directory.
pub fn sanitize_file_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.replace("..", "_");
    if cleaned.is_empty() || cleaned == "." {
        "output".to_string()
    } else {
        cleaned
    }
}

/// Writes `<prefix>_<task_key>_<YYYYmmdd_HHMMSS>.json` into a directory.
///
/// The file wraps the output as
/// `{"task_key", "timestamp", "data", "metadata"}`.
pub struct JsonFileStorage {
    output_dir: PathBuf,
    prefix: String,
}

impl JsonFileStorage {
    /// Create a storage writing into `output_dir`. A blank prefix is left out of file names.
    pub fn new(output_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Directory the files are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn file_name(&self, task_key: &str, timestamp: &str) -> String {
        let task_key = sanitize_file_component(task_key);
        if self.prefix.trim().is_empty() {
            format!("{task_key}_{timestamp}.json")
        } else {
            format!(
                "{}_{task_key}_{timestamp}.json",
                sanitize_file_component(&self.prefix)
            )
        }
    }
}

#[async_trait]
impl OutputStore for JsonFileStorage {
    async fn store(&self, task_key: &str, output: &Value, metadata: &Value) -> CrewResult<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let timestamp = file_timestamp();
        let path = self.output_dir.join(self.file_name(task_key, &timestamp));
        let document = json!({
            "task_key": task_key,
            "timestamp": timestamp,
            "data": output,
            "metadata": metadata,
        });
        tokio::fs::write(&path, serde_json::to_string_pretty(&document)?).await?;

        info!(path = %path.display(), "Stored output");
        Ok(path)
    }
}

/// Writes the output as text under `base_dir`, optionally in `YYYY/MM`
/// subdirectories, rejecting outputs above a size limit.
pub struct FileSystemStorage {
    base_dir: PathBuf,
    date_dirs: bool,
    max_file_size_mb: f64,
}

impl FileSystemStorage {
    /// Create a storage under `base_dir` with date directories and a 10 MB limit.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            date_dirs: true,
            max_file_size_mb: 10.0,
        }
    }

    /// Toggle the `YYYY/MM` subdirectories.
    pub fn with_date_dirs(mut self, enabled: bool) -> Self {
        self.date_dirs = enabled;
        self
    }

    /// Maximum output size in megabytes.
    pub fn with_max_file_size_mb(mut self, max: f64) -> Self {
        self.max_file_size_mb = max;
        self
    }

    fn target_dir(&self) -> PathBuf {
        if self.date_dirs {
            let now = Local::now();
            self.base_dir
                .join(now.year().to_string())
                .join(format!("{:02}", now.month()))
        } else {
            self.base_dir.clone()
        }
    }
}

#[async_trait]
impl OutputStore for FileSystemStorage {
    async fn store(&self, task_key: &str, output: &Value, _metadata: &Value) -> CrewResult<PathBuf> {
        let content = match output {
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other)?,
        };

        let size_mb = content.len() as f64 / (1024.0 * 1024.0);
        if size_mb > self.max_file_size_mb {
            return Err(CrewError::Storage(format!(
                "Output size ({size_mb:.2}MB) exceeds maximum allowed size ({}MB)",
                self.max_file_size_mb
            )));
        }

        let dir = self.target_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!(
            "{}_{}.txt",
            sanitize_file_component(task_key),
            file_timestamp()
        ));
        tokio::fs::write(&path, content).await?;

        info!(path = %path.display(), "Stored output");
        Ok(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_prefix() {
        let with = JsonFileStorage::new("/tmp/out", "crew");
        assert!(with.file_name("summary", "20240101_000000").starts_with("crew_summary_"));
        let without = JsonFileStorage::new("/tmp/out", "");
        assert_eq!(
            without.file_name("summary", "20240101_000000"),
            "summary_20240101_000000.json"
        );
    }

    #[test]
    fn test_sanitize_file_component() {
        assert_eq!(sanitize_file_component("reports/final"), "reports_final");
        assert_eq!(sanitize_file_component("..\\..\\etc"), "____etc");
        assert_eq!(sanitize_file_component("../secrets"), "__secrets");
        assert_eq!(sanitize_file_component("  "), "output");
        assert_eq!(sanitize_file_component("weekly report"), "weekly report");
    }

    #[tokio::test]
    async fn test_json_storage_keeps_slashed_keys_in_output_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(tmp.path(), "team/blog");
        let path = storage
            .store("reports/final", &json!({"result": "ok"}), &Value::Null)
            .await
            .unwrap();

        assert_eq!(path.parent().unwrap(), tmp.path());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("team_blog_reports_final_"));
        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        // The document keeps the original key.
        assert_eq!(doc["task_key"], "reports/final");
    }

    #[tokio::test]
    async fn test_filesystem_storage_sanitizes_key() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::new(tmp.path()).with_date_dirs(false);
        let path = storage
            .store("../escape", &json!("text"), &Value::Null)
            .await
            .unwrap();
        assert_eq!(path.parent().unwrap(), tmp.path());
    }

    #[tokio::test]
    async fn test_json_storage_wraps_output() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(tmp.path().join("out"), "crew");
        let path = storage
            .store("report", &json!({"result": "ok"}), &json!({"execution_id": "e1"}))
            .await
            .unwrap();

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(doc["task_key"], "report");
        assert_eq!(doc["data"]["result"], "ok");
        assert_eq!(doc["metadata"]["execution_id"], "e1");
        assert_eq!(doc["timestamp"].as_str().unwrap().len(), 15);
    }

    #[tokio::test]
    async fn test_filesystem_storage_rejects_large_output() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::new(tmp.path()).with_max_file_size_mb(0.000_001);
        let err = storage
            .store("big", &json!("x".repeat(64)), &Value::Null)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeds maximum allowed size"));
    }

    #[tokio::test]
    async fn test_filesystem_storage_date_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::new(tmp.path());
        let path = storage
            .store("notes", &json!("plain text"), &Value::Null)
            .await
            .unwrap();

        let rel = path.strip_prefix(tmp.path()).unwrap();
        assert_eq!(rel.components().count(), 3);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "plain text");
    }
}
