use crewdeck_crew::{CrewSchedule, ToolDefinition};
use crewdeck_llm::{ModelConfig, PlatformSettings};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Contents of `crewdeck.toml`.
#[derive(Debug, Deserialize)]
pub struct CrewdeckConfig {
    /// Root for history and other persisted state.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Managed platform detection and defaults.
    #[serde(default)]
    pub platform: PlatformSettings,
    /// Extra catalog models, keyed by alias.
    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,
    /// Provider keys; the environment is consulted for anything missing.
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
    /// Execution log buffering.
    #[serde(default)]
    pub history: HistoryConfig,
    /// Tools available to crews. Group-private tools carry a `group_id`.
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    /// Cron schedules run by `crewdeck schedule`.
    #[serde(default)]
    pub schedules: Vec<CrewSchedule>,
}

/// `[history]` section: execution log buffering.
#[derive(Debug, Deserialize)]
pub struct HistoryConfig {
    /// Pending entries held before new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Entries written per sink call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_queue_capacity() -> usize {
    1_000
}
fn default_batch_size() -> usize {
    50
}

impl CrewdeckConfig {
    /// Read the config file. A missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                String::new()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            }
        };
        let mut config: Self = toml::from_str(&raw)?;

        // Relative schedule crews are resolved against the config file.
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for schedule in &mut config.schedules {
            if schedule.crew.is_relative() {
                schedule.crew = base.join(&schedule.crew);
            }
        }
        Ok(config)
    }

    /// Directory holding the execution log file.
    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join("history")
    }
}
