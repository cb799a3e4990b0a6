use crewdeck_core::{CrewError, CrewResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::error;

/// Declarative description of one crew run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrewConfiguration {
    /// Agent declarations, in order.
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
    /// Task declarations, in execution order.
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
    /// Crew-level options.
    #[serde(default)]
    pub crew: ProcessSpec,
    /// Default model for the crew.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Request rate limit handed to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rpm: Option<u32>,
    /// Where the final output is stored; no storage when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Values handed to the engine at kickoff.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub inputs: Map<String, Value>,
}

impl CrewConfiguration {
    /// Parse a JSON crew file.
    pub fn from_json(data: &str) -> CrewResult<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Parse a TOML crew file.
    pub fn from_toml(data: &str) -> CrewResult<Self> {
        toml::from_str(data)
            .map_err(|e| CrewError::Configuration(format!("invalid crew TOML: {e}")))
    }

    /// Load a `.toml` or `.json` crew file.
    pub async fn load(path: &Path) -> CrewResult<Self> {
        let data = tokio::fs::read_to_string(path).await?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&data),
            _ => Self::from_json(&data),
        }
    }
}

/// One agent declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSpec {
    /// Preferred agent key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Agent key when `name` is blank.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// What the agent is trying to achieve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    /// Background handed to the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backstory: Option<String>,
    /// Per-agent model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<String>,
    /// Tool ids or titles, resolved through the tool service.
    pub tools: Vec<String>,
    /// Ask the engine for verbose agent output.
    pub verbose: bool,
    /// Embedding settings for crew memory. The first agent that declares one wins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedder_config: Option<EmbedderConfig>,
    /// Engine-specific keys, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Embedding provider plus provider-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedderConfig {
    /// Provider name, e.g. `openai`.
    pub provider: String,
    /// Provider-specific settings.
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// One task declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSpec {
    /// Preferred task key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Task key when `id` is blank. Context references may also use it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// What the agent is asked to do. `{placeholders}` are filled from the inputs.
    pub description: String,
    /// What a finished task should look like.
    pub expected_output: String,
    /// Key of the agent that runs this task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Task-level tool ids or titles, passed to the engine as declared.
    pub tools: Vec<String>,
    /// Earlier tasks whose output this task reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextRef>,
    /// Only honored on the last task.
    pub async_execution: bool,
    /// Engine-specific keys, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskSpec {
    /// Identifier used for context references: id, then name, then
    /// `task_N` with N the 1-based position.
    pub fn key(&self, index: usize) -> String {
        non_blank(self.id.as_deref())
            .or_else(|| non_blank(self.name.as_deref()))
            .map(str::to_string)
            .unwrap_or_else(|| format!("task_{}", index + 1))
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// The accepted shapes of a task's `context` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextRef {
    /// `context = "research"`
    Single(String),
    /// `context = ["research", "outline"]`
    Many(Vec<String>),
    /// `context = { task_ids = [...] }`
    Mapping {
        /// Referenced task ids.
        task_ids: Vec<String>,
    },
    /// Any other shape. It references nothing and preparation warns about it.
    Unsupported(Value),
}

impl ContextRef {
    /// Referenced task ids in declaration order, blanks and repeats removed.
    pub fn task_ids(&self) -> Vec<String> {
        let raw: &[String] = match self {
            ContextRef::Single(id) => std::slice::from_ref(id),
            ContextRef::Many(ids) | ContextRef::Mapping { task_ids: ids } => ids,
            ContextRef::Unsupported(_) => &[],
        };

        let mut ids: Vec<String> = Vec::with_capacity(raw.len());
        for id in raw {
            let id = id.trim();
            if !id.is_empty() && !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
        }
        ids
    }

    /// Whether the field had one of the recognized shapes.
    pub fn is_supported(&self) -> bool {
        !matches!(self, ContextRef::Unsupported(_))
    }
}

/// How the engine orders task execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessType {
    /// Tasks run in declaration order.
    #[default]
    Sequential,
    /// A manager model delegates tasks to agents.
    Hierarchical,
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessType::Sequential => write!(f, "sequential"),
            ProcessType::Hierarchical => write!(f, "hierarchical"),
        }
    }
}

/// Crew-level options (`crew` section).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessSpec {
    /// Task ordering.
    pub process: ProcessType,
    /// Ask the engine for verbose crew output.
    pub verbose: bool,
    /// Enable engine-side memory.
    pub memory: bool,
    /// Let the engine plan before running tasks.
    pub planning: bool,
    /// Let agents reason before acting.
    pub reasoning: bool,
    /// Model used for planning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planning_llm: Option<String>,
    /// Model used for reasoning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_llm: Option<String>,
    /// Manager model for hierarchical crews.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_llm: Option<String>,
}

/// Fails with [`CrewError::MissingSection`] when `agents` or `tasks` is
/// absent or empty.
pub fn check_crew_config(config: &CrewConfiguration) -> CrewResult<()> {
    if config.agents.is_empty() {
        return Err(CrewError::MissingSection("agents"));
    }
    if config.tasks.is_empty() {
        return Err(CrewError::MissingSection("tasks"));
    }
    Ok(())
}

/// Boolean form of [`check_crew_config`] that logs the missing section.
pub fn validate_crew_config(config: &CrewConfiguration) -> bool {
    match check_crew_config(config) {
        Ok(()) => true,
        Err(e) => {
            error!("{e}");
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> CrewConfiguration {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_missing_agents() {
        let cfg = config(json!({"tasks": [{"description": "t"}]}));
        assert!(!validate_crew_config(&cfg));
        let err = check_crew_config(&cfg).unwrap_err();
        assert_eq!(err.to_string(), "Missing or empty required section: agents");
    }

    #[test]
    fn test_empty_tasks() {
        let cfg = config(json!({"agents": [{"role": "r"}], "tasks": []}));
        assert!(!validate_crew_config(&cfg));
        let err = check_crew_config(&cfg).unwrap_err();
        assert_eq!(err.to_string(), "Missing or empty required section: tasks");
    }

    #[test]
    fn test_valid_config() {
        let cfg = config(json!({
            "agents": [{"name": "researcher", "role": "Researcher"}],
            "tasks": [{"id": "t1", "description": "d", "agent": "researcher"}],
            "crew": {"process": "hierarchical", "planning": true},
            "model": "gpt-4",
            "max_rpm": 10
        }));
        assert!(validate_crew_config(&cfg));
        assert_eq!(cfg.crew.process, ProcessType::Hierarchical);
        assert!(cfg.crew.planning);
        assert_eq!(cfg.max_rpm, Some(10));
    }

    #[test]
    fn test_context_shapes() {
        let single: ContextRef = serde_json::from_value(json!("a")).unwrap();
        let many: ContextRef = serde_json::from_value(json!(["a", "b", "a", " "])).unwrap();
        let mapping: ContextRef = serde_json::from_value(json!({"task_ids": ["b"]})).unwrap();

        assert_eq!(single.task_ids(), vec!["a"]);
        assert_eq!(many.task_ids(), vec!["a", "b"]);
        assert_eq!(mapping.task_ids(), vec!["b"]);
    }

    #[test]
    fn test_unknown_context_shape_parses_as_unsupported() {
        let cfg = config(json!({
            "agents": [{"role": "r"}],
            "tasks": [
                {"id": "a", "description": "d"},
                {"description": "d", "context": {"ids": ["a"]}},
                {"description": "d", "context": [1, 2]}
            ]
        }));

        for task in &cfg.tasks[1..] {
            let context = task.context.as_ref().unwrap();
            assert!(!context.is_supported());
            assert!(context.task_ids().is_empty());
        }
        assert_eq!(
            cfg.tasks[1].context,
            Some(ContextRef::Unsupported(json!({"ids": ["a"]})))
        );
    }

    #[test]
    fn test_extra_agent_keys_preserved() {
        let cfg = config(json!({
            "agents": [{"role": "r", "allow_delegation": true, "max_iter": 5}],
            "tasks": [{"description": "d"}]
        }));
        assert_eq!(cfg.agents[0].extra["allow_delegation"], json!(true));
        assert_eq!(cfg.agents[0].extra["max_iter"], json!(5));
    }

    #[test]
    fn test_task_key_fallback() {
        let mut spec = TaskSpec::default();
        assert_eq!(spec.key(2), "task_3");
        spec.name = Some("write".into());
        assert_eq!(spec.key(2), "write");
        spec.id = Some("t-1".into());
        assert_eq!(spec.key(2), "t-1");
    }

    #[test]
    fn test_from_toml() {
        let cfg = CrewConfiguration::from_toml(
            r#"
model = "gpt-4o-mini"

[crew]
process = "sequential"
memory = true

[[agents]]
name = "writer"
role = "Writer"

[[tasks]]
id = "draft"
description = "Write a draft"
agent = "writer"
context = { task_ids = [] }
"#,
        )
        .unwrap();
        assert!(cfg.crew.memory);
        assert_eq!(cfg.tasks[0].context, Some(ContextRef::Mapping { task_ids: vec![] }));
    }
}
