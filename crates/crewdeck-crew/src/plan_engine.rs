//! A deterministic [`CrewEngine`] that runs no models.
//!
//! Kickoff walks the tasks in order and reports what each agent would be
//! asked to do, with `{placeholders}` filled from the kickoff inputs. Used
//! for dry runs from the CLI and by the execution service tests.

use crate::config::{non_blank, AgentSpec, ProcessType};
use crate::engine::{CrewBlueprint, CrewEngine, TaskBlueprint};
use crate::model::CredentialSource;
use crate::output::{CrewRun, KickoffResult, TaskOutput};
use crate::tools::{resolve_tools, ToolFactory, ToolService};
use async_trait::async_trait;
use crewdeck_core::{CrewError, CrewResult};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Agent built by the [`PlanEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAgent {
    /// Agent key.
    pub key: String,
    /// Declared role, or the key.
    pub role: String,
    /// Declared goal; empty when none.
    pub goal: String,
    /// Model override, if the agent declared one.
    pub llm: Option<String>,
    /// Titles of the resolved tools.
    pub tools: Vec<String>,
}

/// Task built by the [`PlanEngine`].
#[derive(Debug, Clone)]
pub struct PlannedTask {
    /// Task key.
    pub key: String,
    /// Description with placeholders filled at kickoff.
    pub description: String,
    /// Expected output as declared.
    pub expected_output: String,
    /// Agent running the task.
    pub agent: Arc<PlannedAgent>,
    /// Keys of the context tasks.
    pub context: Vec<String>,
    /// Effective async flag.
    pub async_execution: bool,
}

/// Crew built by the [`PlanEngine`].
#[derive(Debug, Clone)]
pub struct PlannedCrew {
    /// Agents in configuration order.
    pub agents: Vec<Arc<PlannedAgent>>,
    /// Tasks in execution order.
    pub tasks: Vec<Arc<PlannedTask>>,
    /// Task ordering.
    pub process: ProcessType,
    /// Resolved crew model.
    pub model: Option<String>,
    /// Manager model for hierarchical crews.
    pub manager_llm: Option<String>,
    /// Request rate limit.
    pub max_rpm: Option<u32>,
    /// Whether planning was requested.
    pub planning: bool,
    /// Source of the forwarded credential. The value itself is not kept.
    pub credential: Option<CredentialSource>,
}

/// Engine that plans crews without calling any model.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanEngine;

impl PlanEngine {
    /// Create a new engine.
    pub fn new() -> Self {
        Self
    }
}

// Literal pattern; cannot fail.
#[allow(clippy::unwrap_used)]
fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap())
}

/// Replace `{name}` with the matching input; unknown names stay as-is.
pub fn interpolate(template: &str, inputs: &Map<String, Value>) -> String {
    placeholder_pattern()
        .replace_all(template, |caps: &Captures<'_>| match inputs.get(&caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[async_trait]
impl CrewEngine for PlanEngine {
    type Agent = PlannedAgent;
    type Task = PlannedTask;
    type Crew = PlannedCrew;

    async fn create_agent(
        &self,
        key: &str,
        spec: &AgentSpec,
        tools: &dyn ToolService,
        factory: &dyn ToolFactory,
    ) -> CrewResult<Option<PlannedAgent>> {
        let handles = resolve_tools(&spec.tools, tools, factory).await?;
        Ok(Some(PlannedAgent {
            key: key.to_string(),
            role: non_blank(spec.role.as_deref()).unwrap_or(key).to_string(),
            goal: spec.goal.clone().unwrap_or_default(),
            llm: spec.llm.clone(),
            tools: handles.into_iter().map(|t| t.name).collect(),
        }))
    }

    async fn create_task(
        &self,
        blueprint: TaskBlueprint<PlannedAgent, PlannedTask>,
    ) -> CrewResult<PlannedTask> {
        if blueprint.spec.description.trim().is_empty() {
            return Err(CrewError::Materialization(format!(
                "task {} has no description",
                blueprint.key
            )));
        }
        Ok(PlannedTask {
            context: blueprint.context.iter().map(|t| t.key.clone()).collect(),
            key: blueprint.key,
            description: blueprint.spec.description,
            expected_output: blueprint.spec.expected_output,
            agent: blueprint.agent,
            async_execution: blueprint.spec.async_execution,
        })
    }

    async fn create_crew(
        &self,
        blueprint: CrewBlueprint<PlannedAgent, PlannedTask>,
    ) -> CrewResult<PlannedCrew> {
        if blueprint.process == ProcessType::Hierarchical && blueprint.manager_llm.is_none() {
            return Err(CrewError::Materialization(
                "hierarchical process requires a manager model".to_string(),
            ));
        }
        Ok(PlannedCrew {
            agents: blueprint.agents,
            tasks: blueprint.tasks,
            process: blueprint.process,
            model: blueprint.llm.map(|h| h.model()),
            manager_llm: blueprint.manager_llm,
            max_rpm: blueprint.max_rpm,
            planning: blueprint.planning,
            credential: blueprint.credential.map(|c| c.source),
        })
    }

    async fn kickoff(
        &self,
        crew: &PlannedCrew,
        inputs: &Map<String, Value>,
    ) -> CrewResult<KickoffResult> {
        let mut raw = String::new();
        let mut tasks_output = Vec::with_capacity(crew.tasks.len());

        for (i, task) in crew.tasks.iter().enumerate() {
            let description = interpolate(&task.description, inputs);
            let _ = write!(raw, "{}. [{}] {}", i + 1, task.key, task.agent.role);
            if !task.agent.tools.is_empty() {
                let _ = write!(raw, " (tools: {})", task.agent.tools.join(", "));
            }
            let _ = write!(raw, ": {description}");
            if !task.context.is_empty() {
                let _ = write!(raw, " (context: {})", task.context.join(", "));
            }
            raw.push('\n');

            tasks_output.push(TaskOutput {
                task_key: task.key.clone(),
                agent: task.agent.key.clone(),
                raw: description,
            });
        }

        debug!(tasks = tasks_output.len(), process = %crew.process, "Planned crew run");
        Ok(KickoffResult::Crew(CrewRun {
            raw: raw.trim_end().to_string(),
            tasks_output,
            token_usage: None,
        }))
    }
}
