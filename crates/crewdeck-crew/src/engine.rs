use crate::config::{AgentSpec, EmbedderConfig, ProcessType, TaskSpec};
use crate::model::Credential;
use crate::output::KickoffResult;
use crate::tools::{ToolFactory, ToolService};
use async_trait::async_trait;
use crewdeck_core::CrewResult;
use crewdeck_llm::LlmHandle;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Everything an engine needs to build one task.
#[derive(Debug)]
pub struct TaskBlueprint<A, T> {
    /// Task key.
    pub key: String,
    /// The declaration with `async_execution` already set to its effective
    /// value.
    pub spec: TaskSpec,
    /// Key of the agent running the task.
    pub agent_key: String,
    /// The agent's engine handle.
    pub agent: Arc<A>,
    /// Resolved context tasks, in reference order.
    pub context: Vec<Arc<T>>,
}

/// Everything an engine needs to build one crew.
#[derive(Debug)]
pub struct CrewBlueprint<A, T> {
    /// Engine agents in configuration order.
    pub agents: Vec<Arc<A>>,
    /// Engine tasks in configuration order.
    pub tasks: Vec<Arc<T>>,
    /// Task ordering.
    pub process: ProcessType,
    /// Verbose crew output.
    pub verbose: bool,
    /// Engine-side memory.
    pub memory: bool,
    /// Planning before execution.
    pub planning: bool,
    /// Model used for planning.
    pub planning_llm: Option<String>,
    /// Reasoning before acting.
    pub reasoning: bool,
    /// Model used for reasoning.
    pub reasoning_llm: Option<String>,
    /// Manager model for hierarchical crews.
    pub manager_llm: Option<String>,
    /// Request rate limit.
    pub max_rpm: Option<u32>,
    /// `None` leaves model selection to the engine.
    pub llm: Option<LlmHandle>,
    /// Embedding settings taken from the first agent that declares one.
    pub embedder: Option<EmbedderConfig>,
    /// Credential the engine validates at construction time.
    pub credential: Option<Credential>,
}

/// The agent-orchestration engine the pipeline drives.
///
/// Implementations own the runtime objects; the pipeline only sequences
/// construction and keeps the handles.
#[async_trait]
pub trait CrewEngine: Send + Sync {
    /// Engine agent handle.
    type Agent: Send + Sync;
    /// Engine task handle.
    type Task: Send + Sync;
    /// Engine crew handle.
    type Crew: Send + Sync;

    /// `Ok(None)` means the engine declined to build this agent.
    async fn create_agent(
        &self,
        key: &str,
        spec: &AgentSpec,
        tools: &dyn ToolService,
        factory: &dyn ToolFactory,
    ) -> CrewResult<Option<Self::Agent>>;

    /// Build one task from its blueprint.
    async fn create_task(
        &self,
        blueprint: TaskBlueprint<Self::Agent, Self::Task>,
    ) -> CrewResult<Self::Task>;

    /// Assemble the crew.
    async fn create_crew(
        &self,
        blueprint: CrewBlueprint<Self::Agent, Self::Task>,
    ) -> CrewResult<Self::Crew>;

    /// Run the crew with the kickoff inputs.
    async fn kickoff(&self, crew: &Self::Crew, inputs: &Map<String, Value>)
        -> CrewResult<KickoffResult>;
}
