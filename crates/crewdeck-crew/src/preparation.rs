use crate::agents::{agent_key, AgentSet, MaterializedAgent};
use crate::config::{validate_crew_config, CrewConfiguration, ProcessType};
use crate::context::{effective_async, normalize_context, resolve_context, MaterializedTask};
use crate::engine::{CrewBlueprint, CrewEngine, TaskBlueprint};
use crate::errors::{ErrorHandler, TracingErrorHandler};
use crate::missing::{HeuristicMissingDataDetector, MissingDataDetector};
use crate::model::{detect_managed, resolve_credential, resolve_crew_model};
use crate::output::{process_crew_output, ExecutionOutput};
use crate::tools::{ToolFactory, ToolService};
use crewdeck_core::{CrewError, CrewResult};
use crewdeck_llm::{ApiKeyProvider, LlmManager, PlatformDetector, PlatformSettings};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where a [`CrewPreparation`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreparationState {
    /// Nothing has run yet.
    Unprepared,
    /// Configuration checks are running.
    Validating,
    /// Agents are created.
    AgentsReady,
    /// Tasks are created.
    TasksReady,
    /// Ready to execute.
    CrewReady,
    /// Kickoff is in progress.
    Executing,
    /// Execution finished, successfully or not.
    Completed,
    /// A stage failed; see the error handler output.
    Failed,
}

/// Non-fatal conditions met while preparing or running a crew.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreparationWarning {
    /// Two agents resolved to the same key.
    DuplicateAgentKey {
        /// The duplicated key.
        key: String,
    },
    /// The task's agent was not found and the first agent was used instead.
    AgentFallback {
        /// Key of the task.
        task: String,
        /// Key the task asked for, if any.
        requested: Option<String>,
        /// Key of the agent actually used.
        used: String,
    },
    /// Only the last task may run asynchronously.
    AsyncCoerced {
        /// Key of the task.
        task: String,
    },
    /// A context reference matched no earlier task.
    UnresolvedContext {
        /// Key of the task.
        task: String,
        /// The reference that did not resolve.
        reference: String,
    },
    /// Context was declared but none of it resolved.
    NoContextResolved {
        /// Key of the task.
        task: String,
    },
    /// The task's `context` field had an unrecognized shape and was ignored.
    UnsupportedContext {
        /// Key of the task.
        task: String,
    },
    /// The output looked incomplete.
    MissingData,
}

impl fmt::Display for PreparationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateAgentKey { key } => {
                write!(f, "Duplicate agent key {key}, replacing earlier agent")
            }
            Self::AgentFallback {
                task,
                requested: Some(requested),
                used,
            } => write!(f, "Agent {requested} not found for task {task}, using {used}"),
            Self::AgentFallback {
                task,
                requested: None,
                used,
            } => write!(f, "No agent declared for task {task}, using {used}"),
            Self::AsyncCoerced { task } => write!(
                f,
                "Task {task} requested async execution but is not the last task"
            ),
            Self::UnresolvedContext { task, reference } => {
                write!(f, "Could not resolve context task {reference} for task {task}")
            }
            Self::NoContextResolved { task } => {
                write!(f, "No context tasks could be resolved for task {task}")
            }
            Self::UnsupportedContext { task } => write!(
                f,
                "Unsupported context format for task {task}, expected a task id, a list of ids or task_ids"
            ),
            Self::MissingData => write!(f, "Crew execution completed but data may be missing"),
        }
    }
}

/// External services the pipeline calls out to.
#[derive(Clone)]
pub struct Collaborators {
    /// Looks tools up by id or title.
    pub tool_service: Arc<dyn ToolService>,
    /// Turns tool definitions into engine tools.
    pub tool_factory: Arc<dyn ToolFactory>,
    /// Managed platform detection.
    pub platform: Arc<dyn PlatformDetector>,
    /// Resolves model identifiers.
    pub llm: Arc<dyn LlmManager>,
    /// Provider credentials.
    pub keys: Arc<dyn ApiKeyProvider>,
    /// Flags incomplete outputs.
    pub missing_data: Arc<dyn MissingDataDetector>,
    /// Receives every error the pipeline catches.
    pub errors: Arc<dyn ErrorHandler>,
}

impl Collaborators {
    /// Collaborators with the heuristic missing-data detector and the
    /// tracing error handler.
    pub fn new(
        tool_service: Arc<dyn ToolService>,
        tool_factory: Arc<dyn ToolFactory>,
        platform: Arc<dyn PlatformDetector>,
        llm: Arc<dyn LlmManager>,
        keys: Arc<dyn ApiKeyProvider>,
    ) -> Self {
        Self {
            tool_service,
            tool_factory,
            platform,
            llm,
            keys,
            missing_data: Arc::new(HeuristicMissingDataDetector::new()),
            errors: Arc::new(TracingErrorHandler),
        }
    }

    /// Replace the error handler.
    pub fn with_error_handler(mut self, errors: Arc<dyn ErrorHandler>) -> Self {
        self.errors = errors;
        self
    }

    /// Replace the missing-data detector.
    pub fn with_missing_data_detector(mut self, detector: Arc<dyn MissingDataDetector>) -> Self {
        self.missing_data = detector;
        self
    }
}

/// Settings the pipeline applies on top of the crew configuration.
#[derive(Debug, Clone)]
pub struct PreparationOptions {
    /// Forwarded on the managed platform when no OpenAI key is configured.
    pub placeholder_credential: String,
}

impl Default for PreparationOptions {
    fn default() -> Self {
        Self {
            placeholder_credential: PlatformSettings::default().placeholder_credential,
        }
    }
}

impl From<&PlatformSettings> for PreparationOptions {
    fn from(settings: &PlatformSettings) -> Self {
        Self {
            placeholder_credential: settings.placeholder_credential.clone(),
        }
    }
}

/// One preparation and execution cycle of a crew.
///
/// Stages run in order: validate, agents, tasks, crew, execute. Each stage
/// reports failure as `false` (or an error output) after routing the cause
/// through the [`ErrorHandler`]; nothing propagates to the caller.
pub struct CrewPreparation<E: CrewEngine> {
    config: Arc<CrewConfiguration>,
    engine: Arc<E>,
    deps: Collaborators,
    options: PreparationOptions,
    agents: AgentSet<E::Agent>,
    tasks: Vec<MaterializedTask<E::Task>>,
    crew: Option<E::Crew>,
    state: PreparationState,
    warnings: Vec<PreparationWarning>,
}

impl<E: CrewEngine> CrewPreparation<E> {
    /// Create a preparation in the [`PreparationState::Unprepared`] state.
    pub fn new(config: Arc<CrewConfiguration>, engine: Arc<E>, deps: Collaborators) -> Self {
        Self {
            config,
            engine,
            deps,
            options: PreparationOptions::default(),
            agents: AgentSet::new(),
            tasks: Vec::new(),
            crew: None,
            state: PreparationState::Unprepared,
            warnings: Vec::new(),
        }
    }

    /// Replace the default options.
    pub fn with_options(mut self, options: PreparationOptions) -> Self {
        self.options = options;
        self
    }

    /// The crew configuration being prepared.
    pub fn config(&self) -> &CrewConfiguration {
        &self.config
    }

    /// Agents created so far.
    pub fn agents(&self) -> &AgentSet<E::Agent> {
        &self.agents
    }

    /// Tasks created so far.
    pub fn tasks(&self) -> &[MaterializedTask<E::Task>] {
        &self.tasks
    }

    /// The assembled crew, once [`create_crew`](Self::create_crew) succeeded.
    pub fn crew(&self) -> Option<&E::Crew> {
        self.crew.as_ref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PreparationState {
        self.state
    }

    /// Warnings collected across all stages, in order.
    pub fn warnings(&self) -> &[PreparationWarning] {
        &self.warnings
    }

    fn warn(&mut self, warning: PreparationWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    fn fail(&mut self, error: &CrewError, operation: &str) {
        self.deps.errors.handle(error, operation);
        self.state = PreparationState::Failed;
    }

    /// Run every preparation stage. On success the crew is ready to execute.
    pub async fn prepare(&mut self) -> bool {
        self.state = PreparationState::Validating;
        self.warnings.clear();

        if !validate_crew_config(&self.config) {
            self.state = PreparationState::Failed;
            return false;
        }
        if !self.create_agents().await {
            error!("Failed to create agents");
            return false;
        }
        if !self.create_tasks().await {
            error!("Failed to create tasks");
            return false;
        }
        if !self.create_crew().await {
            error!("Failed to create crew");
            return false;
        }

        info!(
            agents = self.agents.len(),
            tasks = self.tasks.len(),
            "Crew preparation completed successfully"
        );
        true
    }

    /// Materialize every agent. Any agent the engine declines fails the
    /// whole stage.
    pub async fn create_agents(&mut self) -> bool {
        self.agents.clear();
        match self.try_create_agents().await {
            Ok(true) => {
                self.state = PreparationState::AgentsReady;
                true
            }
            Ok(false) => {
                self.agents.clear();
                self.state = PreparationState::Failed;
                false
            }
            Err(e) => {
                self.agents.clear();
                self.fail(&e, "Error creating agents");
                false
            }
        }
    }

    async fn try_create_agents(&mut self) -> CrewResult<bool> {
        let config = Arc::clone(&self.config);
        let engine = Arc::clone(&self.engine);

        for (index, spec) in config.agents.iter().enumerate() {
            let key = agent_key(spec, index);
            let created = engine
                .create_agent(
                    &key,
                    spec,
                    self.deps.tool_service.as_ref(),
                    self.deps.tool_factory.as_ref(),
                )
                .await?;

            let Some(agent) = created else {
                error!(agent = %key, "Failed to create agent {key}");
                return Ok(false);
            };

            let replaced = self.agents.insert(MaterializedAgent {
                key: key.clone(),
                index,
                agent: Arc::new(agent),
            });
            if replaced.is_some() {
                self.warn(PreparationWarning::DuplicateAgentKey { key: key.clone() });
            }
            info!(agent = %key, "Created agent");
        }
        Ok(true)
    }

    /// Materialize every task against the agents created so far.
    pub async fn create_tasks(&mut self) -> bool {
        self.tasks.clear();
        match self.try_create_tasks().await {
            Ok(true) => {
                self.state = PreparationState::TasksReady;
                true
            }
            Ok(false) => {
                self.state = PreparationState::Failed;
                false
            }
            Err(e) => {
                self.tasks.clear();
                self.fail(&e, "Error creating tasks");
                false
            }
        }
    }

    async fn try_create_tasks(&mut self) -> CrewResult<bool> {
        if self.agents.is_empty() {
            error!("No agents available for task creation");
            return Ok(false);
        }

        let config = Arc::clone(&self.config);
        let engine = Arc::clone(&self.engine);
        let total = config.tasks.len();

        for (index, spec) in config.tasks.iter().enumerate() {
            let key = spec.key(index);
            let (agent_key, agent) = self.resolve_agent(&key, spec.agent.as_deref())?;

            let async_execution = effective_async(spec.async_execution, index, total);
            if spec.async_execution && !async_execution {
                self.warn(PreparationWarning::AsyncCoerced { task: key.clone() });
            }

            if spec.context.as_ref().is_some_and(|c| !c.is_supported()) {
                self.warn(PreparationWarning::UnsupportedContext { task: key.clone() });
            }
            let references = normalize_context(spec.context.as_ref());
            let context = resolve_context(&references, &self.tasks);
            for reference in &context.unresolved {
                self.warn(PreparationWarning::UnresolvedContext {
                    task: key.clone(),
                    reference: reference.clone(),
                });
            }
            if !references.is_empty() && context.is_empty() {
                self.warn(PreparationWarning::NoContextResolved { task: key.clone() });
            }

            let mut effective = spec.clone();
            effective.async_execution = async_execution;

            let task = engine
                .create_task(TaskBlueprint {
                    key: key.clone(),
                    spec: effective,
                    agent_key: agent_key.clone(),
                    agent,
                    context: context.tasks,
                })
                .await?;

            info!(task = %key, agent = %agent_key, context = ?context.keys, "Created task");
            self.tasks.push(MaterializedTask {
                key,
                name: spec.name.clone(),
                index,
                agent_key,
                async_execution,
                context: context.keys,
                task: Arc::new(task),
            });
        }
        Ok(true)
    }

    fn resolve_agent(
        &mut self,
        task: &str,
        declared: Option<&str>,
    ) -> CrewResult<(String, Arc<E::Agent>)> {
        let declared = declared.map(str::trim).filter(|d| !d.is_empty());
        if let Some(found) = declared.and_then(|d| self.agents.get(d)) {
            return Ok((found.key.clone(), Arc::clone(&found.agent)));
        }

        let (used, agent) = self
            .agents
            .first()
            .map(|a| (a.key.clone(), Arc::clone(&a.agent)))
            .ok_or_else(|| CrewError::Materialization("No agents available".to_string()))?;

        self.warn(PreparationWarning::AgentFallback {
            task: task.to_string(),
            requested: declared.map(str::to_string),
            used: used.clone(),
        });
        Ok((used, agent))
    }

    /// Assemble the crew from the materialized agents and tasks.
    pub async fn create_crew(&mut self) -> bool {
        self.crew = None;
        match self.try_create_crew().await {
            Ok(true) => {
                self.state = PreparationState::CrewReady;
                true
            }
            Ok(false) => {
                self.state = PreparationState::Failed;
                false
            }
            Err(e) => {
                self.fail(&e, "Error creating crew");
                false
            }
        }
    }

    async fn try_create_crew(&mut self) -> CrewResult<bool> {
        if self.agents.is_empty() || self.tasks.is_empty() {
            error!(
                agents = self.agents.len(),
                tasks = self.tasks.len(),
                "Cannot create crew without agents and tasks"
            );
            return Ok(false);
        }

        let config = Arc::clone(&self.config);
        let process = &config.crew;

        let managed = detect_managed(self.deps.platform.as_ref());
        let llm = resolve_crew_model(
            config.model.as_deref(),
            managed,
            self.deps.platform.as_ref(),
            self.deps.llm.as_ref(),
        )
        .await;

        let embedder = config.agents.iter().find_map(|a| a.embedder_config.clone());
        if let Some(embedder) = &embedder {
            let rendered = Value::Object(embedder.config.clone()).to_string();
            info!(
                "Found embedder configuration: provider={} config={rendered}",
                embedder.provider
            );
        }

        let credential = resolve_credential(
            managed,
            self.deps.keys.as_ref(),
            &self.options.placeholder_credential,
        )
        .await;

        let manager_llm = match process.process {
            ProcessType::Hierarchical => process.manager_llm.clone().or_else(|| config.model.clone()),
            ProcessType::Sequential => None,
        };

        let blueprint = CrewBlueprint {
            agents: self.agents.agents(),
            tasks: self.tasks.iter().map(|t| Arc::clone(&t.task)).collect(),
            process: process.process,
            verbose: process.verbose,
            memory: process.memory,
            planning: process.planning,
            planning_llm: process.planning_llm.clone().filter(|_| process.planning),
            reasoning: process.reasoning,
            reasoning_llm: process.reasoning_llm.clone().filter(|_| process.reasoning),
            manager_llm,
            max_rpm: config.max_rpm,
            llm,
            embedder,
            credential,
        };

        let crew = self.engine.create_crew(blueprint).await?;
        self.crew = Some(crew);
        info!(process = %process.process, managed, "Created crew");
        Ok(true)
    }

    /// Run the prepared crew and normalize its result.
    ///
    /// The crew handle is consumed; executing again requires preparing again.
    pub async fn execute(&mut self) -> ExecutionOutput {
        let Some(crew) = self.crew.take() else {
            return ExecutionOutput::error("Crew not prepared");
        };

        self.state = PreparationState::Executing;
        info!("Starting crew execution");

        match self.engine.kickoff(&crew, &self.config.inputs).await {
            Ok(result) => {
                let output = process_crew_output(result);
                if output.is_error() {
                    self.state = PreparationState::Failed;
                    return output;
                }
                if self.deps.missing_data.is_data_missing(&output) {
                    self.warn(PreparationWarning::MissingData);
                }
                self.state = PreparationState::Completed;
                info!("Crew execution completed");
                output
            }
            Err(e) => {
                self.fail(&e, "Error executing crew");
                ExecutionOutput::error(e.to_string())
            }
        }
    }
}
