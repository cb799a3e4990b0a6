use crate::config::CrewConfiguration;
use crate::engine::CrewEngine;
use crate::output::ExecutionOutput;
use crate::preparation::{Collaborators, CrewPreparation, PreparationOptions, PreparationWarning};
use chrono::{DateTime, Utc};
use crewdeck_core::{CrewResult, GroupContext};
use crewdeck_history::{JsonFileStorage, LogQueue, OutputStore};
use crewdeck_security::{authorize, Permission};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A request to run one crew on behalf of a group member.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Name recorded in history and used in output file names.
    pub crew_name: String,
    /// The crew to run.
    pub config: CrewConfiguration,
    /// Identity of the caller.
    pub group: GroupContext,
}

/// Final status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// The crew ran and produced an output.
    Completed,
    /// Authorization, preparation or execution failed.
    Failed,
}

/// Outcome of one execution, as kept in history.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    /// Unique id of this execution.
    pub execution_id: String,
    /// Name from the request.
    pub crew_name: String,
    /// Primary group of the caller.
    pub group_id: String,
    /// Completed or failed.
    pub status: ExecutionStatus,
    /// When the request was accepted.
    pub started_at: DateTime<Utc>,
    /// When the record was written.
    pub finished_at: DateTime<Utc>,
    /// Normalized output, or the error that ended the run.
    pub output: ExecutionOutput,
    /// Warnings collected during preparation and execution.
    pub warnings: Vec<PreparationWarning>,
    /// Where the output was stored, when the crew has an `output_dir`.
    pub output_path: Option<PathBuf>,
}

/// Runs crews end to end: authorization, preparation, execution, execution
/// logs and output storage.
pub struct CrewExecutionService<E: CrewEngine> {
    engine: Arc<E>,
    deps: Collaborators,
    options: PreparationOptions,
    logs: LogQueue,
}

impl<E: CrewEngine> CrewExecutionService<E> {
    /// Create a service that sends execution logs to `logs`.
    pub fn new(engine: Arc<E>, deps: Collaborators, logs: LogQueue) -> Self {
        Self {
            engine,
            deps,
            options: PreparationOptions::default(),
            logs,
        }
    }

    /// Options for every preparation this service runs.
    pub fn with_options(mut self, options: PreparationOptions) -> Self {
        self.options = options;
        self
    }

    fn log(&self, execution_id: &str, group: &GroupContext, content: impl Into<String>) {
        if !self.logs.enqueue(execution_id, content, None, Some(group)) {
            debug!(execution_id, "Execution log entry dropped");
        }
    }

    /// Run a crew. Only authorization failures are returned as errors; every
    /// pipeline failure ends up in the record's output.
    ///
    /// Tools are looked up in the caller's group view of the tool service.
    pub async fn run(&self, request: ExecutionRequest) -> CrewResult<ExecutionRecord> {
        authorize(&request.group, Permission::ExecuteCrew)?;

        let execution_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let group = request.group;
        let crew_name = request.crew_name;
        let output_dir = request.config.output_dir.clone();

        info!(
            execution_id = %execution_id,
            group_id = %group.primary_group_id,
            crew = %crew_name,
            "Starting crew execution"
        );
        self.log(&execution_id, &group, format!("Starting execution of crew {crew_name}"));

        let mut deps = self.deps.clone();
        deps.tool_service = deps.tool_service.scoped_to_group(&group.primary_group_id);

        let mut preparation = CrewPreparation::new(
            Arc::new(request.config),
            Arc::clone(&self.engine),
            deps,
        )
        .with_options(self.options.clone());

        let (output, final_task) = if preparation.prepare().await {
            let final_task = preparation.tasks().last().map(|t| t.key.clone());
            self.log(
                &execution_id,
                &group,
                format!(
                    "Prepared {} agents and {} tasks",
                    preparation.agents().len(),
                    preparation.tasks().len()
                ),
            );
            (preparation.execute().await, final_task)
        } else {
            (ExecutionOutput::error("Crew preparation failed"), None)
        };

        for warning in preparation.warnings() {
            self.log(&execution_id, &group, format!("Warning: {warning}"));
        }

        let status = match output.error_message() {
            Some(message) => {
                self.log(&execution_id, &group, format!("Execution failed: {message}"));
                ExecutionStatus::Failed
            }
            None => {
                self.log(&execution_id, &group, "Execution completed");
                ExecutionStatus::Completed
            }
        };

        let output_path = match (&output_dir, status) {
            (Some(dir), ExecutionStatus::Completed) => {
                let storage = JsonFileStorage::new(dir.clone(), crew_name.clone());
                let task_key = final_task.unwrap_or_else(|| "crew".to_string());
                let metadata = json!({
                    "execution_id": execution_id,
                    "group_id": group.primary_group_id,
                    "crew": crew_name,
                });
                match storage.store(&task_key, &output.to_value(), &metadata).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(execution_id = %execution_id, error = %e, "Failed to store output");
                        self.log(&execution_id, &group, format!("Failed to store output: {e}"));
                        None
                    }
                }
            }
            _ => None,
        };

        info!(execution_id = %execution_id, status = ?status, "Crew execution finished");
        Ok(ExecutionRecord {
            execution_id,
            crew_name,
            group_id: group.primary_group_id.clone(),
            status,
            started_at,
            finished_at: Utc::now(),
            output,
            warnings: preparation.warnings().to_vec(),
            output_path,
        })
    }
}
