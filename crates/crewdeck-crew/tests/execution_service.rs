#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end runs through the execution service with the plan engine,
//! an in-memory execution log and on-disk output storage.

use crewdeck_core::{CrewError, GroupContext, GroupRole};
use crewdeck_crew::*;
use crewdeck_history::{LogQueue, LogWriter, MemoryLogSink};
use crewdeck_llm::env::fixed_env;
use crewdeck_llm::{EnvPlatformDetector, ModelCatalog, PlatformSettings, StaticApiKeyProvider};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    service: CrewExecutionService<PlanEngine>,
    writer: LogWriter,
    sink: Arc<MemoryLogSink>,
}

impl Harness {
    fn new() -> Self {
        let keys = Arc::new(StaticApiKeyProvider::new(HashMap::new()));
        let tools = ToolRegistry::with_tools([
            ToolDefinition {
                id: "search_tool".into(),
                title: "Web Search".into(),
                description: "Searches the web".into(),
                enabled: true,
                config: Map::new(),
                group_id: None,
            },
            ToolDefinition {
                id: "warehouse_tool".into(),
                title: "Team A Warehouse".into(),
                description: "Queries team-a's warehouse".into(),
                enabled: true,
                config: Map::new(),
                group_id: Some("team-a".into()),
            },
        ]);
        let deps = Collaborators::new(
            Arc::new(tools),
            Arc::new(RegistryToolFactory),
            Arc::new(EnvPlatformDetector::with_lookup(
                &PlatformSettings::default(),
                fixed_env(Vec::<(&str, &str)>::new()),
            )),
            Arc::new(ModelCatalog::new(keys.clone())),
            keys,
        );

        let (queue, receiver) = LogQueue::bounded(64);
        let sink = Arc::new(MemoryLogSink::new());
        let writer = LogWriter::spawn(receiver, sink.clone(), 8);
        Self {
            service: CrewExecutionService::new(Arc::new(PlanEngine::new()), deps, queue),
            writer,
            sink,
        }
    }

    /// Drop the service (closing the queue) and wait for the writer.
    async fn drain(self) -> Arc<MemoryLogSink> {
        drop(self.service);
        self.writer.finish().await.unwrap();
        self.sink
    }
}

fn crew_config(output_dir: Option<&Path>) -> CrewConfiguration {
    let mut value = json!({
        "agents": [
            {"name": "researcher", "role": "Researcher", "tools": ["search_tool"]},
            {"name": "writer", "role": "Writer"}
        ],
        "tasks": [
            {"id": "research_task", "description": "Research {topic}", "agent": "researcher"},
            {"id": "write_task", "description": "Write about {topic}", "agent": "writer",
             "context": "research_task"}
        ],
        "inputs": {"topic": "AI agents"}
    });
    if let Some(dir) = output_dir {
        value["output_dir"] = json!(dir);
    }
    serde_json::from_value(value).unwrap()
}

fn request(config: CrewConfiguration, group: &str, role: GroupRole) -> ExecutionRequest {
    ExecutionRequest {
        crew_name: "blog".into(),
        config,
        group: GroupContext::new(group, role).with_email(format!("someone@{group}.example")),
    }
}

fn contents(entries: &[crewdeck_history::ExecutionLog]) -> Vec<&str> {
    entries.iter().map(|e| e.content.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_successful_run_stores_output_and_logs() {
    let out = tempfile::tempdir().unwrap();
    let harness = Harness::new();

    let record = harness
        .service
        .run(request(crew_config(Some(out.path())), "team-a", GroupRole::User))
        .await
        .unwrap();

    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(record.group_id, "team-a");
    assert!(record.finished_at >= record.started_at);
    assert_eq!(
        record.output.result(),
        Some(&json!(
            "1. [research_task] Researcher (tools: Web Search): Research AI agents\n\
             2. [write_task] Writer: Write about AI agents (context: research_task)"
        ))
    );

    let path = record.output_path.clone().unwrap();
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("blog_write_task_"));
    let stored: Value =
        serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
    assert_eq!(stored["task_key"], "write_task");
    assert_eq!(stored["data"]["type"], "crew_result");
    assert_eq!(stored["metadata"]["execution_id"], record.execution_id.as_str());
    assert_eq!(stored["metadata"]["group_id"], "team-a");

    let sink = harness.drain().await;
    let logs = sink.for_execution(&record.execution_id, Some("team-a"));
    assert_eq!(
        contents(&logs),
        vec![
            "Starting execution of crew blog",
            "Prepared 2 agents and 2 tasks",
            "Execution completed",
        ]
    );
    assert!(logs
        .iter()
        .all(|l| l.group_email.as_deref() == Some("someone@team-a.example")));
}

#[tokio::test]
async fn test_task_key_with_path_separator_is_stored() {
    let out = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    let mut config = crew_config(Some(out.path()));
    config.tasks[1].id = Some("reports/final".into());

    let record = harness
        .service
        .run(request(config, "team-a", GroupRole::User))
        .await
        .unwrap();
    assert_eq!(record.status, ExecutionStatus::Completed);

    let path = record.output_path.clone().unwrap();
    assert_eq!(path.parent().unwrap(), out.path());
    assert!(path
        .file_name()
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("blog_reports_final_"));
    let stored: Value =
        serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
    assert_eq!(stored["task_key"], "reports/final");

    let sink = harness.drain().await;
    let logs = sink.for_execution(&record.execution_id, Some("team-a"));
    assert!(!contents(&logs)
        .iter()
        .any(|l| l.starts_with("Failed to store output")));
}

#[tokio::test]
async fn test_logs_are_isolated_per_group() {
    let harness = Harness::new();
    let a = harness
        .service
        .run(request(crew_config(None), "team-a", GroupRole::User))
        .await
        .unwrap();
    let b = harness
        .service
        .run(request(crew_config(None), "team-b", GroupRole::Manager))
        .await
        .unwrap();
    assert_ne!(a.execution_id, b.execution_id);
    assert!(a.output_path.is_none());

    let sink = harness.drain().await;
    assert!(sink.for_execution(&a.execution_id, Some("team-b")).is_empty());
    assert!(sink.for_execution(&b.execution_id, Some("team-a")).is_empty());
    assert_eq!(sink.for_execution(&b.execution_id, Some("team-b")).len(), 3);
    // Unscoped readers see everything.
    assert_eq!(sink.for_execution(&a.execution_id, None).len(), 3);
}

#[tokio::test]
async fn test_group_private_tools_stay_in_their_group() {
    let harness = Harness::new();
    let mut config = crew_config(None);
    config.agents[0].tools = vec!["search_tool".into(), "warehouse_tool".into()];
    config.tasks.truncate(1);

    let own = harness
        .service
        .run(request(config.clone(), "team-a", GroupRole::User))
        .await
        .unwrap();
    assert_eq!(
        own.output.result(),
        Some(&json!(
            "1. [research_task] Researcher (tools: Web Search, Team A Warehouse): Research AI agents"
        ))
    );

    let other = harness
        .service
        .run(request(config.clone(), "team-b", GroupRole::User))
        .await
        .unwrap();
    assert_eq!(
        other.output.result(),
        Some(&json!("1. [research_task] Researcher (tools: Web Search): Research AI agents"))
    );

    // Referencing the private tool by title does not leak it either.
    config.agents[0].tools = vec!["Team A Warehouse".into()];
    let by_title = harness
        .service
        .run(request(config, "team-b", GroupRole::User))
        .await
        .unwrap();
    assert_eq!(
        by_title.output.result(),
        Some(&json!("1. [research_task] Researcher: Research AI agents"))
    );
    harness.drain().await;
}

#[tokio::test]
async fn test_viewer_cannot_run_crews() {
    let harness = Harness::new();
    let err = harness
        .service
        .run(request(crew_config(None), "team-a", GroupRole::Viewer))
        .await
        .unwrap_err();
    assert!(matches!(err, CrewError::Permission(_)));

    let sink = harness.drain().await;
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_failed_preparation_is_recorded() {
    let out = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    let mut config = crew_config(Some(out.path()));
    config.tasks.clear();

    let record = harness
        .service
        .run(request(config, "team-a", GroupRole::Admin))
        .await
        .unwrap();
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert_eq!(record.output.error_message(), Some("Crew preparation failed"));
    assert!(record.output_path.is_none());
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);

    let sink = harness.drain().await;
    let logs = sink.for_execution(&record.execution_id, Some("team-a"));
    assert_eq!(
        contents(&logs).last().copied(),
        Some("Execution failed: Crew preparation failed")
    );
}

#[tokio::test]
async fn test_hierarchical_crew_without_manager_fails() {
    let harness = Harness::new();
    let mut config = crew_config(None);
    config.crew.process = ProcessType::Hierarchical;

    let record = harness
        .service
        .run(request(config, "team-a", GroupRole::User))
        .await
        .unwrap();
    assert_eq!(record.status, ExecutionStatus::Failed);
    harness.drain().await;
}

#[tokio::test]
async fn test_warnings_reach_record_and_logs() {
    let harness = Harness::new();
    let mut config = crew_config(None);
    config.tasks[0].agent = Some("editor".into());

    let record = harness
        .service
        .run(request(config, "team-a", GroupRole::User))
        .await
        .unwrap();
    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(record.warnings.len(), 1);

    let sink = harness.drain().await;
    let logs = sink.for_execution(&record.execution_id, Some("team-a"));
    assert!(contents(&logs)
        .contains(&"Warning: Agent editor not found for task research_task, using researcher"));
}

// ---------------------------------------------------------------------------
// Scheduled runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_schedule_loads_crew_file_and_merges_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let crew_path = dir.path().join("report.toml");
    tokio::fs::write(
        &crew_path,
        r#"
[[agents]]
name = "analyst"
role = "Analyst"

[[tasks]]
id = "summary"
description = "Summarize {period} for {team}"

[inputs]
period = "last week"
team = "nobody"
"#,
    )
    .await
    .unwrap();

    let mut inputs = Map::new();
    inputs.insert("team".into(), json!("platform"));
    let schedule = CrewSchedule {
        name: "weekly-report".into(),
        cron_expression: "0 9 * * 1".into(),
        crew: crew_path,
        inputs,
        enabled: true,
        group_id: "team-a".into(),
        created_by_email: None,
        role: GroupRole::User,
    };

    let harness = Harness::new();
    let record = run_schedule(&harness.service, &schedule).await.unwrap();
    assert_eq!(record.crew_name, "weekly-report");
    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(
        record.output.result(),
        Some(&json!("1. [summary] Analyst: Summarize last week for platform"))
    );
    harness.drain().await;
}

#[tokio::test]
async fn test_run_schedule_missing_crew_file() {
    let harness = Harness::new();
    let schedule = CrewSchedule {
        name: "broken".into(),
        cron_expression: "0 9 * * *".into(),
        crew: "/nonexistent/crew.json".into(),
        inputs: Map::new(),
        enabled: true,
        group_id: "team-a".into(),
        created_by_email: None,
        role: GroupRole::User,
    };
    assert!(matches!(
        run_schedule(&harness.service, &schedule).await,
        Err(CrewError::Io(_))
    ));
    harness.drain().await;
}
