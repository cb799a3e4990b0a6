mod config;

use chrono::Utc;
use clap::{Parser, Subcommand};
use config::CrewdeckConfig;
use crewdeck_core::{GroupContext, GroupRole};
use crewdeck_crew::{
    check_crew_config, Collaborators, CrewConfiguration, CrewExecutionService, CrewPreparation,
    ExecutionRequest, PlanEngine, PreparationOptions, RegistryToolFactory, Scheduler,
    ToolRegistry,
};
use crewdeck_history::{JsonlLogSink, LogQueue, LogWriter};
use crewdeck_llm::{
    EnvApiKeyProvider, EnvPlatformDetector, FallbackApiKeyProvider, ModelCatalog,
    StaticApiKeyProvider,
};
use crewdeck_security::{authorize, Permission};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crewdeck", about = "crewdeck: prepare, run and schedule agent crews")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "crewdeck.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Caller {
    /// Group the command runs for
    #[arg(long, default_value = "default")]
    group: String,
    /// Email of the acting user
    #[arg(long)]
    email: Option<String>,
    /// Role of the acting user inside the group
    #[arg(long, default_value = "user")]
    role: GroupRole,
}

impl Caller {
    fn context(&self) -> GroupContext {
        let ctx = GroupContext::new(self.group.clone(), self.role);
        match &self.email {
            Some(email) => ctx.with_email(email.clone()),
            None => ctx,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check a crew file and show how it would be prepared
    Validate {
        /// Crew configuration (.json or .toml)
        crew: PathBuf,
    },
    /// Run a crew once and print the execution record
    Run {
        /// Crew configuration (.json or .toml)
        crew: PathBuf,
        #[command(flatten)]
        caller: Caller,
    },
    /// Show the logs of one execution
    Logs {
        execution_id: String,
        #[command(flatten)]
        caller: Caller,
    },
    /// Run the configured schedules until interrupted
    Schedule {
        /// List schedules and their next fire time instead of running them
        #[arg(long)]
        list: bool,
    },
}

fn collaborators(config: &CrewdeckConfig, tools: ToolRegistry) -> Collaborators {
    let keys = Arc::new(FallbackApiKeyProvider::new(
        Arc::new(StaticApiKeyProvider::new(config.api_keys.clone())),
        Arc::new(EnvApiKeyProvider::new()),
    ));
    let catalog = ModelCatalog::new(keys.clone()).with_models(config.models.clone());

    Collaborators::new(
        Arc::new(tools),
        Arc::new(RegistryToolFactory),
        Arc::new(EnvPlatformDetector::new(&config.platform)),
        Arc::new(catalog),
        keys,
    )
}

/// Execution service backed by the JSON-lines history in `data_dir`.
async fn execution_service(
    config: &CrewdeckConfig,
    tools: ToolRegistry,
) -> anyhow::Result<(CrewExecutionService<PlanEngine>, LogWriter)> {
    let sink = Arc::new(JsonlLogSink::new(&config.history_dir()).await?);
    let (queue, receiver) = LogQueue::bounded(config.history.queue_capacity);
    let writer = LogWriter::spawn(receiver, sink, config.history.batch_size);

    let service = CrewExecutionService::new(
        Arc::new(PlanEngine::new()),
        collaborators(config, tools),
        queue,
    )
    .with_options(PreparationOptions::from(&config.platform));
    Ok((service, writer))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = CrewdeckConfig::load(&cli.config).await?;

    match cli.command {
        Commands::Validate { crew } => {
            let crew_config = CrewConfiguration::load(&crew).await?;
            check_crew_config(&crew_config)?;

            let tools = ToolRegistry::with_tools(config.tools.clone());
            let mut preparation = CrewPreparation::new(
                Arc::new(crew_config),
                Arc::new(PlanEngine::new()),
                collaborators(&config, tools),
            )
            .with_options(PreparationOptions::from(&config.platform));

            if !preparation.prepare().await {
                anyhow::bail!("Crew '{}' could not be prepared", crew.display());
            }

            println!("Crew '{}' is valid.", crew.display());
            println!("  Agents: {}", preparation.agents().keys().collect::<Vec<_>>().join(", "));
            for task in preparation.tasks() {
                let mode = if task.async_execution { "async" } else { "sync" };
                if task.context.is_empty() {
                    println!("  Task {} -> {} ({mode})", task.key, task.agent_key);
                } else {
                    println!(
                        "  Task {} -> {} ({mode}, context: {})",
                        task.key,
                        task.agent_key,
                        task.context.join(", ")
                    );
                }
            }
            if let Some(crew) = preparation.crew() {
                println!("  Process: {}", crew.process);
                if let Some(model) = &crew.model {
                    println!("  Model: {model}");
                }
            }
            for warning in preparation.warnings() {
                println!("  Warning: {warning}");
            }
        }
        Commands::Run { crew, caller } => {
            let ctx = caller.context();
            let crew_config = CrewConfiguration::load(&crew).await?;
            let crew_name = crew
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("crew")
                .to_string();

            // The service narrows tools to the caller's group.
            let tools = ToolRegistry::with_tools(config.tools.clone());
            let (service, writer) = execution_service(&config, tools).await?;

            let result = service
                .run(ExecutionRequest {
                    crew_name,
                    config: crew_config,
                    group: ctx,
                })
                .await;

            // Closing the queue lets the writer drain.
            drop(service);
            let written = writer.finish().await?;
            info!(written, "Execution logs flushed");

            let record = result?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Logs {
            execution_id,
            caller,
        } => {
            let ctx = caller.context();
            authorize(&ctx, Permission::ViewExecutions)?;

            let sink = JsonlLogSink::new(&config.history_dir()).await?;
            let entries = sink
                .for_execution(&execution_id, Some(&ctx.primary_group_id))
                .await?;
            if entries.is_empty() {
                println!("No logs for execution {execution_id} in group {}.", ctx.primary_group_id);
            }
            for entry in &entries {
                println!("{} {}", entry.timestamp.to_rfc3339(), entry.content);
            }
        }
        Commands::Schedule { list } => {
            let scheduler = Scheduler::new(config.schedules.clone());

            if list {
                if scheduler.schedule_count() == 0 {
                    println!("No schedules configured.");
                    println!("Configure schedules in crewdeck.toml under [[schedules]]");
                    return Ok(());
                }
                let now = Utc::now();
                println!("Schedules:");
                for schedule in &config.schedules {
                    let next = if !schedule.enabled {
                        "disabled".to_string()
                    } else {
                        match Scheduler::next_fire_time(&schedule.cron_expression, now) {
                            Ok(at) => at.to_rfc3339(),
                            Err(e) => format!("invalid ({e})"),
                        }
                    };
                    println!(
                        "  {} [{}] {} (group {}): next {next}",
                        schedule.name,
                        schedule.cron_expression,
                        schedule.crew.display(),
                        schedule.group_id
                    );
                }
                println!("\nTotal: {} schedule(s)", scheduler.schedule_count());
                return Ok(());
            }

            let tools = ToolRegistry::with_tools(config.tools.clone());
            let (service, writer) = execution_service(&config, tools).await?;
            info!(
                schedules = scheduler.enabled_schedules().len(),
                "Starting scheduler"
            );
            let handle = scheduler.start(Arc::new(service));

            tokio::signal::ctrl_c().await?;
            info!("Shutting down scheduler");
            handle.abort();
            // The aborted loop drops its service, which closes the queue.
            let _ = handle.await;
            let written = writer.finish().await?;
            info!(written, "Execution logs flushed");
        }
    }

    Ok(())
}
