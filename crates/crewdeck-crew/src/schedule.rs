use crate::config::CrewConfiguration;
use crate::engine::CrewEngine;
use crate::service::{CrewExecutionService, ExecutionRecord, ExecutionRequest};
use chrono::{DateTime, Utc};
use cron::Schedule;
use crewdeck_core::{CrewError, CrewResult, GroupContext, GroupRole};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// A crew that runs on a cron schedule (`[[schedules]]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewSchedule {
    /// Unique name, used in logs.
    pub name: String,
    /// Five-field cron, or six/seven fields with seconds.
    pub cron_expression: String,
    /// Crew configuration file (JSON or TOML).
    pub crew: PathBuf,
    /// Merged over the crew's own inputs.
    #[serde(default)]
    pub inputs: Map<String, Value>,
    /// Disabled schedules are listed but never run.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Group the run is recorded under.
    pub group_id: String,
    /// Recorded as the caller's email.
    #[serde(default)]
    pub created_by_email: Option<String>,
    /// Role the schedule runs with.
    #[serde(default = "default_role")]
    pub role: GroupRole,
}

fn default_enabled() -> bool {
    true
}

fn default_role() -> GroupRole {
    GroupRole::User
}

impl CrewSchedule {
    /// Caller identity used for scheduled runs.
    pub fn group_context(&self) -> GroupContext {
        let ctx = GroupContext::new(self.group_id.clone(), self.role);
        match &self.created_by_email {
            Some(email) => ctx.with_email(email.clone()),
            None => ctx,
        }
    }
}

/// Cron-based scheduler over a set of [`CrewSchedule`]s.
#[derive(Debug)]
pub struct Scheduler {
    schedules: Vec<CrewSchedule>,
}

impl Scheduler {
    /// Create a new scheduler with the given schedules.
    pub fn new(schedules: Vec<CrewSchedule>) -> Self {
        Self { schedules }
    }

    /// Parse a cron expression.
    ///
    /// Accepts the classic 5-field form (minute precision) as well as the
    /// 6/7-field form with seconds and optional year.
    pub fn parse_cron(cron_expr: &str) -> CrewResult<Schedule> {
        let fields = cron_expr.split_whitespace().count();
        let expr = if fields == 5 {
            format!("0 {cron_expr}")
        } else {
            cron_expr.to_string()
        };
        Schedule::from_str(&expr).map_err(|e| {
            CrewError::Configuration(format!("Invalid cron expression '{cron_expr}': {e}"))
        })
    }

    /// First fire time strictly after `after`.
    pub fn next_fire_time(cron_expr: &str, after: DateTime<Utc>) -> CrewResult<DateTime<Utc>> {
        let schedule = Self::parse_cron(cron_expr)?;
        schedule.after(&after).next().ok_or_else(|| {
            CrewError::Configuration(format!(
                "Cron expression '{cron_expr}' has no upcoming fire times"
            ))
        })
    }

    /// Schedules that will run.
    pub fn enabled_schedules(&self) -> Vec<&CrewSchedule> {
        self.schedules.iter().filter(|s| s.enabled).collect()
    }

    /// Number of schedules, enabled or not.
    pub fn schedule_count(&self) -> usize {
        self.schedules.len()
    }

    /// Enabled schedules with a fire time in `(from, to]`.
    pub fn due_jobs(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&CrewSchedule> {
        self.enabled_schedules()
            .into_iter()
            .filter(|s| match Self::next_fire_time(&s.cron_expression, from) {
                Ok(next) => next <= to,
                Err(e) => {
                    tracing::warn!(schedule = %s.name, error = %e, "Skipping schedule");
                    false
                }
            })
            .collect()
    }

    /// Earliest upcoming fire time after `after` across enabled schedules.
    pub fn next_wakeup(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.enabled_schedules()
            .iter()
            .filter_map(|s| Self::next_fire_time(&s.cron_expression, after).ok())
            .min()
    }

    /// Spawn the scheduler loop. Due schedules run one after another through
    /// `service`.
    pub fn start<E>(self, service: Arc<CrewExecutionService<E>>) -> tokio::task::JoinHandle<()>
    where
        E: CrewEngine + 'static,
    {
        tokio::spawn(async move {
            let mut last_tick = Utc::now();
            loop {
                let Some(next) = self.next_wakeup(last_tick) else {
                    tracing::info!("Scheduler: no runnable schedules, sleeping 60s");
                    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                    last_tick = Utc::now();
                    continue;
                };

                let now = Utc::now();
                if next > now {
                    let wait = (next - now).to_std().unwrap_or_default();
                    tracing::debug!("Scheduler: sleeping for {:?} until next schedule", wait);
                    tokio::time::sleep(wait).await;
                }

                let now = Utc::now();
                for schedule in self.due_jobs(last_tick, now) {
                    tracing::info!(schedule = %schedule.name, "Scheduler: firing schedule");
                    match run_schedule(&service, schedule).await {
                        Ok(record) => tracing::info!(
                            schedule = %schedule.name,
                            execution_id = %record.execution_id,
                            status = ?record.status,
                            "Scheduled run finished"
                        ),
                        Err(e) => tracing::warn!(
                            schedule = %schedule.name,
                            error = %e,
                            "Scheduled run could not start"
                        ),
                    }
                }
                last_tick = now;
            }
        })
    }
}

/// Load the schedule's crew file and run it once.
pub async fn run_schedule<E: CrewEngine>(
    service: &CrewExecutionService<E>,
    schedule: &CrewSchedule,
) -> CrewResult<ExecutionRecord> {
    let mut config = CrewConfiguration::load(&schedule.crew).await?;
    for (key, value) in &schedule.inputs {
        config.inputs.insert(key.clone(), value.clone());
    }

    service
        .run(ExecutionRequest {
            crew_name: schedule.name.clone(),
            config,
            group: schedule.group_context(),
        })
        .await
}
