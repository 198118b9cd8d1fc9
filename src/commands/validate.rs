//! `supertask validate`: load a timetable and print its tasks.

use chrono::Utc;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use supertask_core::config::AppConfig;
use supertask_core::error::AppError;
use supertask_scheduler::CronTrigger;

use crate::output::{self, OutputFormat, cell};

/// Arguments for the validate command
#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Timetable path or URL
    #[arg(env = "ST_TASKFILE")]
    pub taskfile: Option<String>,
}

/// Task display row
#[derive(Debug, Serialize, Tabled)]
struct TaskRow {
    id: String,
    name: String,
    enabled: bool,
    executor: String,
    schedule: String,
    steps: usize,
    next_run_time: String,
}

/// Execute the validate command
pub async fn execute(
    args: &ValidateArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let taskfile = super::taskfile(args.taskfile.as_ref(), config)
        .ok_or_else(|| AppError::configuration("No timetable given"))?;
    let timetable = supertask_loader::load(&taskfile).await?;

    let now = Utc::now();
    let mut rows = Vec::with_capacity(timetable.tasks.len());
    for task in &timetable.tasks {
        let trigger = CronTrigger::new(&task.cron_expressions(), &config.scheduler.timezone)?;
        rows.push(TaskRow {
            id: task.id().to_string(),
            name: task.meta.name.clone(),
            enabled: task.meta.enabled,
            executor: task.meta.executor.to_string(),
            schedule: task.cron_expressions().join(" | "),
            steps: task.steps.len(),
            next_run_time: cell(trigger.next_after(now)),
        });
    }

    output::print_list(&rows, format);
    if format == OutputFormat::Table {
        output::print_kv("namespace", &timetable.namespace());
        output::print_success(&format!("{} task(s) valid", rows.len()));
    }
    Ok(())
}
