//! `supertask jobs`: inspect or purge the job store of a namespace.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use supertask_core::config::AppConfig;
use supertask_core::error::AppError;
use supertask_entity::{JobStoreLocation, JobSummary, namespace};
use supertask_store::{JobStore, JobStoreManager};

use crate::output::{self, OutputFormat, cell};

/// Arguments for job store commands
#[derive(Debug, Args)]
pub struct JobsArgs {
    /// Timetable whose namespace selects the table
    #[arg(long, env = "ST_TASKFILE", global = true)]
    pub taskfile: Option<String>,

    /// Namespace to use instead of deriving one from the timetable
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Job store subcommand
    #[command(subcommand)]
    pub command: JobsCommand,
}

/// Job store subcommands
#[derive(Debug, Subcommand)]
pub enum JobsCommand {
    /// List persisted jobs
    List,
    /// Delete every persisted job
    Purge,
}

/// Job display row
#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    id: String,
    name: String,
    trigger: String,
    exec_ref: String,
    next_run_time: String,
    last_run: String,
    last_status: String,
}

impl From<JobSummary> for JobRow {
    fn from(job: JobSummary) -> Self {
        Self {
            id: job.id,
            name: job.name,
            trigger: job.trigger_cron,
            exec_ref: cell(job.exec_ref),
            next_run_time: cell(job.next_run_time),
            last_run: cell(job.last_run),
            last_status: cell(job.last_status),
        }
    }
}

/// Execute job store commands
pub async fn execute(args: &JobsArgs, config: AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let ns = match (&args.namespace, super::taskfile(args.taskfile.as_ref(), &config)) {
        (Some(ns), _) => ns.clone(),
        (None, Some(taskfile)) => supertask_loader::load(&taskfile).await?.namespace(),
        (None, None) => namespace::for_source(None),
    };

    let location = JobStoreLocation::new(config.store.address.clone())
        .with_options(Some(&config.store.schema), Some(&config.store.table))
        .with_namespace(ns);
    let table = location.effective_table();
    let store = JobStoreManager::connect(location, &config.store).await?;

    match &args.command {
        JobsCommand::List => match format {
            OutputFormat::Json => {
                let jobs: Vec<JobSummary> = store.list().await?.iter().map(JobSummary::from).collect();
                output::print_item(&jobs, format);
            }
            OutputFormat::Table => {
                let rows: Vec<JobRow> = store
                    .list()
                    .await?
                    .iter()
                    .map(|record| JobRow::from(JobSummary::from(record)))
                    .collect();
                output::print_list(&rows, format);
                output::print_kv("table", &table);
            }
        },
        JobsCommand::Purge => {
            let count = store.list().await?.len();
            store.remove_all().await?;
            output::print_success(&format!("Deleted {count} job(s) from {table}"));
        }
    }
    Ok(())
}
