//! CLI command definitions and dispatch.

pub mod decode;
pub mod jobs;
pub mod run;
pub mod run_task;
pub mod validate;

use clap::{Parser, Subcommand};

use supertask_core::config::AppConfig;
use supertask_core::error::AppError;

use crate::output::OutputFormat;

/// Supertask: declarative task scheduler
#[derive(Debug, Parser)]
#[command(name = "supertask", version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "ST_CONFIG", global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Job store address (memory://, postgresql://, crate://)
    #[arg(long, env = "ST_STORE_ADDRESS", global = true)]
    pub store_address: Option<String>,

    /// Job store schema name
    #[arg(long, env = "ST_STORE_SCHEMA_NAME", global = true)]
    pub store_schema_name: Option<String>,

    /// Job store table name
    #[arg(long, env = "ST_STORE_TABLE_NAME", global = true)]
    pub store_table_name: Option<String>,

    /// Delete all jobs from the store before registering
    #[arg(long, env = "ST_JOBS_DELETE", global = true)]
    pub pre_delete_jobs: bool,

    /// Serve the read-only HTTP facade on this address
    #[arg(long, env = "ST_HTTP_LISTEN_ADDRESS", global = true)]
    pub http_listen_address: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the scheduler for a timetable
    Run(run::RunArgs),
    /// Load a timetable and print its tasks
    Validate(validate::ValidateArgs),
    /// Inspect or purge the job store
    Jobs(jobs::JobsArgs),
    /// Decode a trigger expression
    Decode(decode::DecodeArgs),
    /// Run one task read as JSON from stdin
    #[command(hide = true)]
    RunTask,
}

impl Cli {
    /// Load configuration and apply command-line overrides.
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(address) = &self.store_address {
            config.store.address = address.clone();
        }
        if let Some(schema) = &self.store_schema_name {
            config.store.schema = schema.clone();
        }
        if let Some(table) = &self.store_table_name {
            config.store.table = table.clone();
        }
        if self.pre_delete_jobs {
            config.store.pre_delete = true;
        }
        if let Some(listen) = &self.http_listen_address {
            config.http.listen = Some(listen.clone());
        }
    }

    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Run(args) => run::execute(args, config).await,
            Commands::Validate(args) => validate::execute(args, &config, self.format).await,
            Commands::Jobs(args) => jobs::execute(args, config, self.format).await,
            Commands::Decode(args) => decode::execute(args, &config, self.format),
            Commands::RunTask => run_task::execute().await,
        }
    }
}

/// Timetable source from the command line, falling back to configuration.
pub fn taskfile(arg: Option<&String>, config: &AppConfig) -> Option<String> {
    arg.cloned().or_else(|| config.timetable.path.clone())
}
