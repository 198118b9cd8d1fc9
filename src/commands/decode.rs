//! `supertask decode`: show how a trigger expression is read.

use chrono::Utc;
use clap::Args;
use serde::Serialize;

use supertask_core::config::AppConfig;
use supertask_core::error::AppError;
use supertask_entity::cron;
use supertask_scheduler::CronTrigger;

use crate::output::{self, OutputFormat};

/// Arguments for the decode command
#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Trigger expression with 5, 6 or 7 fields
    pub expression: String,

    /// Number of upcoming fire times to show
    #[arg(short, long, default_value_t = 3)]
    pub next: usize,
}

#[derive(Debug, Serialize)]
struct Decoded {
    #[serde(flatten)]
    fields: cron::CronFields,
    schedule: String,
    timezone: String,
    upcoming: Vec<String>,
}

/// Execute the decode command
pub fn execute(args: &DecodeArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let fields = cron::decode(&args.expression)?;
    let trigger = CronTrigger::new(
        std::slice::from_ref(&args.expression),
        &config.scheduler.timezone,
    )?;

    let mut upcoming = Vec::with_capacity(args.next);
    let mut after = Utc::now();
    while upcoming.len() < args.next {
        let Some(next) = trigger.next_after(after) else {
            break;
        };
        upcoming.push(next.with_timezone(&trigger.timezone()).to_rfc3339());
        after = next;
    }

    let decoded = Decoded {
        schedule: fields.to_schedule_expression(),
        fields,
        timezone: config.scheduler.timezone.clone(),
        upcoming,
    };
    output::print_item(&decoded, format);
    if decoded.upcoming.is_empty() {
        output::print_warning("Expression never fires again");
    }
    Ok(())
}
