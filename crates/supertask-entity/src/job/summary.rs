//! Runtime-exposed job shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{JobRecord, RunStatus};
use crate::task::Scalar;

/// Keyword argument a step uses to carry an SQL statement.
pub const SQL_KWARG: &str = "sql";

/// Job view served to the HTTP facade and printed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub name: String,
    /// Trigger expressions joined with `" | "`.
    pub trigger_cron: String,
    /// `run` reference of the first step.
    #[serde(rename = "exec_python_ref")]
    pub exec_ref: Option<String>,
    /// Positional arguments of the first step.
    pub exec_args: Option<Vec<Scalar>>,
    /// The `sql` keyword argument of the first step that has one.
    pub exec_sql: Option<String>,
    pub enabled: bool,
    pub next_run_time: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_status: Option<RunStatus>,
}

impl From<&JobRecord> for JobSummary {
    fn from(record: &JobRecord) -> Self {
        let first = record.task.steps.first();
        let exec_sql = record
            .task
            .steps
            .iter()
            .find_map(|step| match step.kwargs.get(SQL_KWARG) {
                Some(Scalar::String(sql)) => Some(sql.clone()),
                _ => None,
            });
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            trigger_cron: record.trigger.expressions.join(" | "),
            exec_ref: first.map(|step| step.run.clone()),
            exec_args: first
                .filter(|step| !step.args.is_empty())
                .map(|step| step.args.clone()),
            exec_sql,
            enabled: record.task.meta.enabled,
            next_run_time: record.next_run_time,
            last_run: record.last_run,
            last_status: record.last_status,
        }
    }
}
