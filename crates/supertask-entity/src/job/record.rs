//! Persisted job record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lane::ExecutorLane;
use crate::task::Task;

/// Serializable trigger arguments, enough to rebuild the trigger after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerState {
    /// Raw trigger expressions. The job fires at the earliest of them.
    pub expressions: Vec<String>,
    /// IANA timezone the expressions are evaluated in.
    pub timezone: String,
}

/// Outcome of the last firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The state a job store keeps per job. This is what survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub name: String,
    pub trigger: TriggerState,
    /// Next scheduled fire time. `None` when the trigger is exhausted.
    pub next_run_time: Option<DateTime<Utc>>,
    /// The task definition passed to the step runner at fire time.
    pub task: Task,
    pub max_instances: usize,
    pub coalesce: bool,
    #[serde(default)]
    pub misfire_grace_seconds: Option<u64>,
    #[serde(default)]
    pub executor: ExecutorLane,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_status: Option<RunStatus>,
}

impl JobRecord {
    /// Whether `other` has the same trigger, task and policy as this record.
    /// Runtime bookkeeping fields are ignored.
    pub fn same_definition(&self, other: &JobRecord) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.trigger == other.trigger
            && self.task == other.task
            && self.max_instances == other.max_instances
            && self.coalesce == other.coalesce
            && self.misfire_grace_seconds == other.misfire_grace_seconds
            && self.executor == other.executor
    }
}
