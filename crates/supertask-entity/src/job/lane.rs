//! Execution lanes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Where a job's firings are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorLane {
    /// In-process tokio task, for short I/O-bound steps.
    #[default]
    Thread,
    /// Child process, for CPU-bound or isolation-sensitive steps.
    Process,
}

impl fmt::Display for ExecutorLane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thread => write!(f, "thread"),
            Self::Process => write!(f, "process"),
        }
    }
}

impl FromStr for ExecutorLane {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "thread" | "threadpool" => Ok(Self::Thread),
            "process" | "processpool" => Ok(Self::Process),
            other => Err(ModelError::validation(format!("Unknown executor '{other}'"))),
        }
    }
}
