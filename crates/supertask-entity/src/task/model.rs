//! Task entity model.

use serde::{Deserialize, Serialize};

use super::step::Step;
use crate::cron::{self, CronFields};
use crate::error::ModelError;
use crate::job::ExecutorLane;

/// Task identity and registration flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Unique task identifier within a namespace. Also the job id.
    pub id: String,
    /// Display name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Disabled tasks are loaded but never registered.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Execution lane the task's firings run on.
    #[serde(default)]
    pub executor: ExecutorLane,
}

impl TaskMetadata {
    /// Enabled, thread-lane metadata with an empty description.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            enabled: true,
            executor: ExecutorLane::Thread,
        }
    }
}

/// A single trigger expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub cron: String,
}

impl ScheduleItem {
    pub fn new(cron: impl Into<String>) -> Self {
        Self { cron: cron.into() }
    }

    /// Decode the expression into its seven fields.
    pub fn crontab(&self) -> Result<CronFields, ModelError> {
        cron::decode(&self.cron)
    }
}

/// Trigger events of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub schedule: Vec<ScheduleItem>,
}

/// One schedulable unit: metadata, triggers and ordered steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub meta: TaskMetadata,
    pub on: Event,
    pub steps: Vec<Step>,
}

impl Task {
    /// Create a validated task.
    pub fn new(
        meta: TaskMetadata,
        schedule: Vec<ScheduleItem>,
        steps: Vec<Step>,
    ) -> Result<Self, ModelError> {
        let task = Self {
            meta,
            on: Event { schedule },
            steps,
        };
        task.validate()?;
        Ok(task)
    }

    /// The task's job id.
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Check structural invariants.
    ///
    /// Trigger expressions only get the loose shape check here. Field ranges
    /// are checked when the trigger is built.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.meta.id.trim().is_empty() {
            return Err(ModelError::validation("Task id must not be empty"));
        }
        if self.on.schedule.is_empty() {
            return Err(ModelError::validation(format!(
                "Task '{}' has no schedule",
                self.meta.id
            )));
        }
        if self.steps.is_empty() {
            return Err(ModelError::validation(format!(
                "Task '{}' has no steps",
                self.meta.id
            )));
        }
        for item in &self.on.schedule {
            if !cron::is_crontab_shape(&item.cron) {
                return Err(ModelError::validation(format!(
                    "Task '{}' has invalid crontab syntax: {}",
                    self.meta.id, item.cron
                )));
            }
        }
        if let Some(index) = self.steps.iter().position(|s| s.name.trim().is_empty()) {
            return Err(ModelError::validation(format!(
                "Task '{}' step #{index} has an empty name",
                self.meta.id
            )));
        }
        Ok(())
    }

    /// Trigger expressions in declaration order.
    pub fn cron_expressions(&self) -> Vec<String> {
        self.on.schedule.iter().map(|item| item.cron.clone()).collect()
    }
}

fn default_true() -> bool {
    true
}
