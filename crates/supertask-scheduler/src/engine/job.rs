//! Per-job state held by the scheduler.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use supertask_core::config::scheduler::SchedulerConfig;
use supertask_entity::{JobRecord, Task};

use crate::trigger::CronTrigger;

/// Lifecycle state of a job.
///
/// `Pending → Scheduled → (Firing → Scheduled)* → Removed`. A removed job is
/// gone; registering the same id again creates a new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Registered before the scheduler started.
    Pending,
    /// Waiting for its next fire time.
    Scheduled,
    /// At least one firing is executing.
    Firing,
    /// Removed. Terminal.
    Removed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Firing => write!(f, "firing"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// Concurrency and registration policy for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    /// Upper bound on concurrent firings of this job.
    pub max_instances: usize,
    /// Fire once for a run of missed slots instead of once per slot.
    pub coalesce: bool,
    /// Missed slots older than this are dropped. Unlimited when `None`.
    pub misfire_grace_seconds: Option<u64>,
    /// Replace a job with the same id instead of failing.
    pub replace_existing: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            max_instances: 1,
            coalesce: false,
            misfire_grace_seconds: None,
            replace_existing: false,
        }
    }
}

impl JobOptions {
    /// Defaults for ad-hoc jobs.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            max_instances: config.max_instances.max(1),
            coalesce: config.coalesce,
            misfire_grace_seconds: config.misfire_grace_seconds,
            replace_existing: false,
        }
    }

    /// Options for jobs registered from a timetable. Step execution may be
    /// slow, so more concurrent instances are allowed.
    pub fn reconciled(config: &SchedulerConfig) -> Self {
        Self {
            max_instances: config.reconciled_max_instances.max(1),
            replace_existing: true,
            ..Self::from_config(config)
        }
    }

    pub fn replace_existing(mut self, replace: bool) -> Self {
        self.replace_existing = replace;
        self
    }
}

/// What `add_job` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Registration {
    /// A new job was created.
    Added,
    /// An existing job got a new definition.
    Replaced,
    /// An existing job already had this definition. Nothing was written.
    Unchanged,
}

/// Shared across replacements of one job, dropped on removal.
#[derive(Debug, Default)]
pub(crate) struct Lineage {
    /// Firings currently executing.
    pub running: AtomicUsize,
    /// Set once when the job is removed.
    pub removed: AtomicBool,
}

impl Lineage {
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }
}

/// A registered job: its record, its compiled trigger and its lineage.
#[derive(Debug)]
pub(crate) struct JobEntry {
    pub record: Mutex<JobRecord>,
    pub trigger: CronTrigger,
    pub lineage: Arc<Lineage>,
}

impl JobEntry {
    pub fn new(record: JobRecord, trigger: CronTrigger, lineage: Arc<Lineage>) -> Self {
        Self {
            record: Mutex::new(record),
            trigger,
            lineage,
        }
    }

    /// Snapshot of the record.
    pub fn record(&self) -> JobRecord {
        match self.record.lock() {
            Ok(record) => record.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Mutate the record in place and return the updated snapshot.
    pub fn update<F>(&self, f: F) -> JobRecord
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut guard = match self.record.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
        guard.clone()
    }
}

/// Build the record for a new registration.
pub(crate) fn build_record(
    task: &Task,
    trigger: &CronTrigger,
    options: &JobOptions,
    now: DateTime<Utc>,
) -> JobRecord {
    JobRecord {
        id: task.id().to_string(),
        name: task.meta.name.clone(),
        trigger: trigger.state(),
        next_run_time: trigger.next_after(now),
        task: task.clone(),
        max_instances: options.max_instances.max(1),
        coalesce: options.coalesce,
        misfire_grace_seconds: options.misfire_grace_seconds,
        executor: task.meta.executor,
        last_run: None,
        last_status: None,
    }
}
