//! Scheduler core configuration.

use serde::{Deserialize, Serialize};

/// Trigger engine, job defaults and executor lane settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// IANA timezone cron expressions are evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Concurrent firings allowed on the thread lane.
    #[serde(default = "default_thread_pool_size")]
    pub thread_pool_size: usize,
    /// Concurrent child processes allowed on the process lane.
    #[serde(default = "default_process_pool_size")]
    pub process_pool_size: usize,
    /// Default `max_instances` for ad-hoc jobs.
    #[serde(default = "default_max_instances")]
    pub max_instances: usize,
    /// `max_instances` for jobs registered from a timetable.
    #[serde(default = "default_reconciled_max_instances")]
    pub reconciled_max_instances: usize,
    /// Collapse missed fire times into a single firing.
    #[serde(default)]
    pub coalesce: bool,
    /// Drop missed fire times older than this many seconds. Unlimited when unset.
    #[serde(default)]
    pub misfire_grace_seconds: Option<u64>,
    /// Program spawned for process-lane firings. Defaults to the running executable.
    #[serde(default)]
    pub process_program: Option<String>,
    /// Upper bound on waiting for in-flight firings at shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            thread_pool_size: default_thread_pool_size(),
            process_pool_size: default_process_pool_size(),
            max_instances: default_max_instances(),
            reconciled_max_instances: default_reconciled_max_instances(),
            coalesce: false,
            misfire_grace_seconds: None,
            process_program: None,
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_thread_pool_size() -> usize {
    20
}

fn default_process_pool_size() -> usize {
    5
}

fn default_max_instances() -> usize {
    1
}

fn default_reconciled_max_instances() -> usize {
    10
}

fn default_shutdown_timeout() -> u64 {
    30
}
