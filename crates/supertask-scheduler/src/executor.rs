//! Executor lanes: bounded in-process and child-process execution.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use supertask_core::config::scheduler::SchedulerConfig;
use supertask_core::error::AppError;
use supertask_core::result::AppResult;
use supertask_entity::{ExecutorLane, Task};

use crate::error::ExecutionError;
use crate::runner::{RunSummary, StepRunner};

/// Hidden subcommand the process lane invokes.
pub const RUN_TASK_SUBCOMMAND: &str = "run-task";

/// Starts a child process that reads a task as JSON on stdin and runs it.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The configured program (split on whitespace), or the running
    /// executable with the `run-task` subcommand.
    pub fn from_config(program: Option<&str>) -> AppResult<Self> {
        match program.map(str::split_whitespace) {
            Some(mut parts) => {
                let program = parts
                    .next()
                    .ok_or_else(|| AppError::configuration("scheduler.process_program is empty"))?;
                Ok(Self::new(program, parts.map(str::to_string).collect()))
            }
            None => {
                let exe = std::env::current_exe().map_err(|e| {
                    AppError::configuration(format!("Cannot locate current executable: {e}"))
                })?;
                Ok(Self::new(exe, vec![RUN_TASK_SUBCOMMAND.to_string()]))
            }
        }
    }

    /// Run `task` in a child process and wait for it.
    pub async fn run(&self, task: &Task) -> Result<(), ExecutionError> {
        let payload = serde_json::to_vec(task).map_err(AppError::from)?;
        let program = self.program.to_string_lossy().to_string();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                program: program.clone(),
                source,
            })?;
        debug!(task_id = %task.id(), pid = ?child.id(), "Spawned task process");

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&payload).await {
                warn!(task_id = %task.id(), error = %e, "Failed to write task to child stdin");
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ExecutionError::ProcessFailed(format!("{program}: {e}")))?;
        if status.success() {
            Ok(())
        } else {
            Err(ExecutionError::ProcessFailed(format!("{program}: {status}")))
        }
    }
}

/// Bounded thread and process lanes sharing one step runner.
#[derive(Debug)]
pub struct ExecutorPool {
    runner: Arc<StepRunner>,
    launcher: ProcessLauncher,
    thread_lane: Arc<Semaphore>,
    process_lane: Arc<Semaphore>,
}

impl ExecutorPool {
    pub fn new(
        runner: Arc<StepRunner>,
        launcher: ProcessLauncher,
        thread_pool_size: usize,
        process_pool_size: usize,
    ) -> Self {
        Self {
            runner,
            launcher,
            thread_lane: Arc::new(Semaphore::new(thread_pool_size.max(1))),
            process_lane: Arc::new(Semaphore::new(process_pool_size.max(1))),
        }
    }

    pub fn from_config(runner: Arc<StepRunner>, config: &SchedulerConfig) -> AppResult<Self> {
        let launcher = ProcessLauncher::from_config(config.process_program.as_deref())?;
        Ok(Self::new(
            runner,
            launcher,
            config.thread_pool_size,
            config.process_pool_size,
        ))
    }

    pub fn runner(&self) -> &Arc<StepRunner> {
        &self.runner
    }

    /// Free slots per lane.
    pub fn available(&self, lane: ExecutorLane) -> usize {
        match lane {
            ExecutorLane::Thread => self.thread_lane.available_permits(),
            ExecutorLane::Process => self.process_lane.available_permits(),
        }
    }

    /// Run `task` on `lane`, waiting for a free slot first.
    pub async fn execute(
        &self,
        lane: ExecutorLane,
        task: &Task,
    ) -> Result<Option<RunSummary>, ExecutionError> {
        let semaphore = match lane {
            ExecutorLane::Thread => &self.thread_lane,
            ExecutorLane::Process => &self.process_lane,
        };
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|_| AppError::service_unavailable("Executor lane closed"))?;

        match lane {
            ExecutorLane::Thread => self.runner.run(task).await.map(Some),
            ExecutorLane::Process => self.launcher.run(task).await.map(|()| None),
        }
    }
}
