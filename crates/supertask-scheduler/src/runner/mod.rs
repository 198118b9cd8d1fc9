//! Step runner: executes a task's steps in order.

pub mod handler;
pub mod registry;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use supertask_entity::Task;

use crate::error::ExecutionError;

pub use handler::{CommandHandler, EntrypointHandler, ScriptHandler, StepHandler};
pub use registry::{CallArgs, Callable, CallableRegistry};

/// Closed set of step kinds, selected by a step's `uses` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// Call a registered callable.
    Entrypoint,
    /// Spawn a program.
    Command,
    /// Run a script file.
    Script,
}

impl StepKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Entrypoint => "entrypoint",
            Self::Command => "command",
            Self::Script => "script",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for StepKind {
    type Err = ExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entrypoint" | "python-entrypoint" => Ok(Self::Entrypoint),
            "command" | "shell" => Ok(Self::Command),
            "script" | "python-file" => Ok(Self::Script),
            other => Err(ExecutionError::UnknownStepKind(other.to_string())),
        }
    }
}

/// Counts from one task invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: usize,
    pub skipped: usize,
}

/// Dispatches steps to the handler registered for their kind.
#[derive(Debug, Default)]
pub struct StepRunner {
    handlers: HashMap<StepKind, Arc<dyn StepHandler>>,
}

impl StepRunner {
    /// A runner without handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner with the entrypoint, command and script handlers.
    pub fn with_registry(registry: Arc<CallableRegistry>) -> Self {
        let mut runner = Self::new();
        runner.register(Arc::new(EntrypointHandler::new(registry)));
        runner.register(Arc::new(CommandHandler));
        runner.register(Arc::new(ScriptHandler));
        runner
    }

    /// Register a step handler
    pub fn register(&mut self, handler: Arc<dyn StepHandler>) {
        let kind = handler.kind();
        tracing::debug!(kind = %kind, "Registered step handler");
        self.handlers.insert(kind, handler);
    }

    pub fn has_handler(&self, kind: StepKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Execute every step of `task` in order.
    ///
    /// Steps whose condition is false are logged and skipped. The first
    /// failing step aborts the remaining ones.
    pub async fn run(&self, task: &Task) -> Result<RunSummary, ExecutionError> {
        let mut summary = RunSummary::default();
        for step in &task.steps {
            if !step.condition {
                info!(task_id = %task.id(), step = %step.name, "Skipping step");
                summary.skipped += 1;
                continue;
            }

            let kind: StepKind = step.uses.parse()?;
            let handler = self
                .handlers
                .get(&kind)
                .ok_or_else(|| ExecutionError::UnknownStepKind(step.uses.clone()))?;

            let started = Instant::now();
            let result = handler.execute(step).await?;
            info!(
                task_id = %task.id(),
                step = %step.name,
                kind = %kind,
                elapsed_ms = started.elapsed().as_millis() as u64,
                result = %result,
                "Step finished"
            );
            summary.executed += 1;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::Value;
    use supertask_core::error::AppError;
    use supertask_entity::{ScheduleItem, Step, TaskMetadata};

    fn task(steps: Vec<Step>) -> Task {
        Task::new(
            TaskMetadata::new("t", "T"),
            vec![ScheduleItem::new("* * * * *")],
            steps,
        )
        .unwrap()
    }

    fn counting_runner(counter: Arc<AtomicUsize>) -> StepRunner {
        let mut registry = CallableRegistry::with_builtins();
        registry.register("test:count", move |_call| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }
        });
        registry.register("test:fail", |_call| async {
            Err(AppError::internal("boom"))
        });
        StepRunner::with_registry(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_false_condition_skips_step_and_succeeds() {
        let counter = Arc::new(AtomicUsize::new(0));
        let runner = counting_runner(Arc::clone(&counter));
        let task = task(vec![Step::new("guarded", "entrypoint", "test:count").when(false)]);

        let summary = runner.run(&task).await.unwrap();
        assert_eq!(summary, RunSummary { executed: 0, skipped: 1 });
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_steps_run_in_order_and_skip_does_not_abort() {
        let counter = Arc::new(AtomicUsize::new(0));
        let runner = counting_runner(Arc::clone(&counter));
        let task = task(vec![
            Step::new("one", "entrypoint", "test:count"),
            Step::new("off", "entrypoint", "test:fail").when(false),
            Step::new("two", "entrypoint", "test:count"),
        ]);

        let summary = runner.run(&task).await.unwrap();
        assert_eq!(summary, RunSummary { executed: 2, skipped: 1 });
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_steps() {
        let counter = Arc::new(AtomicUsize::new(0));
        let runner = counting_runner(Arc::clone(&counter));
        let task = task(vec![
            Step::new("fails", "entrypoint", "test:fail"),
            Step::new("never", "entrypoint", "test:count"),
        ]);

        let err = runner.run(&task).await.unwrap_err();
        assert!(matches!(err, ExecutionError::StepFailed { step, .. } if step == "fails"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_step_kind() {
        let runner = counting_runner(Arc::new(AtomicUsize::new(0)));
        let task = task(vec![Step::new("x", "teleport", "somewhere")]);
        let err = runner.run(&task).await.unwrap_err();
        assert!(matches!(err, ExecutionError::UnknownStepKind(kind) if kind == "teleport"));
    }

    #[tokio::test]
    async fn test_unresolved_reference() {
        let runner = counting_runner(Arc::new(AtomicUsize::new(0)));
        let task = task(vec![Step::new("x", "entrypoint", "acme:missing")]);
        let err = runner.run(&task).await.unwrap_err();
        assert!(matches!(err, ExecutionError::UnresolvedReference(r) if r == "acme:missing"));
    }

    #[tokio::test]
    async fn test_kind_without_handler() {
        let runner = StepRunner::new();
        assert!(!runner.has_handler(StepKind::Command));
        let task = task(vec![Step::new("x", "command", "true")]);
        assert!(matches!(
            runner.run(&task).await,
            Err(ExecutionError::UnknownStepKind(_))
        ));
    }
}
