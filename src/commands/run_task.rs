//! Hidden `supertask run-task`: process-lane child. Reads one task as JSON
//! from stdin and runs its steps.

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tracing::info;

use supertask_core::error::AppError;
use supertask_entity::Task;
use supertask_scheduler::{CallableRegistry, StepRunner};

/// Execute the run-task command
pub async fn execute() -> Result<(), AppError> {
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    let task: Task = serde_json::from_str(&input)?;
    task.validate()?;

    let runner = StepRunner::with_registry(Arc::new(CallableRegistry::with_builtins()));
    let summary = runner.run(&task).await?;
    info!(
        task_id = %task.id(),
        executed = summary.executed,
        skipped = summary.skipped,
        "Task finished"
    );
    Ok(())
}
