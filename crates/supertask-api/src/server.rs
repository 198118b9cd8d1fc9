//! Serving the router until shutdown.

use std::future::Future;

use tokio::net::TcpListener;
use tracing::info;

use supertask_core::error::{AppError, ErrorKind};
use supertask_core::result::AppResult;
use supertask_scheduler::Scheduler;

use crate::router::build_router;
use crate::state::ApiState;

/// Bind `listen` (`host:port`) and serve until `shutdown` resolves.
pub async fn serve<F>(listen: &str, scheduler: Scheduler, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(listen).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Configuration,
            format!("Cannot listen on {listen}: {e}"),
            e,
        )
    })?;
    info!(address = %listen, "HTTP facade listening");

    axum::serve(listener, build_router(ApiState::new(scheduler)))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AppError::internal(format!("HTTP server failed: {e}")))?;

    info!("HTTP facade stopped");
    Ok(())
}
