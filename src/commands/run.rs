//! `supertask run`: schedule a timetable until interrupted.

use clap::Args;
use tokio::sync::watch;
use tracing::{info, warn};

use supertask_core::config::AppConfig;
use supertask_core::error::AppError;
use supertask_scheduler::{CallableRegistry, Supertask};

/// Arguments for the run command
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Timetable path or URL
    #[arg(env = "ST_TASKFILE")]
    pub taskfile: Option<String>,

    /// Do not watch the timetable for changes
    #[arg(long)]
    pub no_watch: bool,
}

/// Execute the run command
pub async fn execute(args: &RunArgs, mut config: AppConfig) -> Result<(), AppError> {
    let Some(taskfile) = super::taskfile(args.taskfile.as_ref(), &config) else {
        return Err(AppError::configuration(
            "No timetable given, pass a path or set ST_TASKFILE",
        ));
    };
    config.timetable.path = Some(taskfile);
    if args.no_watch {
        config.watcher.enabled = false;
    }

    info!("Starting Supertask v{}", env!("CARGO_PKG_VERSION"));
    let app = Supertask::bootstrap(config, CallableRegistry::with_builtins()).await?;
    app.start().await?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let http = app.config().http.listen.clone().map(|listen| {
        let scheduler = app.scheduler().clone();
        tokio::spawn(async move {
            let signal = async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
            };
            supertask_api::serve(&listen, scheduler, signal).await
        })
    });

    crate::shutdown_signal().await;
    info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Some(handle) = http {
        match handle.await {
            Ok(Err(e)) => warn!(error = %e, "HTTP facade failed"),
            Err(e) => warn!(error = %e, "HTTP task ended abnormally"),
            Ok(Ok(())) => {}
        }
    }
    app.shutdown().await?;
    info!("Supertask stopped");
    Ok(())
}
