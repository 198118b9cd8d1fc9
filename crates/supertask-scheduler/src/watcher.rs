//! Debounced watching of a local timetable file.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use supertask_core::config::watcher::WatcherConfig;
use supertask_core::error::AppError;
use supertask_core::result::AppResult;

use crate::reconcile::Reconciler;

/// Watches the directory holding one file and forwards events that touch it
/// into a bounded channel.
pub struct FileWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    events: mpsc::Receiver<PathBuf>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher").field("path", &self.path).finish()
    }
}

impl FileWatcher {
    /// Start watching `path`. A full channel drops the event, which the
    /// debounce would have folded anyway.
    pub fn new(path: &Path, capacity: usize) -> AppResult<Self> {
        let path = std::path::absolute(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| AppError::configuration(format!("Not a file path: {}", path.display())))?;
        let directory = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let (tx, events) = mpsc::channel(capacity.max(1));
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_relevant(&event.kind) => {
                for changed in event.paths {
                    if changed.file_name() == Some(file_name.as_os_str()) {
                        let _ = tx.try_send(changed);
                        break;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "File watcher error"),
        })
        .map_err(|e| AppError::with_source(
            supertask_core::ErrorKind::Internal,
            "Failed to create file watcher",
            e,
        ))?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| AppError::with_source(
                supertask_core::ErrorKind::Storage,
                format!("Failed to watch {}", directory.display()),
                e,
            ))?;

        info!(path = %path.display(), "Watching timetable");
        Ok(Self {
            path,
            _watcher: watcher,
            events,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reconcile on every debounced change until `shutdown` flips.
    pub fn spawn(
        self,
        reconciler: Reconciler,
        config: &WatcherConfig,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let debounce = Duration::from_millis(config.debounce_millis);
        tokio::spawn(async move {
            let FileWatcher {
                path,
                _watcher,
                events,
            } = self;
            debounce_loop(events, debounce, shutdown, || {
                let reconciler = reconciler.clone();
                let path = path.clone();
                async move {
                    reload_after_change(&reconciler, &path).await;
                }
            })
            .await;
            drop(_watcher);
        })
    }
}

/// Reconcile after a change event. Returns whether the reload applied.
async fn reload_after_change(reconciler: &Reconciler, path: &Path) -> bool {
    info!(path = %path.display(), "Timetable changed, reconciling");
    match reconciler.reconcile().await {
        Ok(_) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Timetable reload failed, schedule unchanged");
            false
        }
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

/// Single consumer of change events.
///
/// The first event after a quiet period runs `on_change` at once. Events
/// within `debounce` of the last run are not dropped: they are folded into
/// one trailing run when the window closes, so the final write of an editor
/// save burst is always picked up. Returns the number of runs.
pub async fn debounce_loop<T, F, Fut>(
    mut events: mpsc::Receiver<T>,
    debounce: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut on_change: F,
) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut runs = 0usize;
    let mut last: Option<Instant> = None;
    let mut pending = false;

    loop {
        let deadline = last.map_or_else(Instant::now, |at| at + debounce);
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            event = events.recv() => {
                if event.is_none() {
                    if pending {
                        sleep_until(deadline).await;
                        on_change().await;
                        runs += 1;
                    }
                    break;
                }
                match last {
                    Some(at) if at.elapsed() < debounce => {
                        debug!("Change event debounced");
                        pending = true;
                    }
                    _ => {
                        on_change().await;
                        runs += 1;
                        last = Some(Instant::now());
                        pending = false;
                    }
                }
            }
            _ = sleep_until(deadline), if pending => {
                on_change().await;
                runs += 1;
                last = Some(Instant::now());
                pending = false;
            }
        }
    }
    debug!(runs, "Watcher stopped");
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() -> futures::future::Ready<()>) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_folds_into_leading_and_trailing_run() {
        let (tx, rx) = mpsc::channel(16);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (count, on_change) = counter();
        let handle = tokio::spawn(debounce_loop(rx, Duration::from_secs(1), stop_rx, on_change));

        for _ in 0..5 {
            tx.send(()).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(1)).await;

        tx.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        drop(tx);
        assert_eq!(handle.await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_event_runs_once() {
        let (tx, rx) = mpsc::channel(16);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (count, on_change) = counter();
        let handle = tokio::spawn(debounce_loop(rx, Duration::from_secs(1), stop_rx, on_change));

        tx.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(tx);
        assert_eq!(handle.await.unwrap(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop() {
        let (_tx, rx) = mpsc::channel::<()>(1);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (_, on_change) = counter();
        let handle = tokio::spawn(debounce_loop(rx, Duration::from_secs(1), stop_rx, on_change));
        stop_tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), 0);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn idle_scheduler() -> crate::engine::Scheduler {
        use crate::executor::{ExecutorPool, ProcessLauncher};
        use crate::runner::{CallableRegistry, StepRunner};
        use supertask_core::config::scheduler::SchedulerConfig;

        let runner = Arc::new(StepRunner::with_registry(Arc::new(CallableRegistry::with_builtins())));
        let executor = Arc::new(ExecutorPool::new(runner, ProcessLauncher::new("false", Vec::new()), 1, 1));
        let store = Arc::new(supertask_store::MemoryJobStore::default());
        crate::engine::Scheduler::new(store, executor, &SchedulerConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_failed_reload_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("timetable.yaml");
        std::fs::write(&file, "tasks: [\n  {broken").unwrap();

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let reconciler = Reconciler::new(
            idle_scheduler(),
            file.to_string_lossy(),
            crate::engine::JobOptions::default(),
        );
        assert!(!reload_after_change(&reconciler, &file).await);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("Timetable reload failed, schedule unchanged"));
    }

    #[tokio::test]
    async fn test_watcher_reports_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("timetable.yaml");
        std::fs::write(&file, "tasks: []\n").unwrap();

        let mut watcher = FileWatcher::new(&file, 16).unwrap();
        std::fs::write(dir.path().join("other.yaml"), "x").unwrap();
        std::fs::write(&file, "tasks: []\nmeta: {}\n").unwrap();

        let received = tokio::time::timeout(Duration::from_secs(10), watcher.events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.file_name(), file.file_name());
    }
}
