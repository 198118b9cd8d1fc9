//! The [`Supertask`] context: store, scheduler and step runner for one
//! timetable, passed explicitly to the reconciler and the watcher.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use supertask_core::config::AppConfig;
use supertask_core::result::AppResult;
use supertask_entity::{JobStoreLocation, Timetable, namespace};
use supertask_store::{JobStore, JobStoreManager};

use crate::engine::{JobOptions, Scheduler};
use crate::executor::ExecutorPool;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::runner::{CallableRegistry, StepRunner};
use crate::watcher::FileWatcher;

/// Everything a running scheduler process owns.
#[derive(Debug)]
pub struct Supertask {
    config: AppConfig,
    timetable: Option<Timetable>,
    store: JobStoreManager,
    registry: Arc<CallableRegistry>,
    scheduler: Scheduler,
    shutdown_tx: watch::Sender<bool>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Supertask {
    /// Load the configured timetable, connect its namespaced store and
    /// register its enabled tasks. Nothing fires until [`start`](Self::start).
    pub async fn bootstrap(config: AppConfig, registry: CallableRegistry) -> AppResult<Self> {
        let timetable = match config.timetable.path.as_deref() {
            Some(source) => Some(supertask_loader::load(source).await?),
            None => None,
        };
        let ns = timetable
            .as_ref()
            .map(Timetable::namespace)
            .unwrap_or_else(|| namespace::for_source(None));

        let location = JobStoreLocation::new(config.store.address.clone())
            .with_options(Some(&config.store.schema), Some(&config.store.table))
            .with_namespace(ns);
        let store = JobStoreManager::connect(location, &config.store).await?;

        Self::with_store(config, store, registry, timetable).await
    }

    /// Build the context around an already connected store.
    pub async fn with_store(
        config: AppConfig,
        store: JobStoreManager,
        registry: CallableRegistry,
        timetable: Option<Timetable>,
    ) -> AppResult<Self> {
        info!(
            namespace = store.location().namespace.as_deref().unwrap_or("-"),
            table = %store.location().effective_table(),
            backend = %store.backend(),
            "Using job store"
        );
        if config.store.pre_delete {
            store.pre_delete().await;
        }

        let registry = Arc::new(registry);
        let runner = Arc::new(StepRunner::with_registry(Arc::clone(&registry)));
        let executor = Arc::new(ExecutorPool::from_config(runner, &config.scheduler)?);
        let scheduler = Scheduler::new(store.store(), executor, &config.scheduler)?;
        let (shutdown_tx, _) = watch::channel(false);

        let app = Self {
            config,
            timetable,
            store,
            registry,
            scheduler,
            shutdown_tx,
            watcher: Mutex::new(None),
        };

        if let Some(timetable) = &app.timetable {
            let report = app.timetable_reconciler(timetable).apply(timetable).await?;
            info!(registered = report.added, "Registered timetable tasks");
        }
        Ok(app)
    }

    fn timetable_reconciler(&self, timetable: &Timetable) -> Reconciler {
        Reconciler::new(
            self.scheduler.clone(),
            timetable.source().unwrap_or_default(),
            JobOptions::reconciled(&self.config.scheduler),
        )
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &JobStoreManager {
        &self.store
    }

    pub fn registry(&self) -> &Arc<CallableRegistry> {
        &self.registry
    }

    /// The timetable loaded at bootstrap.
    pub fn timetable(&self) -> Option<&Timetable> {
        self.timetable.as_ref()
    }

    /// A reconciler for the configured source, if any.
    pub fn reconciler(&self) -> Option<Reconciler> {
        let source = self.config.timetable.path.as_deref()?;
        Some(Reconciler::new(
            self.scheduler.clone(),
            source,
            JobOptions::reconciled(&self.config.scheduler),
        ))
    }

    /// Reload the source once.
    pub async fn reload(&self) -> AppResult<Option<ReconcileReport>> {
        match self.reconciler() {
            Some(reconciler) => reconciler.reconcile().await.map(Some),
            None => Ok(None),
        }
    }

    /// Start the scheduler and, for a local source, the file watcher.
    ///
    /// Persisted jobs the bootstrap timetable no longer defines are dropped
    /// first, so the restored schedule matches the document.
    pub async fn start(&self) -> AppResult<()> {
        if let Some(timetable) = &self.timetable {
            let pruned = self.timetable_reconciler(timetable).prune_persisted(timetable).await?;
            if pruned > 0 {
                info!(pruned, "Pruned stale persisted jobs");
            }
        }
        self.scheduler.start().await?;

        let Some(reconciler) = self.reconciler() else {
            return Ok(());
        };
        if !self.config.watcher.enabled {
            return Ok(());
        }
        if supertask_loader::is_remote(reconciler.source()) {
            warn!(source = %reconciler.source(), "Remote timetables are not watched");
            return Ok(());
        }

        let path = reconciler.source().trim_start_matches("file://").to_string();
        let watcher = FileWatcher::new(Path::new(&path), self.config.watcher.channel_capacity)?;
        let handle = watcher.spawn(reconciler, &self.config.watcher, self.shutdown_tx.subscribe());
        if let Ok(mut slot) = self.watcher.lock() {
            *slot = Some(handle);
        }
        Ok(())
    }

    /// Stop the watcher, then the scheduler.
    pub async fn shutdown(&self) -> AppResult<()> {
        let _ = self.shutdown_tx.send(true);
        let handle = self.watcher.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Watcher task ended abnormally");
            }
        }
        self.scheduler.shutdown().await
    }
}
