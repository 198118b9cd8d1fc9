//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use supertask_core::config::AppConfig;
use supertask_core::result::AppResult;
use supertask_entity::{JobRecord, JobStoreLocation, StoreBackend};
use supertask_scheduler::{CallableRegistry, Reconciler, Scheduler, Supertask};
use supertask_store::{JobStore, JobStoreManager, MemoryJobStore};

/// Memory store that counts mutating calls.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryJobStore,
    mutations: AtomicUsize,
}

impl CountingStore {
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobStore for CountingStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    async fn setup(&self) -> AppResult<()> {
        Ok(())
    }

    async fn put(&self, record: &JobRecord) -> AppResult<()> {
        self.count();
        self.inner.put(record).await
    }

    async fn get(&self, id: &str) -> AppResult<Option<JobRecord>> {
        self.inner.get(id).await
    }

    async fn remove(&self, id: &str) -> AppResult<bool> {
        self.count();
        self.inner.remove(id).await
    }

    async fn remove_all(&self) -> AppResult<()> {
        self.count();
        self.inner.remove_all().await
    }

    async fn list(&self) -> AppResult<Vec<JobRecord>> {
        self.inner.list().await
    }
}

/// Test application context: a timetable on disk and a Supertask
/// context over a counting memory store.
pub struct TestApp {
    pub dir: TempDir,
    pub path: PathBuf,
    pub store: Arc<CountingStore>,
    pub app: Supertask,
}

impl TestApp {
    /// Write `document` as `timetable.yaml` and bootstrap around it.
    pub async fn new(document: &str) -> Self {
        Self::with_config(document, AppConfig::default()).await
    }

    pub async fn with_config(document: &str, mut config: AppConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timetable.yaml");
        std::fs::write(&path, document).unwrap();

        let source = path.to_string_lossy().to_string();
        config.timetable.path = Some(source.clone());
        config.watcher.enabled = false;

        let timetable = supertask_loader::load(&source).await.unwrap();
        let location = JobStoreLocation::new("memory://").with_namespace(timetable.namespace());
        let store = Arc::new(CountingStore::default());
        let manager = JobStoreManager::from_store(store.clone(), location);

        let app = Supertask::with_store(config, manager, CallableRegistry::with_builtins(), Some(timetable))
            .await
            .unwrap();
        Self {
            dir,
            path,
            store,
            app,
        }
    }

    /// A fresh context over the same store and the document now on disk,
    /// as after a process restart.
    pub async fn reopen(&self) -> Supertask {
        let mut config = self.app.config().clone();
        config.store.pre_delete = false;
        let source = self.path.to_string_lossy().to_string();
        let timetable = supertask_loader::load(&source).await.unwrap();
        let location = JobStoreLocation::new("memory://").with_namespace(timetable.namespace());
        let manager = JobStoreManager::from_store(self.store.clone(), location);
        Supertask::with_store(config, manager, CallableRegistry::with_builtins(), Some(timetable))
            .await
            .unwrap()
    }

    pub fn scheduler(&self) -> &Scheduler {
        self.app.scheduler()
    }

    pub fn reconciler(&self) -> Reconciler {
        self.app.reconciler().unwrap()
    }

    /// Replace the timetable document on disk.
    pub fn rewrite(&self, document: &str) {
        std::fs::write(&self.path, document).unwrap();
    }

    pub async fn live_ids(&self) -> Vec<String> {
        self.scheduler().live_job_ids().await.unwrap().into_iter().collect()
    }
}

/// Task entry rendered by [`timetable`]: id, cron, enabled.
pub type TaskEntry<'a> = (&'a str, &'a str, bool);

/// Render a YAML timetable with one echo step per task.
pub fn timetable(tasks: &[TaskEntry<'_>]) -> String {
    let mut doc = String::from("meta:\n  namespace: itest\ntasks:\n");
    for (id, cron, enabled) in tasks {
        doc.push_str(&format!(
            "  - meta: {{id: {id}, name: {id}, enabled: {enabled}}}\n    on:\n      schedule:\n        - cron: \"{cron}\"\n    steps:\n      - name: echo\n        uses: entrypoint\n        run: \"supertask:echo\"\n        args: [{id}]\n"
        ));
    }
    doc
}
