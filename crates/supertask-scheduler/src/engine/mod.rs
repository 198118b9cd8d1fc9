//! Scheduler core: job lifecycle, trigger loop and concurrency policy.

mod job;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tokio::sync::{Notify, OwnedMutexGuard, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use supertask_core::config::scheduler::SchedulerConfig;
use supertask_core::error::AppError;
use supertask_core::result::AppResult;
use supertask_entity::{ExecutorLane, JobRecord, RunStatus, Task};
use supertask_store::JobStore;

use crate::executor::ExecutorPool;
use crate::trigger::{CronTrigger, parse_timezone};

use self::job::{JobEntry, Lineage, build_record};
pub use self::job::{JobOptions, JobState, Registration};

/// Longest the trigger loop sleeps before re-evaluating.
const MAX_IDLE_WAIT: Duration = Duration::from_secs(60);
/// Most missed slots replayed for one job in a single evaluation.
const MAX_CATCHUP_SLOTS: usize = 1000;

/// A firing dispatched by [`Scheduler::process_due_jobs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    pub job_id: String,
    pub scheduled_for: DateTime<Utc>,
}

/// Trigger engine driving the executor lanes. Clones share one scheduler.
#[derive(Debug, Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    store: Arc<dyn JobStore>,
    executor: Arc<ExecutorPool>,
    timezone: String,
    defaults: JobOptions,
    shutdown_timeout: Duration,
    jobs: DashMap<String, Arc<JobEntry>>,
    removed: DashMap<String, ()>,
    /// Serialises mutations of one job id.
    locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    /// Held for writing while starting, for reading by mutations.
    lifecycle: RwLock<()>,
    started: AtomicBool,
    stopping: AtomicBool,
    wakeup: Notify,
    inflight: AtomicUsize,
    idle: Notify,
    shutdown_tx: watch::Sender<bool>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler. Jobs can be added right away; they stay pending
    /// until [`start`](Self::start).
    pub fn new(
        store: Arc<dyn JobStore>,
        executor: Arc<ExecutorPool>,
        config: &SchedulerConfig,
    ) -> AppResult<Self> {
        parse_timezone(&config.timezone)?;
        let (shutdown_tx, _) = watch::channel(false);

        info!(
            timezone = %config.timezone,
            thread_pool_size = config.thread_pool_size,
            process_pool_size = config.process_pool_size,
            store = %store.backend(),
            "Configured scheduler"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                executor,
                timezone: config.timezone.clone(),
                defaults: JobOptions::from_config(config),
                shutdown_timeout: Duration::from_secs(config.shutdown_timeout_seconds),
                jobs: DashMap::new(),
                removed: DashMap::new(),
                locks: DashMap::new(),
                lifecycle: RwLock::new(()),
                started: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
                wakeup: Notify::new(),
                inflight: AtomicUsize::new(0),
                idle: Notify::new(),
                shutdown_tx,
                loop_handle: Mutex::new(None),
            }),
        })
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.inner.store
    }

    pub fn timezone(&self) -> &str {
        &self.inner.timezone
    }

    /// Default options for ad-hoc jobs.
    pub fn default_options(&self) -> JobOptions {
        self.inner.defaults.clone()
    }

    /// Whether the trigger loop is running.
    pub fn is_running(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst) && !self.inner.stopping.load(Ordering::SeqCst)
    }

    /// Neither started nor shut down.
    pub fn is_pending(&self) -> bool {
        !self.inner.started.load(Ordering::SeqCst) && !self.inner.stopping.load(Ordering::SeqCst)
    }

    async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        let mutex = Arc::clone(self.inner.locks.entry(id.to_string()).or_default().value());
        mutex.lock_owned().await
    }

    fn entry(&self, id: &str) -> Option<Arc<JobEntry>> {
        self.inner.jobs.get(id).map(|e| Arc::clone(e.value()))
    }

    /// Register `task` as a job keyed by its id.
    ///
    /// With `replace_existing`, an existing job is replaced, or left alone
    /// without any store write when its definition is unchanged. Without it,
    /// an existing id is a conflict. Before [`start`](Self::start) the job is
    /// only queued.
    pub async fn add_job(&self, task: Task, options: JobOptions) -> AppResult<Registration> {
        task.validate()?;
        let trigger = CronTrigger::new(&task.cron_expressions(), &self.inner.timezone)?;
        let id = task.id().to_string();

        let _life = self.inner.lifecycle.read().await;
        let _guard = self.lock(&id).await;

        let mut record = build_record(&task, &trigger, &options, Utc::now());
        let (registration, lineage) = match self.entry(&id) {
            Some(existing) => {
                if !options.replace_existing {
                    return Err(AppError::conflict(format!("Job '{id}' already exists")));
                }
                let current = existing.record();
                if current.same_definition(&record) {
                    debug!(job_id = %id, "Job unchanged");
                    return Ok(Registration::Unchanged);
                }
                record.last_run = current.last_run;
                record.last_status = current.last_status;
                (Registration::Replaced, Arc::clone(&existing.lineage))
            }
            None => (Registration::Added, Arc::new(Lineage::default())),
        };

        if self.inner.started.load(Ordering::SeqCst) {
            self.inner.store.put(&record).await?;
        }

        info!(
            job_id = %id,
            registration = ?registration,
            next_run_time = ?record.next_run_time,
            "Registered job"
        );
        self.inner.removed.remove(&id);
        self.inner
            .jobs
            .insert(id, Arc::new(JobEntry::new(record, trigger, lineage)));
        self.inner.wakeup.notify_one();
        Ok(registration)
    }

    /// Re-register `task` with replace-existing semantics.
    pub async fn reschedule(&self, task: Task, options: JobOptions) -> AppResult<Registration> {
        self.add_job(task, options.replace_existing(true)).await
    }

    /// Remove a job from the schedule and the store. Terminal for this job;
    /// in-flight firings finish but do not write their outcome.
    pub async fn remove_job(&self, id: &str) -> AppResult<()> {
        let _life = self.inner.lifecycle.read().await;
        let _guard = self.lock(id).await;

        let in_store = self.inner.store.remove(id).await?;
        let in_memory = self.inner.jobs.remove(id).map(|(_, entry)| entry);
        if let Some(entry) = &in_memory {
            entry.lineage.removed.store(true, Ordering::SeqCst);
        }
        if in_memory.is_none() && !in_store {
            return Err(AppError::not_found(format!("No job by the id of '{id}' was found")));
        }

        self.inner.removed.insert(id.to_string(), ());
        self.inner.wakeup.notify_one();
        info!(job_id = %id, "Removed job");
        Ok(())
    }

    /// Start the trigger loop.
    ///
    /// Persisted records whose id is not pending are restored. Pending jobs
    /// are persisted, and then every job is scheduled at once.
    pub async fn start(&self) -> AppResult<()> {
        let _life = self.inner.lifecycle.write().await;
        if self.inner.stopping.load(Ordering::SeqCst) {
            return Err(AppError::conflict("Scheduler has been shut down"));
        }
        if self.inner.started.load(Ordering::SeqCst) {
            return Err(AppError::conflict("Scheduler is already running"));
        }

        let pending: Vec<Arc<JobEntry>> =
            self.inner.jobs.iter().map(|e| Arc::clone(e.value())).collect();

        let mut restored = 0usize;
        for record in self.inner.store.list().await? {
            if self.inner.jobs.contains_key(&record.id) {
                continue;
            }
            match CronTrigger::from_state(&record.trigger) {
                Ok(trigger) => {
                    let id = record.id.clone();
                    let entry = JobEntry::new(record, trigger, Arc::new(Lineage::default()));
                    self.inner.jobs.insert(id, Arc::new(entry));
                    restored += 1;
                }
                Err(e) => {
                    warn!(job_id = %record.id, error = %e, "Skipping persisted job with invalid trigger");
                }
            }
        }

        for entry in &pending {
            self.inner.store.put(&entry.record()).await?;
        }

        self.inner.started.store(true, Ordering::SeqCst);
        info!(pending = pending.len(), restored, "Starting scheduler");
        for record in self.get_jobs() {
            info!(job_id = %record.id, next_run_time = ?record.next_run_time, "Scheduled job");
        }

        let scheduler = self.clone();
        let shutdown = self.inner.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move { scheduler.run_loop(shutdown).await });
        if let Ok(mut slot) = self.inner.loop_handle.lock() {
            *slot = Some(handle);
        }
        Ok(())
    }

    /// Stop the trigger loop and wait, bounded, for in-flight firings.
    /// The store is left as the last completed mutation made it.
    pub async fn shutdown(&self) -> AppResult<()> {
        if self.inner.stopping.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Shutting down scheduler");
        let _ = self.inner.shutdown_tx.send(true);

        let handle = self.inner.loop_handle.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Trigger loop ended abnormally");
            }
        }

        if !self.wait_idle(self.inner.shutdown_timeout).await {
            warn!(
                inflight = self.inner.inflight.load(Ordering::SeqCst),
                "Timed out waiting for running jobs"
            );
        }
        info!("Scheduler shut down");
        Ok(())
    }

    /// Snapshot of all registered jobs, ordered by next run time.
    pub fn get_jobs(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> =
            self.inner.jobs.iter().map(|e| e.value().record()).collect();
        records.sort_by(|a, b| {
            (a.next_run_time.is_none(), a.next_run_time, &a.id)
                .cmp(&(b.next_run_time.is_none(), b.next_run_time, &b.id))
        });
        records
    }

    pub fn get_job(&self, id: &str) -> Option<JobRecord> {
        self.entry(id).map(|entry| entry.record())
    }

    /// Lifecycle state of a job. `None` for ids never registered.
    pub fn job_state(&self, id: &str) -> Option<JobState> {
        match self.entry(id) {
            Some(entry) if entry.lineage.running() > 0 => Some(JobState::Firing),
            Some(_) if self.inner.started.load(Ordering::SeqCst) => Some(JobState::Scheduled),
            Some(_) => Some(JobState::Pending),
            None if self.inner.removed.contains_key(id) => Some(JobState::Removed),
            None => None,
        }
    }

    /// Ids of live jobs: read from the store once started, the pending set
    /// before that.
    pub async fn live_job_ids(&self) -> AppResult<BTreeSet<String>> {
        if self.inner.started.load(Ordering::SeqCst) {
            Ok(self
                .inner
                .store
                .list()
                .await?
                .into_iter()
                .map(|record| record.id)
                .collect())
        } else {
            Ok(self.inner.jobs.iter().map(|e| e.key().clone()).collect())
        }
    }

    /// Earliest next run time across all jobs.
    pub fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        self.inner
            .jobs
            .iter()
            .filter_map(|e| e.value().record().next_run_time)
            .min()
    }

    /// Number of firings currently executing.
    pub fn inflight(&self) -> usize {
        self.inner.inflight.load(Ordering::SeqCst)
    }

    /// Wait until no firing is executing. Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.inner.idle.notified();
                if self.inner.inflight.load(Ordering::SeqCst) == 0 {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }

    async fn run_loop(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Trigger loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.process_due_jobs(Utc::now()).await;

            let wait = self
                .next_wakeup()
                .map(|next| (next - Utc::now()).to_std().unwrap_or(Duration::ZERO))
                .unwrap_or(MAX_IDLE_WAIT)
                .min(MAX_IDLE_WAIT);

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = self.inner.wakeup.notified() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }
        info!("Trigger loop stopped");
    }

    /// Evaluate every trigger against `now` and dispatch due firings.
    ///
    /// Each missed slot fires once unless the job coalesces. Slots older
    /// than the misfire grace are dropped. A slot that would exceed
    /// `max_instances` is skipped. Returns the dispatched firings.
    pub async fn process_due_jobs(&self, now: DateTime<Utc>) -> Vec<Firing> {
        let mut firings = Vec::new();
        if self.inner.stopping.load(Ordering::SeqCst) {
            return firings;
        }

        let due: Vec<String> = self
            .inner
            .jobs
            .iter()
            .filter(|e| e.value().record().next_run_time.is_some_and(|t| t <= now))
            .map(|e| e.key().clone())
            .collect();

        for id in due {
            let _guard = self.lock(&id).await;
            let Some(entry) = self.entry(&id) else {
                continue;
            };

            let mut slots = Vec::new();
            let record = entry.update(|record| {
                let mut next = record.next_run_time;
                while let Some(at) = next {
                    if at > now {
                        break;
                    }
                    slots.push(at);
                    if slots.len() >= MAX_CATCHUP_SLOTS {
                        next = entry.trigger.next_after(now);
                        break;
                    }
                    next = entry.trigger.next_after(at);
                }
                record.next_run_time = next;
            });
            if slots.is_empty() {
                continue;
            }

            if let Some(grace) = record.misfire_grace_seconds {
                let grace = grace_window(grace);
                let before = slots.len();
                slots.retain(|at| now - *at <= grace);
                if slots.len() < before {
                    warn!(job_id = %id, missed = before - slots.len(), "Run time of job was missed");
                }
            }
            if record.coalesce && slots.len() > 1 {
                slots.drain(..slots.len() - 1);
            }

            if let Err(e) = self.inner.store.put(&record).await {
                warn!(job_id = %id, error = %e, "Failed to persist next run time");
            }

            for at in slots {
                let max = record.max_instances.max(1);
                let admitted = entry
                    .lineage
                    .running
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |running| {
                        (running < max).then_some(running + 1)
                    })
                    .is_ok();
                if !admitted {
                    warn!(
                        job_id = %id,
                        max_instances = max,
                        scheduled_for = %at,
                        "Execution of job skipped: maximum number of running instances reached"
                    );
                    continue;
                }

                self.dispatch(&id, Arc::clone(&entry.lineage), record.task.clone(), record.executor, at);
                firings.push(Firing {
                    job_id: id.clone(),
                    scheduled_for: at,
                });
            }
        }
        firings
    }

    fn dispatch(
        &self,
        id: &str,
        lineage: Arc<Lineage>,
        task: Task,
        lane: ExecutorLane,
        scheduled_for: DateTime<Utc>,
    ) {
        self.inner.inflight.fetch_add(1, Ordering::SeqCst);
        let scheduler = self.clone();
        let id = id.to_string();

        tokio::spawn(async move {
            let started_at = Utc::now();
            let clock = Instant::now();
            info!(job_id = %id, lane = %lane, scheduled_for = %scheduled_for, "Running job");

            let status = match scheduler.inner.executor.execute(lane, &task).await {
                Ok(_) => {
                    info!(
                        job_id = %id,
                        elapsed_ms = clock.elapsed().as_millis() as u64,
                        "Job executed successfully"
                    );
                    RunStatus::Success
                }
                Err(e) => {
                    error!(job_id = %id, task_id = %task.id(), error = %e, "Job raised an error");
                    RunStatus::Failed
                }
            };
            lineage.running.fetch_sub(1, Ordering::SeqCst);

            scheduler.record_outcome(&id, &lineage, started_at, status).await;
            if scheduler.inner.inflight.fetch_sub(1, Ordering::SeqCst) == 1 {
                scheduler.inner.idle.notify_waiters();
            }
        });
    }

    /// Write `last_run` and `last_status`, unless the job was removed.
    async fn record_outcome(
        &self,
        id: &str,
        lineage: &Arc<Lineage>,
        started_at: DateTime<Utc>,
        status: RunStatus,
    ) {
        let _guard = self.lock(id).await;
        if lineage.is_removed() {
            debug!(job_id = %id, "Job removed while running, outcome dropped");
            return;
        }
        let Some(entry) = self.entry(id) else {
            return;
        };
        if !Arc::ptr_eq(&entry.lineage, lineage) {
            return;
        }

        let record = entry.update(|record| {
            record.last_run = Some(started_at);
            record.last_status = Some(status);
        });
        if self.inner.started.load(Ordering::SeqCst) {
            if let Err(e) = self.inner.store.put(&record).await {
                warn!(job_id = %id, error = %e, "Failed to persist job outcome");
            }
        }
    }
}

/// Misfire grace as a duration, saturating for values past `TimeDelta`'s range.
fn grace_window(seconds: u64) -> TimeDelta {
    i64::try_from(seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}
