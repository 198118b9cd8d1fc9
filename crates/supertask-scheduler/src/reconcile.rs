//! Live-reload reconciliation of a timetable against the running schedule.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{error, info, warn};

use supertask_core::error::AppError;
use supertask_core::result::AppResult;
use supertask_entity::{Task, Timetable};

use crate::engine::{JobOptions, Registration, Scheduler};
use crate::trigger::CronTrigger;

/// Job ids to remove, add and reschedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcilePlan {
    pub remove: BTreeSet<String>,
    pub add: BTreeSet<String>,
    pub reschedule: BTreeSet<String>,
}

impl ReconcilePlan {
    /// Diff `live` ids against `desired` ids.
    pub fn compute(live: &BTreeSet<String>, desired: &BTreeSet<String>) -> Self {
        Self {
            remove: live.difference(desired).cloned().collect(),
            add: desired.difference(live).cloned().collect(),
            reschedule: live.intersection(desired).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty() && self.reschedule.is_empty()
    }
}

/// Outcome of applying a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub added: usize,
    pub removed: usize,
    pub replaced: usize,
    pub unchanged: usize,
}

impl ReconcileReport {
    /// Whether any job was touched.
    pub fn changed(&self) -> bool {
        self.added + self.removed + self.replaced > 0
    }

    fn count(&mut self, registration: Registration) {
        match registration {
            Registration::Added => self.added += 1,
            Registration::Replaced => self.replaced += 1,
            Registration::Unchanged => self.unchanged += 1,
        }
    }
}

/// Reloads a timetable source and brings the scheduler in line with it.
#[derive(Debug, Clone)]
pub struct Reconciler {
    scheduler: Scheduler,
    source: String,
    options: JobOptions,
}

impl Reconciler {
    pub fn new(scheduler: Scheduler, source: impl Into<String>, options: JobOptions) -> Self {
        Self {
            scheduler,
            source: source.into(),
            options: options.replace_existing(true),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// See [`ReconcilePlan::compute`].
    pub fn plan(live: &BTreeSet<String>, desired: &BTreeSet<String>) -> ReconcilePlan {
        ReconcilePlan::compute(live, desired)
    }

    /// Reload the source and apply it. A load failure is logged, returned,
    /// and leaves the schedule untouched.
    pub async fn reconcile(&self) -> AppResult<ReconcileReport> {
        let timetable = match supertask_loader::load(&self.source).await {
            Ok(timetable) => timetable,
            Err(e) => {
                error!(source = %self.source, error = %e, "Failed to reload timetable, keeping current schedule");
                return Err(e.into());
            }
        };
        self.apply(&timetable).await
    }

    /// Bring the scheduler in line with `timetable`.
    ///
    /// Every desired trigger is compiled before anything is changed, so an
    /// invalid document leaves the schedule untouched.
    pub async fn apply(&self, timetable: &Timetable) -> AppResult<ReconcileReport> {
        let desired: BTreeMap<String, &Task> = timetable
            .enabled_tasks()
            .map(|task| (task.id().to_string(), task))
            .collect();

        for task in desired.values() {
            CronTrigger::new(&task.cron_expressions(), self.scheduler.timezone()).map_err(|e| {
                error!(task_id = %task.id(), error = %e, "Rejected timetable, keeping current schedule");
                e
            })?;
        }

        let live = self.scheduler.live_job_ids().await?;
        let wanted: BTreeSet<String> = desired.keys().cloned().collect();
        let plan = ReconcilePlan::compute(&live, &wanted);
        info!(
            namespace = %timetable.namespace(),
            remove = plan.remove.len(),
            add = plan.add.len(),
            reschedule = plan.reschedule.len(),
            "Reconciling timetable"
        );

        let mut report = ReconcileReport::default();
        let mut failures = Vec::new();

        for id in &plan.remove {
            match self.scheduler.remove_job(id).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    warn!(job_id = %id, error = %e, "Failed to remove job");
                    failures.push(e);
                }
            }
        }

        for id in plan.add.iter().chain(plan.reschedule.iter()) {
            let Some(task) = desired.get(id) else {
                continue;
            };
            match self.scheduler.reschedule((*task).clone(), self.options.clone()).await {
                Ok(registration) => report.count(registration),
                Err(e) => {
                    warn!(job_id = %id, error = %e, "Failed to register job");
                    failures.push(e);
                }
            }
        }

        if report.changed() {
            info!(
                added = report.added,
                removed = report.removed,
                replaced = report.replaced,
                "Timetable reconciled"
            );
        }

        match failures.into_iter().next() {
            Some(first) => Err(AppError::with_source(
                first.kind,
                format!("Reconciliation incomplete: {}", first.message),
                first,
            )),
            None => Ok(report),
        }
    }

    /// Drop persisted records that `timetable` does not define.
    ///
    /// Only meaningful before the scheduler starts: [`Scheduler::start`]
    /// restores every unshadowed record, and a record removed here is never
    /// restored or fired.
    pub async fn prune_persisted(&self, timetable: &Timetable) -> AppResult<usize> {
        if !self.scheduler.is_pending() {
            return Ok(0);
        }
        let wanted: BTreeSet<&str> = timetable.enabled_tasks().map(Task::id).collect();
        let store = self.scheduler.store();

        let mut pruned = 0usize;
        for record in store.list().await? {
            if wanted.contains(record.id.as_str()) || self.scheduler.get_job(&record.id).is_some() {
                continue;
            }
            if store.remove(&record.id).await? {
                info!(job_id = %record.id, "Dropped persisted job no longer in the timetable");
                pruned += 1;
            }
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_plan_completeness() {
        let plan = ReconcilePlan::compute(&ids(&["A", "B"]), &ids(&["B", "C"]));
        assert_eq!(plan.remove, ids(&["A"]));
        assert_eq!(plan.add, ids(&["C"]));
        assert_eq!(plan.reschedule, ids(&["B"]));
    }

    #[test]
    fn test_plan_empty_sides() {
        let plan = Reconciler::plan(&ids(&[]), &ids(&["A"]));
        assert_eq!(plan.add, ids(&["A"]));
        assert!(plan.remove.is_empty() && plan.reschedule.is_empty());

        let plan = Reconciler::plan(&ids(&["A"]), &ids(&[]));
        assert_eq!(plan.remove, ids(&["A"]));
        assert!(Reconciler::plan(&ids(&[]), &ids(&[])).is_empty());
    }

    #[test]
    fn test_report_changed() {
        let mut report = ReconcileReport::default();
        report.count(Registration::Unchanged);
        assert!(!report.changed());
        report.count(Registration::Replaced);
        assert!(report.changed());
    }
}
