//! Volatile in-memory job store.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use supertask_core::result::AppResult;
use supertask_entity::{JobRecord, StoreBackend};

use crate::traits::JobStore;

/// Job store backed by a concurrent map. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<DashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    async fn setup(&self) -> AppResult<()> {
        Ok(())
    }

    async fn put(&self, record: &JobRecord) -> AppResult<()> {
        self.jobs.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> AppResult<Option<JobRecord>> {
        Ok(self.jobs.get(id).map(|entry| entry.value().clone()))
    }

    async fn remove(&self, id: &str) -> AppResult<bool> {
        Ok(self.jobs.remove(id).is_some())
    }

    async fn remove_all(&self) -> AppResult<()> {
        let count = self.jobs.len();
        self.jobs.clear();
        debug!(count, "Removed all jobs from memory store");
        Ok(())
    }

    async fn list(&self) -> AppResult<Vec<JobRecord>> {
        let mut records: Vec<JobRecord> =
            self.jobs.iter().map(|entry| entry.value().clone()).collect();
        sort_records(&mut records);
        Ok(records)
    }
}

/// Order by next run time with unscheduled jobs last, then by id.
pub(crate) fn sort_records(records: &mut [JobRecord]) {
    records.sort_by(|a, b| match (a.next_run_time, b.next_run_time) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use supertask_entity::{ExecutorLane, ScheduleItem, Step, Task, TaskMetadata, TriggerState};

    fn record(id: &str, next: Option<i64>) -> JobRecord {
        let task = Task::new(
            TaskMetadata::new(id, id),
            vec![ScheduleItem::new("* * * * *")],
            vec![Step::new("s", "entrypoint", "supertask:echo")],
        )
        .unwrap();
        JobRecord {
            id: id.to_string(),
            name: id.to_string(),
            trigger: TriggerState {
                expressions: task.cron_expressions(),
                timezone: "UTC".into(),
            },
            next_run_time: next.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            task,
            max_instances: 1,
            coalesce: false,
            misfire_grace_seconds: None,
            executor: ExecutorLane::Thread,
            last_run: None,
            last_status: None,
        }
    }

    #[tokio::test]
    async fn test_put_get_remove() {
        let store = MemoryJobStore::new();
        store.put(&record("a", Some(10))).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().unwrap().id, "a");
        assert!(store.get("b").await.unwrap().is_none());

        assert!(store.remove("a").await.unwrap());
        assert!(!store.remove("a").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let store = MemoryJobStore::new();
        store.put(&record("a", Some(10))).await.unwrap();
        store.put(&record("a", Some(20))).await.unwrap();
        assert_eq!(store.len(), 1);
        let stored = store.get("a").await.unwrap().unwrap();
        assert_eq!(stored.next_run_time.unwrap().timestamp(), 20);
    }

    #[tokio::test]
    async fn test_list_order_and_remove_all() {
        let store = MemoryJobStore::new();
        store.put(&record("late", Some(30))).await.unwrap();
        store.put(&record("paused", None)).await.unwrap();
        store.put(&record("early", Some(10))).await.unwrap();

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["early", "late", "paused"]);

        store.remove_all().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryJobStore::new();
        let other = store.clone();
        store.put(&record("a", None)).await.unwrap();
        assert_eq!(other.list().await.unwrap().len(), 1);
    }
}
