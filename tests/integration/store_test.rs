//! Job store contract tests. Relational backends run only when
//! `ST_TEST_POSTGRES_URL` or `ST_TEST_CRATEDB_URL` is set.

use chrono::{Duration, TimeZone, Utc};

use supertask_core::config::store::StoreConfig;
use supertask_entity::{
    ExecutorLane, JobRecord, JobStoreLocation, ScheduleItem, Step, Task, TaskMetadata,
    TriggerState,
};
use supertask_store::{JobStore, JobStoreManager};

fn record(id: &str, offset_minutes: Option<i64>) -> JobRecord {
    let task = Task::new(
        TaskMetadata::new(id, id),
        vec![ScheduleItem::new("*/5 * * * *")],
        vec![Step::new("echo", "entrypoint", "supertask:echo")],
    )
    .unwrap();
    let base = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
    JobRecord {
        id: id.to_string(),
        name: id.to_string(),
        trigger: TriggerState {
            expressions: vec!["*/5 * * * *".to_string()],
            timezone: "UTC".to_string(),
        },
        next_run_time: offset_minutes.map(|m| base + Duration::minutes(m)),
        task,
        max_instances: 1,
        coalesce: false,
        misfire_grace_seconds: None,
        executor: ExecutorLane::Thread,
        last_run: None,
        last_status: None,
    }
}

async fn exercise(address: &str) {
    let location = JobStoreLocation::new(address).with_namespace("storetest");
    let store = JobStoreManager::connect(location, &StoreConfig::default())
        .await
        .unwrap();
    store.remove_all().await.unwrap();

    store.put(&record("late", Some(10))).await.unwrap();
    store.put(&record("paused", None)).await.unwrap();
    store.put(&record("early", Some(5))).await.unwrap();

    let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["early", "late", "paused"]);

    let mut updated = record("late", Some(1));
    updated.name = "renamed".to_string();
    store.put(&updated).await.unwrap();
    assert_eq!(store.get("late").await.unwrap().unwrap().name, "renamed");
    assert_eq!(store.list().await.unwrap()[0].id, "late");

    assert!(store.remove("late").await.unwrap());
    assert!(!store.remove("late").await.unwrap());
    assert!(store.get("late").await.unwrap().is_none());

    store.remove_all().await.unwrap();
    assert!(store.list().await.unwrap().is_empty());
    assert!(store.health_check().await.unwrap());
}

#[tokio::test]
async fn test_memory_store_contract() {
    exercise("memory://").await;
}

#[tokio::test]
async fn test_postgres_store_contract() {
    match std::env::var("ST_TEST_POSTGRES_URL") {
        Ok(url) => exercise(&url).await,
        Err(_) => eprintln!("ST_TEST_POSTGRES_URL not set, skipping"),
    }
}

#[tokio::test]
async fn test_cratedb_list_reflects_prior_put() {
    match std::env::var("ST_TEST_CRATEDB_URL") {
        Ok(url) => exercise(&url).await,
        Err(_) => eprintln!("ST_TEST_CRATEDB_URL not set, skipping"),
    }
}
