//! Integration tests for firing jobs through the executor lanes.

mod helpers;

use std::time::Duration;

use helpers::{TestApp, timetable};
use supertask_core::config::AppConfig;
use supertask_entity::RunStatus;
use supertask_store::JobStore;

const SKIPPED_STEP: &str = r#"
tasks:
  - meta: {id: guarded, name: Guarded}
    on:
      schedule:
        - cron: "*/5 * * * *"
    steps:
      - name: never
        uses: entrypoint
        run: "missing:callable"
        if: false
      - name: echo
        uses: entrypoint
        run: "supertask:echo"
        args: [hello]
"#;

const PROCESS_LANE: &str = r#"
tasks:
  - meta: {id: child, name: Child, executor: process}
    on:
      schedule:
        - cron: "*/5 * * * *"
    steps:
      - {name: echo, uses: entrypoint, run: "supertask:echo"}
"#;

async fn fire_once(app: &TestApp, id: &str) -> Option<RunStatus> {
    let scheduler = app.scheduler();
    let slot = scheduler.get_job(id).and_then(|r| r.next_run_time).unwrap();
    assert_eq!(scheduler.process_due_jobs(slot).await.len(), 1);
    assert!(scheduler.wait_idle(Duration::from_secs(10)).await);
    scheduler.get_job(id).and_then(|r| r.last_status)
}

#[tokio::test]
async fn test_every_second_job_runs_and_persists_outcome() {
    let app = TestApp::new(&timetable(&[("tick", "* * * * * *", true)])).await;
    app.app.start().await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let mut status = None;
    while tokio::time::Instant::now() < deadline {
        status = app
            .store
            .get("tick")
            .await
            .unwrap()
            .and_then(|record| record.last_status);
        if status.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(status, Some(RunStatus::Success));
    app.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_skipped_step_leaves_task_successful() {
    let app = TestApp::new(SKIPPED_STEP).await;
    assert_eq!(fire_once(&app, "guarded").await, Some(RunStatus::Success));
}

#[tokio::test]
async fn test_process_lane_runs_configured_program() {
    let mut config = AppConfig::default();
    config.scheduler.process_program = Some("sh -c cat>/dev/null".to_string());
    let app = TestApp::with_config(PROCESS_LANE, config).await;
    assert_eq!(fire_once(&app, "child").await, Some(RunStatus::Success));

    let mut config = AppConfig::default();
    config.scheduler.process_program = Some("false".to_string());
    let app = TestApp::with_config(PROCESS_LANE, config).await;
    assert_eq!(fire_once(&app, "child").await, Some(RunStatus::Failed));
}

#[tokio::test]
async fn test_reconciled_jobs_allow_concurrent_instances() {
    let app = TestApp::new(&timetable(&[("a", "* * * * *", true)])).await;
    let record = app.scheduler().get_job("a").unwrap();
    assert_eq!(record.max_instances, 10);
    assert!(!record.coalesce);
}
