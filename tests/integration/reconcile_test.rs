//! Integration tests for timetable reconciliation.

mod helpers;

use helpers::{TestApp, timetable};
use supertask_core::error::ErrorKind;

#[tokio::test]
async fn test_reconcile_removes_adds_and_reschedules() {
    let app = TestApp::new(&timetable(&[("A", "*/5 * * * *", true), ("B", "0 * * * *", true)])).await;
    app.app.start().await.unwrap();
    assert_eq!(app.live_ids().await, vec!["A", "B"]);

    app.rewrite(&timetable(&[("B", "30 * * * *", true), ("C", "0 9 * * 1-5", true)]));
    let report = app.reconciler().reconcile().await.unwrap();

    assert_eq!(report.removed, 1);
    assert_eq!(report.added, 1);
    assert_eq!(report.replaced, 1);
    assert_eq!(app.live_ids().await, vec!["B", "C"]);

    let b = app.scheduler().get_job("B").unwrap();
    assert_eq!(b.trigger.expressions, vec!["30 * * * *".to_string()]);
    assert!(app.scheduler().get_job("A").is_none());
    app.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_repeated_reconcile_is_idempotent() {
    let app = TestApp::new(&timetable(&[("A", "0 0 1 1 *", true), ("B", "30 0 1 1 *", true)])).await;
    app.app.start().await.unwrap();

    app.rewrite(&timetable(&[("A", "15 0 1 1 *", true), ("B", "30 0 1 1 *", true)]));
    let first = app.reconciler().reconcile().await.unwrap();
    assert_eq!(first.replaced, 1);
    assert_eq!(first.unchanged, 1);

    let before = app.store.mutations();
    let second = app.reconciler().reconcile().await.unwrap();
    assert!(!second.changed());
    assert_eq!(second.unchanged, 2);
    assert_eq!(app.store.mutations(), before);
    app.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_reload_keeps_schedule() {
    let app = TestApp::new(&timetable(&[("A", "0 0 1 1 *", true)])).await;
    app.app.start().await.unwrap();
    let before = app.store.mutations();

    app.rewrite("tasks: [\n  {broken");
    assert!(app.reconciler().reconcile().await.is_err());

    app.rewrite(&timetable(&[("B", "61 * * * *", true)]));
    let err = app.reconciler().reconcile().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    assert_eq!(app.live_ids().await, vec!["A"]);
    assert_eq!(app.store.mutations(), before);
    app.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_disabling_a_task_removes_its_job() {
    let app = TestApp::new(&timetable(&[("A", "*/5 * * * *", true), ("B", "0 * * * *", true)])).await;
    app.app.start().await.unwrap();

    app.rewrite(&timetable(&[("A", "*/5 * * * *", true), ("B", "0 * * * *", false)]));
    let report = app.reconciler().reconcile().await.unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(app.live_ids().await, vec!["A"]);
    app.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reconcile_before_start_only_touches_pending_set() {
    let app = TestApp::new(&timetable(&[("A", "*/5 * * * *", true)])).await;
    app.rewrite(&timetable(&[("A", "*/5 * * * *", true), ("B", "0 * * * *", true)]));

    let report = app.reconciler().reconcile().await.unwrap();
    assert_eq!(report.added, 1);
    assert_eq!(app.store.mutations(), 0);

    app.app.start().await.unwrap();
    assert_eq!(app.live_ids().await, vec!["A", "B"]);
    app.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_restart_drops_tasks_deleted_while_down() {
    let app = TestApp::new(&timetable(&[("keep", "0 0 1 1 *", true), ("gone", "30 0 1 1 *", true)])).await;
    app.app.start().await.unwrap();
    app.app.shutdown().await.unwrap();

    app.rewrite(&timetable(&[("keep", "0 0 1 1 *", true)]));
    let restarted = app.reopen().await;
    restarted.start().await.unwrap();

    assert_eq!(app.live_ids().await, vec!["keep"]);
    assert_eq!(restarted.scheduler().live_job_ids().await.unwrap().len(), 1);
    assert!(restarted.scheduler().get_job("gone").is_none());

    let before = app.store.mutations();
    let report = restarted.reconciler().unwrap().reconcile().await.unwrap();
    assert!(!report.changed());
    assert_eq!(report.unchanged, 1);
    assert_eq!(app.store.mutations(), before);
    restarted.shutdown().await.unwrap();
}
