//! Integration tests for the read-only HTTP facade.

mod helpers;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use helpers::{TestApp, timetable};
use supertask_api::{ApiState, build_router};

async fn get(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    let router = build_router(ApiState::new(app.scheduler().clone()));
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_jobs_endpoint_lists_summaries() {
    let app = TestApp::new(&timetable(&[("alpha", "*/5 * * * *", true), ("beta", "0 * * * *", true)])).await;
    app.app.start().await.unwrap();

    let (status, body) = get(&app, "/jobs").await;
    assert_eq!(status, StatusCode::OK);
    let jobs = body.as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    let alpha = jobs.iter().find(|j| j["id"] == "alpha").unwrap();
    assert_eq!(alpha["trigger_cron"], "*/5 * * * *");
    assert_eq!(alpha["exec_python_ref"], "supertask:echo");
    assert_eq!(alpha["exec_args"], serde_json::json!(["alpha"]));
    assert_eq!(alpha["enabled"], true);
    assert!(alpha["next_run_time"].is_string());

    app.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_single_job_and_missing_job() {
    let app = TestApp::new(&timetable(&[("alpha", "*/5 * * * *", true)])).await;

    let (status, body) = get(&app, "/jobs/alpha").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "alpha");

    let (status, body) = get(&app, "/jobs/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_health_reports_store() {
    let app = TestApp::new(&timetable(&[("alpha", "*/5 * * * *", true)])).await;
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["jobs"], 1);
    assert_eq!(body["scheduler_running"], false);
}
