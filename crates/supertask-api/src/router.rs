//! Route definitions for the HTTP facade.

use std::time::Instant;

use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::state::ApiState;

/// Build the router with all routes and middleware.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/jobs", get(handlers::jobs::list_jobs))
        .route("/jobs/{id}", get(handlers::jobs::get_job))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}

/// Logs request method, path, status, and duration.
async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "HTTP request"
    );
    response
}
