//! The coordinator's RPC surface (spec §6): `/work/request`, `/work/report-failure`,
//! `/stats`, `/health`. Shapes are JSON over HTTP; nothing here is load-bearing
//! beyond the field names workers agree on.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::coordinator::Coordinator;

pub fn router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/work/request", post(request_work))
        .route("/work/report-failure", post(report_failure))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(coordinator)
}

#[derive(Deserialize)]
struct RequestWorkBody {
    worker_id: String,
    batch_size: usize,
    max_articles_per_domain: usize,
}

async fn request_work(
    State(coordinator): State<Arc<Coordinator>>,
    Json(body): Json<RequestWorkBody>,
) -> impl IntoResponse {
    match coordinator
        .request_work(&body.worker_id, body.batch_size, body.max_articles_per_domain)
        .await
    {
        Ok(batch) => Json(serde_json::json!(batch)).into_response(),
        Err(e) => {
            warn!(error = %e, worker_id = %body.worker_id, "request_work failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({"error": e.to_string()}))).into_response()
        }
    }
}

#[derive(Deserialize)]
struct ReportFailureBody {
    worker_id: String,
    domain: String,
}

async fn report_failure(
    State(coordinator): State<Arc<Coordinator>>,
    Json(body): Json<ReportFailureBody>,
) -> impl IntoResponse {
    match coordinator.report_failure(&body.worker_id, &body.domain).await {
        Ok(()) => Json(serde_json::json!({"status": "success"})).into_response(),
        Err(e) => {
            warn!(error = %e, worker_id = %body.worker_id, domain = %body.domain, "report_failure failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"status": "error", "error": e.to_string()})),
            )
                .into_response()
        }
    }
}

async fn stats(State(coordinator): State<Arc<Coordinator>>) -> impl IntoResponse {
    match coordinator.stats().await {
        Ok(stats) => Json(serde_json::json!(stats)).into_response(),
        Err(e) => {
            warn!(error = %e, "stats failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({"error": e.to_string()}))).into_response()
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "healthy"}))
}
