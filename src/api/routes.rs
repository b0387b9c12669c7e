//! API route definitions.

use super::state::AppState;
use crate::ingest::Submission;
use crate::window::StoreError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/reset", post(reset))
        .route("/windows", get(list_windows))
}

fn meta() -> Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "mode": state.coordinator.mode(),
            "capacity": state.coordinator.store().capacity(),
            "windows": state.coordinator.store().len()
        },
        "meta": meta()
    }))
}

/// Ingest one submission. The body is decoded in two stages so that a
/// shape mismatch surfaces as a malformed-submission error rather than
/// a bare transport rejection.
async fn ingest(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let submission: Submission = match serde_json::from_value(body) {
        Ok(submission) => submission,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("malformed submission: {err}"), "meta": meta() })),
            )
        }
    };

    match state.coordinator.process(&submission) {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({ "data": report, "meta": meta() })),
        ),
        Err(err) => {
            tracing::warn!(%err, stream = %submission.stream, "rejected submission");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string(), "meta": meta() })),
            )
        }
    }
}

#[derive(serde::Deserialize)]
struct ResetRequest {
    key: String,
}

async fn reset(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> (StatusCode, Json<Value>) {
    match state.coordinator.reset(&request.key) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "data": { "reset": request.key }, "meta": meta() })),
        ),
        Err(err @ StoreError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string(), "meta": meta() })),
        ),
    }
}

async fn list_windows(State(state): State<AppState>) -> Json<Value> {
    let windows = state.coordinator.store().overview();
    let total = windows.len();
    Json(json!({
        "data": { "windows": windows },
        "meta": { "total": total }
    }))
}
