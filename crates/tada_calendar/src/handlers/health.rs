use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /healthz - Liveness plus the number of tasks currently served.
#[axum::debug_handler]
pub async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let tasks = state.tasks.read().await.len();
    Json(json!({ "status": "ok", "tasks": tasks }))
}
