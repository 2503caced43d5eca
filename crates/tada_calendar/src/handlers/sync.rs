use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tada_core::db::now_epoch_ms;
use tada_core::Task;

use super::error::AppError;
use crate::state::AppState;
use crate::store::{validate_tasks, SyncedTasks};

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncResponse {
    pub ok: bool,
    pub count: usize,
}

/// POST /api/sync - Replace the synced task list and persist it.
#[axum::debug_handler]
pub async fn sync_tasks(
    State(state): State<AppState>,
    Json(payload): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, AppError> {
    validate_tasks(&payload.tasks)?;

    // Hold the write lock across the file write so concurrent syncs land in order.
    let mut tasks = state.tasks.write().await;
    let data = SyncedTasks {
        synced_at: now_epoch_ms(),
        tasks: payload.tasks,
    };
    state.store.save(&data).await?;
    let count = data.tasks.len();
    *tasks = data.tasks;

    tracing::info!(count, path = %state.store.path().display(), "tasks synced");
    Ok(Json(SyncResponse { ok: true, count }))
}
