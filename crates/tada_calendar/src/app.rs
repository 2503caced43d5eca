use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    handlers::{calendar::calendar_ics, health::healthz, sync::sync_tasks},
    state::AppState,
};

const MAX_SYNC_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Create the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/calendar.ics", get(calendar_ics))
        .route("/api/sync", post(sync_tasks))
        .layer(DefaultBodyLimit::max(MAX_SYNC_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        handlers::sync::SyncResponse,
        state::CalendarConfig,
        store::{SyncedTasks, TaskStore},
    };
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tada_core::grouping::{local_today, start_of_local_day_ms};
    use tada_core::model::task::TRASH_LIST_NAME;
    use tada_core::Task;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_state() -> (AppState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.json"));
        (AppState::new(store, CalendarConfig::default()), dir)
    }

    fn due_task(title: &str) -> Task {
        let mut task = Task::new(title, 1);
        task.due_date = Some(start_of_local_day_ms(local_today()));
        task
    }

    fn sync_request(tasks: &[Task]) -> Request<Body> {
        let body = serde_json::to_vec(&serde_json::json!({ "tasks": tasks })).unwrap();
        Request::builder()
            .method("POST")
            .uri("/api/sync")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_healthz() {
        let (state, _dir) = test_state();
        let app = create_app(state);

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_calendar_is_empty_before_first_sync() {
        let (state, _dir) = test_state();
        let app = create_app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/calendar.ics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/calendar; charset=utf-8"
        );
        let ics = body_string(response).await;
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
        assert!(!ics.contains("BEGIN:VEVENT"));
    }

    #[tokio::test]
    async fn test_sync_persists_and_feeds_calendar() {
        let (state, _dir) = test_state();
        let app = create_app(state.clone());

        let mut done = due_task("Already done");
        done.completed = true;
        let mut trashed = due_task("Thrown away");
        trashed.list_name = TRASH_LIST_NAME.to_string();
        let undated = Task::new("Someday", 1);
        let tasks = vec![due_task("Dentist"), done, trashed, undated];

        let response = app.clone().oneshot(sync_request(&tasks)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let reply: SyncResponse = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(reply, SyncResponse { ok: true, count: 4 });

        let saved: SyncedTasks =
            serde_json::from_str(&std::fs::read_to_string(state.store.path()).unwrap()).unwrap();
        assert_eq!(saved.tasks.len(), 4);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/calendar.ics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let ics = body_string(response).await;
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 1);
        assert!(ics.contains("SUMMARY:Dentist"));
        assert!(ics.contains("BEGIN:VALARM"));
    }

    #[tokio::test]
    async fn test_sync_rejects_duplicate_ids() {
        let (state, _dir) = test_state();
        let app = create_app(state.clone());
        let task = due_task("Twice");

        let response = app
            .oneshot(sync_request(&[task.clone(), task]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!state.store.path().exists());
    }

    #[tokio::test]
    async fn test_sync_rejects_malformed_body() {
        let (state, _dir) = test_state();
        let app = create_app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sync")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"tasks": "nope"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_state_load_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.json"));
        store
            .save(&SyncedTasks {
                synced_at: 7,
                tasks: vec![due_task("Carried over")],
            })
            .await
            .unwrap();

        let state = AppState::load(store, CalendarConfig::default()).await.unwrap();

        assert_eq!(state.tasks.read().await.len(), 1);
    }
}
