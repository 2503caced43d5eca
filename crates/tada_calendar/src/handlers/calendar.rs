use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tada_core::export::{render_calendar, IcsOptions};

use crate::state::AppState;

/// GET /calendar.ics - Render the last synced tasks as iCalendar.
#[axum::debug_handler]
pub async fn calendar_ics(State(state): State<AppState>) -> Response {
    let options = IcsOptions {
        calendar_name: state.calendar.calendar_name.clone(),
        reminder_minutes: state.calendar.reminder_minutes,
        generated_at: Utc::now(),
    };
    let body = {
        let tasks = state.tasks.read().await;
        render_calendar(&tasks, &options)
    };

    (
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}
