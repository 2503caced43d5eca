use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use rusqlite::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tada_core::ai::{AiError, AiProvider, AiResult, ChatRequest};
use tada_core::grouping::{local_today, start_of_local_day_ms};
use tada_core::model::profile::UserProfile;
use tada_core::model::settings::PreferenceSettings;
use tada_core::repo::echo_repo::SqliteEchoReportRepository;
use tada_core::repo::list_repo::SqliteListRepository;
use tada_core::repo::summary_repo::SqliteSummaryRepository;
use tada_core::repo::task_repo::SqliteTaskRepository;
use tada_core::service::echo_service::{EchoRequest, EchoService, EchoServiceError};
use tada_core::service::summary_service::{
    SummaryPeriod, SummaryService, SummaryServiceError, ALL_LISTS_KEY,
};
use tada_core::{open_db_in_memory, ListService, NewTask, TaskService};

/// Provider that answers every request with a fixed text and records the
/// last user prompt.
struct StubProvider {
    reply: Result<String, u16>,
    calls: AtomicUsize,
    streams: AtomicUsize,
    last_prompt: Mutex<String>,
}

impl StubProvider {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
            streams: AtomicUsize::new(0),
            last_prompt: Mutex::new(String::new()),
        }
    }

    fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            ..Self::replying("")
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> String {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiProvider for StubProvider {
    async fn complete(&self, request: &ChatRequest) -> AiResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = request.messages.last() {
            *self.last_prompt.lock().unwrap() = message.content.clone();
        }
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(AiError::Status {
                status: *status,
                body: "stub failure".to_string(),
            }),
        }
    }

    async fn stream(
        &self,
        request: &ChatRequest,
        on_delta: &mut (dyn for<'d> FnMut(&'d str) + Send),
    ) -> AiResult<String> {
        self.streams.fetch_add(1, Ordering::SeqCst);
        let text = self.complete(request).await?;
        for word in text.split_inclusive(' ') {
            on_delta(word);
        }
        Ok(text)
    }
}

fn task_service(conn: &Connection) -> TaskService<SqliteTaskRepository<'_>, SqliteListRepository<'_>> {
    TaskService::new(SqliteTaskRepository::new(conn), SqliteListRepository::new(conn))
}

fn summaries(conn: &Connection) -> SummaryService<SqliteTaskRepository<'_>, SqliteSummaryRepository<'_>> {
    SummaryService::new(SqliteTaskRepository::new(conn), SqliteSummaryRepository::new(conn))
}

fn echoes(conn: &Connection) -> EchoService<SqliteTaskRepository<'_>, SqliteEchoReportRepository<'_>> {
    EchoService::new(SqliteTaskRepository::new(conn), SqliteEchoReportRepository::new(conn))
}

fn add_due(conn: &Connection, title: &str, due: Option<NaiveDate>, list: Option<&str>) -> String {
    task_service(conn)
        .create_task(
            NewTask {
                due_date: due.map(start_of_local_day_ms),
                list_name: list.map(str::to_string),
                ..NewTask::titled(title)
            },
            &PreferenceSettings::default(),
        )
        .unwrap()
        .id
}

#[test]
fn summary_candidates_follow_period_list_and_trash_rules() {
    let conn = open_db_in_memory().unwrap();
    ListService::new(SqliteListRepository::new(&conn))
        .create_list("Work", None, None)
        .unwrap();
    let today = local_today();
    let far = today.checked_add_days(Days::new(90)).unwrap();

    let due_today = add_due(&conn, "Due today", Some(today), Some("Work"));
    let done = add_due(&conn, "Finished", None, None);
    task_service(&conn).complete_task(&done).unwrap();
    let trashed = add_due(&conn, "Discarded", Some(today), None);
    task_service(&conn).move_to_trash(&trashed).unwrap();
    add_due(&conn, "Next quarter", Some(far), None);

    let service = summaries(&conn);
    let all = service
        .candidates(SummaryPeriod::Today, ALL_LISTS_KEY, today)
        .unwrap();
    let ids: Vec<&str> = all.iter().map(|task| task.id.as_str()).collect();
    assert_eq!(all.len(), 2);
    assert_eq!(ids[0], done.as_str(), "completed tasks come first");
    assert!(ids.contains(&due_today.as_str()));

    let work_only = service.candidates(SummaryPeriod::Today, "work", today).unwrap();
    assert_eq!(work_only.len(), 1);
    assert_eq!(work_only[0].id, due_today);
}

#[tokio::test]
async fn generate_summary_stores_text_and_task_ids() {
    let conn = open_db_in_memory().unwrap();
    let today = local_today();
    let id = add_due(&conn, "Prepare slides", Some(today), None);
    let provider = StubProvider::replying("## Done\n- slides");
    let service = summaries(&conn);

    let summary = service
        .generate(&provider, SummaryPeriod::Today, ALL_LISTS_KEY, today, None, "en")
        .await
        .unwrap();

    assert_eq!(summary.summary_text, "## Done\n- slides");
    assert_eq!(summary.task_ids, vec![id]);
    assert_eq!(summary.period_key, "today");
    assert!(provider.last_prompt().contains("Prepare slides"));

    let latest = service
        .latest_for(SummaryPeriod::Today, ALL_LISTS_KEY)
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, summary.id);

    let edited = service.update_text(&summary.id, "  edited  ").unwrap();
    assert_eq!(edited.summary_text, "edited");

    service.delete(&summary.id).unwrap();
    assert!(service.list_all().unwrap().is_empty());
}

#[tokio::test]
async fn generate_summary_without_candidates_skips_provider() {
    let conn = open_db_in_memory().unwrap();
    let provider = StubProvider::replying("unused");

    let err = summaries(&conn)
        .generate(&provider, SummaryPeriod::ThisWeek, ALL_LISTS_KEY, local_today(), None, "en")
        .await
        .unwrap_err();

    assert!(matches!(err, SummaryServiceError::NoCandidates));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn failed_summary_is_not_stored() {
    let conn = open_db_in_memory().unwrap();
    let today = local_today();
    add_due(&conn, "Something", Some(today), None);
    let provider = StubProvider::failing(503);
    let service = summaries(&conn);

    let err = service
        .generate(&provider, SummaryPeriod::Today, ALL_LISTS_KEY, today, None, "en")
        .await
        .unwrap_err();

    assert!(matches!(err, SummaryServiceError::Ai(AiError::Status { status: 503, .. })));
    assert!(service.list_all().unwrap().is_empty());
}

#[tokio::test]
async fn custom_period_summaries_are_keyed_by_range() {
    let conn = open_db_in_memory().unwrap();
    let today = local_today();
    add_due(&conn, "In range", Some(today), None);
    let start = today.checked_sub_days(Days::new(1)).unwrap();
    let end = today.checked_add_days(Days::new(1)).unwrap();
    let period = SummaryPeriod::custom(start, end).unwrap();
    let provider = StubProvider::replying("custom");

    let summary = summaries(&conn)
        .generate(&provider, period, ALL_LISTS_KEY, today, None, "en")
        .await
        .unwrap();

    assert!(summary.period_key.starts_with("custom_"));
    assert_eq!(SummaryPeriod::parse(&summary.period_key).unwrap(), period);
}

#[tokio::test]
async fn scheduled_echo_runs_once_per_day() {
    let conn = open_db_in_memory().unwrap();
    let today = local_today();
    let done = add_due(&conn, "Fixed login bug", None, None);
    task_service(&conn).complete_task(&done).unwrap();
    add_due(&conn, "Write tests", Some(today), None);
    let provider = StubProvider::replying("Good week.");
    let service = echoes(&conn);
    let profile = UserProfile::default();

    assert!(!service.has_report_on(today).unwrap());

    let first = service
        .generate_if_absent(&provider, &profile, EchoRequest::default(), today, "en")
        .await
        .unwrap();
    let report = first.expect("first run generates a report");
    assert_eq!(report.content, "Good week.");
    assert!(provider.last_prompt().contains("Fixed login bug"));
    assert!(service.has_report_on(today).unwrap());

    let second = service
        .generate_if_absent(&provider, &profile, EchoRequest::default(), today, "en")
        .await
        .unwrap();
    assert!(second.is_none());
    assert_eq!(provider.calls(), 1);

    let tomorrow = today.checked_add_days(Days::new(1)).unwrap();
    assert!(!service.has_report_on(tomorrow).unwrap());
}

#[tokio::test]
async fn echo_reports_can_be_listed_fetched_and_deleted() {
    let conn = open_db_in_memory().unwrap();
    let provider = StubProvider::replying("Reflection text");
    let service = echoes(&conn);
    let request = EchoRequest {
        job_types: vec!["engineering".to_string()],
        user_input: Some("tired this week".to_string()),
        ..EchoRequest::default()
    };

    let report = service
        .generate(&provider, &UserProfile::default(), request, local_today(), "en")
        .await
        .unwrap();

    assert_eq!(report.job_types, vec!["engineering".to_string()]);
    assert!(provider.last_prompt().contains("tired this week"));
    assert_eq!(service.list(Some(10)).unwrap().len(), 1);
    assert_eq!(service.get(&report.id).unwrap(), report);

    service.delete(&report.id).unwrap();
    assert!(matches!(
        service.get(&report.id),
        Err(EchoServiceError::ReportNotFound(_))
    ));
}

#[tokio::test]
async fn streamed_summary_forwards_fragments_and_stores_full_text() {
    let conn = open_db_in_memory().unwrap();
    let today = local_today();
    add_due(&conn, "Review budget", Some(today), None);
    let provider = StubProvider::replying("Budget reviewed on time");
    let service = summaries(&conn);

    let mut fragments = Vec::new();
    let summary = service
        .generate_streamed(
            &provider,
            SummaryPeriod::Today,
            ALL_LISTS_KEY,
            today,
            None,
            "en",
            &mut |fragment: &str| fragments.push(fragment.to_string()),
        )
        .await
        .unwrap();

    assert_eq!(fragments.len(), 4);
    assert_eq!(fragments.concat(), "Budget reviewed on time");
    assert_eq!(summary.summary_text, "Budget reviewed on time");
    assert_eq!(provider.streams.load(Ordering::SeqCst), 1);
    assert_eq!(service.list_all().unwrap().len(), 1);
}

#[tokio::test]
async fn streamed_echo_failure_stores_nothing() {
    let conn = open_db_in_memory().unwrap();
    let provider = StubProvider::failing(500);
    let service = echoes(&conn);

    let mut fragments: Vec<String> = Vec::new();
    let err = service
        .generate_streamed(
            &provider,
            &UserProfile::default(),
            EchoRequest::default(),
            local_today(),
            "en",
            &mut |fragment: &str| fragments.push(fragment.to_string()),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EchoServiceError::Ai(AiError::Status { status: 500, .. })));
    assert!(fragments.is_empty());
    assert!(service.list(None).unwrap().is_empty());
}
