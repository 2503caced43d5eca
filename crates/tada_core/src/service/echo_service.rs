//! Echo report use-case service.
//!
//! # Responsibility
//! - Collect recent activity and ask the AI provider for an echo report.
//! - Store, list and delete reports.
//! - Guard scheduled generation so one day gets at most one automatic report.

use crate::ai::prompts::echo_request;
use crate::ai::{run_chat, AiError, AiProvider};
use crate::db::now_epoch_ms;
use crate::grouping::{compare_for_display, end_of_local_day_ms, start_of_local_day_ms};
use crate::model::profile::UserProfile;
use crate::model::summary::{EchoReport, EchoStyle};
use crate::model::task::Task;
use crate::repo::echo_repo::EchoReportRepository;
use crate::repo::task_repo::{TaskListQuery, TaskRepository};
use crate::repo::RepoError;
use chrono::{Days, NaiveDate};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Days of history an echo report looks back over.
pub const ACTIVITY_WINDOW_DAYS: u64 = 7;
/// Open tasks included in the prompt.
const MAX_PENDING_TASKS: usize = 30;

#[derive(Debug)]
pub enum EchoServiceError {
    ReportNotFound(String),
    Ai(AiError),
    Repo(RepoError),
}

impl Display for EchoServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReportNotFound(id) => write!(f, "echo report not found: {id}"),
            Self::Ai(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EchoServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ai(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::ReportNotFound(_) => None,
        }
    }
}

impl From<RepoError> for EchoServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::ReportNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<AiError> for EchoServiceError {
    fn from(value: AiError) -> Self {
        Self::Ai(value)
    }
}

/// What the user asked for when requesting a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoRequest {
    pub style: EchoStyle,
    pub job_types: Vec<String>,
    pub user_input: Option<String>,
}

impl Default for EchoRequest {
    fn default() -> Self {
        Self {
            style: EchoStyle::Balanced,
            job_types: Vec::new(),
            user_input: None,
        }
    }
}

/// Tasks completed in the window and tasks still open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentActivity {
    pub completed: Vec<Task>,
    pub pending: Vec<Task>,
}

/// Splits tasks into recently completed and open ones for `today`.
pub fn recent_activity(tasks: &[Task], today: NaiveDate) -> RecentActivity {
    let window_start = today
        .checked_sub_days(Days::new(ACTIVITY_WINDOW_DAYS - 1))
        .unwrap_or(today);
    let start_ms = start_of_local_day_ms(window_start);
    let end_ms = end_of_local_day_ms(today);

    let mut completed: Vec<Task> = tasks
        .iter()
        .filter(|task| !task.is_in_trash() && task.completed)
        .filter(|task| {
            task.completed_at
                .is_some_and(|at| (start_ms..=end_ms).contains(&at))
        })
        .cloned()
        .collect();
    completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

    let mut pending: Vec<Task> = tasks.iter().filter(|task| task.is_active()).cloned().collect();
    pending.sort_by(compare_for_display);
    pending.truncate(MAX_PENDING_TASKS);

    RecentActivity { completed, pending }
}

pub struct EchoService<T: TaskRepository, E: EchoReportRepository> {
    tasks: T,
    reports: E,
}

impl<T: TaskRepository, E: EchoReportRepository> EchoService<T, E> {
    pub fn new(tasks: T, reports: E) -> Self {
        Self { tasks, reports }
    }

    /// Whether a report was already created on local `date`.
    pub fn has_report_on(&self, date: NaiveDate) -> Result<bool, EchoServiceError> {
        let count = self
            .reports
            .count_between(start_of_local_day_ms(date), end_of_local_day_ms(date))?;
        Ok(count > 0)
    }

    pub fn activity(&self, today: NaiveDate) -> Result<RecentActivity, EchoServiceError> {
        let tasks = self.tasks.list_tasks(&TaskListQuery {
            include_completed: true,
            ..TaskListQuery::default()
        })?;
        Ok(recent_activity(&tasks, today))
    }

    pub async fn generate<P: AiProvider + ?Sized>(
        &self,
        provider: &P,
        profile: &UserProfile,
        request: EchoRequest,
        today: NaiveDate,
        language: &str,
    ) -> Result<EchoReport, EchoServiceError> {
        self.generate_with(provider, profile, request, today, language, None)
            .await
    }

    /// Streams the report text into `on_delta` while it is generated.
    pub async fn generate_streamed<P: AiProvider + ?Sized>(
        &self,
        provider: &P,
        profile: &UserProfile,
        request: EchoRequest,
        today: NaiveDate,
        language: &str,
        on_delta: &mut (dyn for<'d> FnMut(&'d str) + Send),
    ) -> Result<EchoReport, EchoServiceError> {
        self.generate_with(provider, profile, request, today, language, Some(on_delta))
            .await
    }

    async fn generate_with<P: AiProvider + ?Sized>(
        &self,
        provider: &P,
        profile: &UserProfile,
        request: EchoRequest,
        today: NaiveDate,
        language: &str,
        on_delta: Option<&mut (dyn for<'d> FnMut(&'d str) + Send)>,
    ) -> Result<EchoReport, EchoServiceError> {
        let activity = self.activity(today)?;
        let chat = echo_request(
            profile,
            &activity.completed,
            &activity.pending,
            request.style,
            &request.job_types,
            request.user_input.as_deref(),
            language,
        );
        let content = match run_chat(provider, &chat, on_delta).await {
            Ok(content) => content,
            Err(err) => {
                warn!("event=echo_generate module=service status=error error={err}");
                return Err(err.into());
            }
        };

        let report = EchoReport::new(
            content,
            request.job_types,
            request.style,
            request.user_input,
            now_epoch_ms(),
        );
        self.reports.create_report(&report)?;
        info!(
            "event=echo_generate module=service status=ok report_id={} completed={} pending={}",
            report.id,
            activity.completed.len(),
            activity.pending.len()
        );
        Ok(report)
    }

    /// Scheduled generation. Returns `None` when `today` already has a report.
    pub async fn generate_if_absent<P: AiProvider + ?Sized>(
        &self,
        provider: &P,
        profile: &UserProfile,
        request: EchoRequest,
        today: NaiveDate,
        language: &str,
    ) -> Result<Option<EchoReport>, EchoServiceError> {
        if self.has_report_on(today)? {
            info!("event=echo_schedule module=service status=skipped reason=already_generated");
            return Ok(None);
        }
        self.generate(provider, profile, request, today, language)
            .await
            .map(Some)
    }

    pub fn list(&self, limit: Option<u32>) -> Result<Vec<EchoReport>, EchoServiceError> {
        Ok(self.reports.list_reports(limit)?)
    }

    pub fn get(&self, id: &str) -> Result<EchoReport, EchoServiceError> {
        self.reports
            .get_report(id)?
            .ok_or_else(|| EchoServiceError::ReportNotFound(id.to_string()))
    }

    pub fn delete(&self, id: &str) -> Result<(), EchoServiceError> {
        Ok(self.reports.delete_report(id)?)
    }
}
