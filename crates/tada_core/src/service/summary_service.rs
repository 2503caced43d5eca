//! AI summary use-case service.
//!
//! # Responsibility
//! - Resolve summary periods into local-time millisecond ranges.
//! - Select candidate tasks for a period and list.
//! - Generate, store and edit summaries.
//!
//! # Invariants
//! - Trash tasks are never summary candidates.
//! - A task's reference timestamp is `completed_at` when completed, else
//!   `due_date` when set, else `updated_at`.
//! - Weeks start on Monday.

use crate::ai::prompts::summary_request;
use crate::ai::{run_chat, AiError, AiProvider};
use crate::db::now_epoch_ms;
use crate::grouping::{compare_for_display, end_of_local_day_ms, start_of_local_day_ms};
use crate::model::list::same_list_name;
use crate::model::profile::UserProfile;
use crate::model::summary::StoredSummary;
use crate::model::task::Task;
use crate::repo::summary_repo::SummaryRepository;
use crate::repo::task_repo::{TaskListQuery, TaskRepository};
use crate::repo::RepoError;
use chrono::{Datelike, Days, Months, NaiveDate};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// List key meaning "every list".
pub const ALL_LISTS_KEY: &str = "all";
const CUSTOM_PREFIX: &str = "custom_";

#[derive(Debug)]
pub enum SummaryServiceError {
    InvalidPeriod(String),
    /// Nothing to summarize for the chosen period and list.
    NoCandidates,
    SummaryNotFound(String),
    Ai(AiError),
    Repo(RepoError),
}

impl Display for SummaryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPeriod(value) => write!(f, "invalid summary period: {value}"),
            Self::NoCandidates => write!(f, "no tasks in the selected period"),
            Self::SummaryNotFound(id) => write!(f, "summary not found: {id}"),
            Self::Ai(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SummaryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ai(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SummaryServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity: "summary", id } => Self::SummaryNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<AiError> for SummaryServiceError {
    fn from(value: AiError) -> Self {
        Self::Ai(value)
    }
}

/// Period a summary covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryPeriod {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    /// Inclusive local-day range.
    Custom { start: NaiveDate, end: NaiveDate },
}

impl SummaryPeriod {
    /// Stable key used in stored summaries.
    pub fn key(&self) -> String {
        match self {
            Self::Today => "today".to_string(),
            Self::Yesterday => "yesterday".to_string(),
            Self::ThisWeek => "thisWeek".to_string(),
            Self::LastWeek => "lastWeek".to_string(),
            Self::ThisMonth => "thisMonth".to_string(),
            Self::LastMonth => "lastMonth".to_string(),
            Self::Custom { start, end } => format!(
                "{CUSTOM_PREFIX}{}_{}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
        }
    }

    pub fn parse(value: &str) -> Result<Self, SummaryServiceError> {
        let invalid = || SummaryServiceError::InvalidPeriod(value.to_string());
        match value {
            "today" => Ok(Self::Today),
            "yesterday" => Ok(Self::Yesterday),
            "thisWeek" => Ok(Self::ThisWeek),
            "lastWeek" => Ok(Self::LastWeek),
            "thisMonth" => Ok(Self::ThisMonth),
            "lastMonth" => Ok(Self::LastMonth),
            other => {
                let range = other.strip_prefix(CUSTOM_PREFIX).ok_or_else(invalid)?;
                let (start, end) = range.split_once('_').ok_or_else(invalid)?;
                let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").map_err(|_| invalid())?;
                let end = NaiveDate::parse_from_str(end, "%Y-%m-%d").map_err(|_| invalid())?;
                Self::custom(start, end)
            }
        }
    }

    pub fn custom(start: NaiveDate, end: NaiveDate) -> Result<Self, SummaryServiceError> {
        if start > end {
            return Err(SummaryServiceError::InvalidPeriod(format!(
                "{start} is after {end}"
            )));
        }
        Ok(Self::Custom { start, end })
    }

    pub fn label(&self) -> String {
        match self {
            Self::Today => "Today".to_string(),
            Self::Yesterday => "Yesterday".to_string(),
            Self::ThisWeek => "This week".to_string(),
            Self::LastWeek => "Last week".to_string(),
            Self::ThisMonth => "This month".to_string(),
            Self::LastMonth => "Last month".to_string(),
            Self::Custom { start, end } => format!("{start} to {end}"),
        }
    }

    /// Inclusive local-day bounds relative to `today`.
    pub fn day_bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let week_start = today
            .checked_sub_days(Days::new(u64::from(today.weekday().num_days_from_monday())))
            .unwrap_or(today);
        let month_start = today.with_day(1).unwrap_or(today);
        match *self {
            Self::Today => (today, today),
            Self::Yesterday => {
                let day = today.pred_opt().unwrap_or(today);
                (day, day)
            }
            Self::ThisWeek => (week_start, add_days(week_start, 6)),
            Self::LastWeek => {
                let start = week_start.checked_sub_days(Days::new(7)).unwrap_or(week_start);
                (start, add_days(start, 6))
            }
            Self::ThisMonth => (month_start, last_day_of_month(month_start)),
            Self::LastMonth => {
                let start = month_start
                    .checked_sub_months(Months::new(1))
                    .unwrap_or(month_start);
                (start, last_day_of_month(start))
            }
            Self::Custom { start, end } => (start, end),
        }
    }

    pub fn range(&self, today: NaiveDate) -> DateRange {
        let (start, end) = self.day_bounds(today);
        DateRange {
            start_ms: start_of_local_day_ms(start),
            end_ms: end_of_local_day_ms(end),
        }
    }
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(date)
}

fn last_day_of_month(month_start: NaiveDate) -> NaiveDate {
    month_start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(month_start)
}

/// Inclusive epoch-ms range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl DateRange {
    pub fn contains(&self, epoch_ms: i64) -> bool {
        (self.start_ms..=self.end_ms).contains(&epoch_ms)
    }
}

/// Timestamp that places a task inside a period.
pub fn reference_timestamp(task: &Task) -> i64 {
    if task.completed {
        if let Some(completed_at) = task.completed_at {
            return completed_at;
        }
    } else if let Some(due_date) = task.due_date {
        return due_date;
    }
    task.updated_at
}

/// Tasks eligible for a summary of `range` restricted to `list_key`.
pub fn filter_candidates(tasks: &[Task], range: DateRange, list_key: &str) -> Vec<Task> {
    let all_lists = list_key.eq_ignore_ascii_case(ALL_LISTS_KEY);
    let mut candidates: Vec<Task> = tasks
        .iter()
        .filter(|task| !task.is_in_trash())
        .filter(|task| all_lists || same_list_name(&task.list_name, list_key))
        .filter(|task| range.contains(reference_timestamp(task)))
        .cloned()
        .collect();
    candidates.sort_by(|a, b| b.completed.cmp(&a.completed).then_with(|| compare_for_display(a, b)));
    candidates
}

pub struct SummaryService<T: TaskRepository, S: SummaryRepository> {
    tasks: T,
    summaries: S,
}

impl<T: TaskRepository, S: SummaryRepository> SummaryService<T, S> {
    pub fn new(tasks: T, summaries: S) -> Self {
        Self { tasks, summaries }
    }

    pub fn candidates(
        &self,
        period: SummaryPeriod,
        list_key: &str,
        today: NaiveDate,
    ) -> Result<Vec<Task>, SummaryServiceError> {
        let tasks = self.tasks.list_tasks(&TaskListQuery {
            include_completed: true,
            ..TaskListQuery::default()
        })?;
        Ok(filter_candidates(&tasks, period.range(today), list_key))
    }

    /// Generates and stores a new summary.
    pub async fn generate<P: AiProvider + ?Sized>(
        &self,
        provider: &P,
        period: SummaryPeriod,
        list_key: &str,
        today: NaiveDate,
        profile: Option<&UserProfile>,
        language: &str,
    ) -> Result<StoredSummary, SummaryServiceError> {
        self.generate_with(provider, period, list_key, today, profile, language, None)
            .await
    }

    /// Like [`Self::generate`], forwarding text fragments to `on_delta` as
    /// the provider streams them. Only the finished text is stored.
    #[allow(clippy::too_many_arguments)]
    pub async fn generate_streamed<P: AiProvider + ?Sized>(
        &self,
        provider: &P,
        period: SummaryPeriod,
        list_key: &str,
        today: NaiveDate,
        profile: Option<&UserProfile>,
        language: &str,
        on_delta: &mut (dyn for<'d> FnMut(&'d str) + Send),
    ) -> Result<StoredSummary, SummaryServiceError> {
        self.generate_with(provider, period, list_key, today, profile, language, Some(on_delta))
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn generate_with<P: AiProvider + ?Sized>(
        &self,
        provider: &P,
        period: SummaryPeriod,
        list_key: &str,
        today: NaiveDate,
        profile: Option<&UserProfile>,
        language: &str,
        on_delta: Option<&mut (dyn for<'d> FnMut(&'d str) + Send)>,
    ) -> Result<StoredSummary, SummaryServiceError> {
        let candidates = self.candidates(period, list_key, today)?;
        if candidates.is_empty() {
            return Err(SummaryServiceError::NoCandidates);
        }
        let list_label = if list_key.eq_ignore_ascii_case(ALL_LISTS_KEY) {
            "All lists"
        } else {
            list_key
        };
        let request = summary_request(&period.label(), list_label, &candidates, profile, language);
        let text = match run_chat(provider, &request, on_delta).await {
            Ok(text) => text,
            Err(err) => {
                warn!("event=summary_generate module=service status=error error={err}");
                return Err(err.into());
            }
        };

        let task_ids = candidates.iter().map(|task| task.id.clone()).collect();
        let summary = StoredSummary::new(period.key(), list_key, task_ids, text, now_epoch_ms());
        self.summaries.create_summary(&summary)?;
        info!(
            "event=summary_generate module=service status=ok summary_id={} tasks={}",
            summary.id,
            summary.task_ids.len()
        );
        Ok(summary)
    }

    /// Stored summaries for a period/list, newest first.
    pub fn summaries_for(
        &self,
        period: SummaryPeriod,
        list_key: &str,
    ) -> Result<Vec<StoredSummary>, SummaryServiceError> {
        Ok(self.summaries.list_for(&period.key(), list_key)?)
    }

    pub fn latest_for(
        &self,
        period: SummaryPeriod,
        list_key: &str,
    ) -> Result<Option<StoredSummary>, SummaryServiceError> {
        Ok(self.summaries_for(period, list_key)?.into_iter().next())
    }

    pub fn list_all(&self) -> Result<Vec<StoredSummary>, SummaryServiceError> {
        Ok(self.summaries.list_all()?)
    }

    pub fn update_text(&self, id: &str, text: &str) -> Result<StoredSummary, SummaryServiceError> {
        self.summaries.update_summary_text(id, text.trim(), now_epoch_ms())?;
        self.summaries
            .get_summary(id)?
            .ok_or_else(|| SummaryServiceError::SummaryNotFound(id.to_string()))
    }

    pub fn delete(&self, id: &str) -> Result<(), SummaryServiceError> {
        Ok(self.summaries.delete_summary(id)?)
    }
}
