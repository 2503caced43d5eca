//! Task domain model.
//!
//! # Responsibility
//! - Define the task and subtask records shared by storage, sync and export.
//! - Provide lifecycle helpers for completion and Trash semantics.
//!
//! # Invariants
//! - `id` is stable and never reused for another task.
//! - A completed task has `completed_at` set and `complete_percentage == Some(100)`.
//! - `list_name` is a denormalized copy of the owning list name.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable task identifier. Kept as a string because synced and imported
/// data may carry ids that are not UUIDs.
pub type TaskId = String;

/// Name of the built-in list every new task lands in by default.
pub const INBOX_LIST_NAME: &str = "Inbox";
/// Row id of the seeded Inbox list.
pub const INBOX_LIST_ID: &str = "inbox-default";
/// Name of the virtual list holding deleted tasks.
pub const TRASH_LIST_NAME: &str = "Trash";

/// Highest priority value.
pub const PRIORITY_HIGH: u8 = 1;
/// Lowest priority value.
pub const PRIORITY_LOW: u8 = 3;

/// Date bucket a task is displayed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskGroupCategory {
    Overdue,
    Today,
    #[serde(rename = "next7days")]
    Next7Days,
    Later,
    #[serde(rename = "nodate")]
    NoDate,
}

impl TaskGroupCategory {
    /// Display order of buckets in grouped views.
    pub const ORDERED: [TaskGroupCategory; 5] = [
        Self::Overdue,
        Self::Today,
        Self::Next7Days,
        Self::Later,
        Self::NoDate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::Today => "today",
            Self::Next7Days => "next7days",
            Self::Later => "later",
            Self::NoDate => "nodate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "overdue" => Some(Self::Overdue),
            "today" => Some(Self::Today),
            "next7days" => Some(Self::Next7Days),
            "later" => Some(Self::Later),
            "nodate" => Some(Self::NoDate),
            _ => None,
        }
    }

    /// Human label used by text front-ends.
    pub fn label(self) -> &'static str {
        match self {
            Self::Overdue => "Overdue",
            Self::Today => "Today",
            Self::Next7Days => "Next 7 Days",
            Self::Later => "Later",
            Self::NoDate => "No Date",
        }
    }
}

/// Validation errors for task records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyId,
    EmptyTitle,
    EmptyListName,
    InvalidPercentage(u8),
    InvalidPriority(u8),
    CompletedWithoutTimestamp,
    /// Completed task whose percentage is not `Some(100)`.
    CompletedWithPartialProgress(Option<u8>),
    /// Open task that still carries `completed_at`.
    OpenWithCompletionTimestamp,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "task id must not be empty"),
            Self::EmptyTitle => write!(f, "task title must not be blank"),
            Self::EmptyListName => write!(f, "task list name must not be blank"),
            Self::InvalidPercentage(value) => {
                write!(f, "completion percentage must be 0..=100, got {value}")
            }
            Self::InvalidPriority(value) => write!(
                f,
                "priority must be {PRIORITY_HIGH}..={PRIORITY_LOW}, got {value}"
            ),
            Self::CompletedWithoutTimestamp => {
                write!(f, "completed task must carry completed_at")
            }
            Self::CompletedWithPartialProgress(value) => {
                write!(f, "completed task must be at 100%, got {value:?}")
            }
            Self::OpenWithCompletionTimestamp => {
                write!(f, "open task must not carry completed_at")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// Checklist item nested under one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub parent_id: TaskId,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub order: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Subtask {
    pub fn new(parent_id: impl Into<TaskId>, title: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: parent_id.into(),
            title: title.into(),
            completed: false,
            completed_at: None,
            due_date: None,
            order: 0,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }
}

/// Canonical to-do record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub complete_percentage: Option<u8>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub list_id: Option<String>,
    pub list_name: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub order: i64,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    /// 1 (high) to 3 (low).
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default = "default_group_category")]
    pub group_category: TaskGroupCategory,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

fn default_group_category() -> TaskGroupCategory {
    TaskGroupCategory::NoDate
}

impl Task {
    /// Creates a new Inbox task with a generated id.
    pub fn new(title: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            completed: false,
            completed_at: None,
            complete_percentage: None,
            due_date: None,
            list_id: Some(INBOX_LIST_ID.to_string()),
            list_name: INBOX_LIST_NAME.to_string(),
            content: None,
            order: 0,
            created_at: now_ms,
            updated_at: now_ms,
            tags: Vec::new(),
            priority: None,
            group_category: TaskGroupCategory::NoDate,
            subtasks: Vec::new(),
        }
    }

    /// Checks record-level invariants before persistence.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.id.trim().is_empty() {
            return Err(TaskValidationError::EmptyId);
        }
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        if self.list_name.trim().is_empty() {
            return Err(TaskValidationError::EmptyListName);
        }
        if let Some(value) = self.complete_percentage {
            if value > 100 {
                return Err(TaskValidationError::InvalidPercentage(value));
            }
        }
        if let Some(value) = self.priority {
            if !(PRIORITY_HIGH..=PRIORITY_LOW).contains(&value) {
                return Err(TaskValidationError::InvalidPriority(value));
            }
        }
        if self.completed {
            if self.completed_at.is_none() {
                return Err(TaskValidationError::CompletedWithoutTimestamp);
            }
            if self.complete_percentage != Some(100) {
                return Err(TaskValidationError::CompletedWithPartialProgress(
                    self.complete_percentage,
                ));
            }
        } else if self.completed_at.is_some() {
            return Err(TaskValidationError::OpenWithCompletionTimestamp);
        }
        Ok(())
    }

    pub fn is_in_trash(&self) -> bool {
        self.list_name == TRASH_LIST_NAME
    }

    /// Active tasks are neither completed nor trashed.
    pub fn is_active(&self) -> bool {
        !self.completed && !self.is_in_trash()
    }

    pub fn complete(&mut self, now_ms: i64) {
        self.completed = true;
        self.completed_at = Some(now_ms);
        self.complete_percentage = Some(100);
        self.updated_at = now_ms;
    }

    pub fn reopen(&mut self, now_ms: i64) {
        self.completed = false;
        self.completed_at = None;
        self.complete_percentage = None;
        self.updated_at = now_ms;
    }

    /// Sets progress; reaching 100 completes the task, lowering it reopens it.
    pub fn set_percentage(&mut self, percentage: Option<u8>, now_ms: i64) {
        match percentage {
            Some(100) => self.complete(now_ms),
            other => {
                self.completed = false;
                self.completed_at = None;
                self.complete_percentage = other.filter(|value| *value > 0);
                self.updated_at = now_ms;
            }
        }
    }

    /// Makes completion fields agree with `completed` for records that did
    /// not pass through [`Task::complete`]. A missing completion time falls
    /// back to `updated_at`; an open task loses `completed_at` and a 100%
    /// progress value.
    pub fn normalize_completion(&mut self) {
        if self.completed {
            self.completed_at = self.completed_at.or(Some(self.updated_at));
            self.complete_percentage = Some(100);
        } else {
            self.completed_at = None;
            self.complete_percentage = self
                .complete_percentage
                .filter(|value| (1..100).contains(value));
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|value| value.eq_ignore_ascii_case(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::{Task, TaskGroupCategory, TaskValidationError};

    #[test]
    fn set_percentage_100_completes_and_lower_reopens() {
        let mut task = Task::new("write report", 1_000);
        task.set_percentage(Some(100), 2_000);
        assert!(task.completed);
        assert_eq!(task.completed_at, Some(2_000));

        task.set_percentage(Some(40), 3_000);
        assert!(!task.completed);
        assert_eq!(task.completed_at, None);
        assert_eq!(task.complete_percentage, Some(40));
    }

    #[test]
    fn validate_rejects_blank_title_and_bad_priority() {
        let mut task = Task::new("   ", 0);
        assert_eq!(task.validate(), Err(TaskValidationError::EmptyTitle));

        task.title = "ok".to_string();
        task.priority = Some(7);
        assert_eq!(task.validate(), Err(TaskValidationError::InvalidPriority(7)));
    }

    #[test]
    fn validate_enforces_completion_fields() {
        let mut task = Task::new("half done", 0);
        task.completed = true;
        task.completed_at = Some(10);
        task.complete_percentage = Some(40);
        assert_eq!(
            task.validate(),
            Err(TaskValidationError::CompletedWithPartialProgress(Some(40)))
        );

        let mut open = Task::new("open", 0);
        open.completed_at = Some(10);
        assert_eq!(
            open.validate(),
            Err(TaskValidationError::OpenWithCompletionTimestamp)
        );
    }

    #[test]
    fn normalize_completion_repairs_synced_records() {
        let mut done = Task::new("synced done", 0);
        done.updated_at = 50;
        done.completed = true;
        done.complete_percentage = Some(40);
        done.normalize_completion();
        assert_eq!(done.complete_percentage, Some(100));
        assert_eq!(done.completed_at, Some(50));
        assert_eq!(done.validate(), Ok(()));

        let mut open = Task::new("synced open", 0);
        open.completed_at = Some(7);
        open.complete_percentage = Some(100);
        open.normalize_completion();
        assert_eq!(open.completed_at, None);
        assert_eq!(open.complete_percentage, None);
        assert_eq!(open.validate(), Ok(()));
    }

    #[test]
    fn serializes_with_camel_case_and_category_names() {
        let mut task = Task::new("sync me", 5);
        task.group_category = TaskGroupCategory::Next7Days;
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["listName"], "Inbox");
        assert_eq!(value["groupCategory"], "next7days");
        assert!(value.get("list_name").is_none());
    }

    #[test]
    fn deserializes_minimal_synced_payload() {
        let task: Task = serde_json::from_str(
            r#"{"id":"t1","title":"Call","listName":"Work","createdAt":1,"updatedAt":2}"#,
        )
        .unwrap();
        assert_eq!(task.group_category, TaskGroupCategory::NoDate);
        assert!(task.tags.is_empty());
        assert!(!task.completed);
    }
}
