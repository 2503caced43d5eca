//! Task use-case service.
//!
//! # Responsibility
//! - Provide create/update/complete/trash/restore/delete task operations.
//! - Resolve list membership and keep the denormalized `list_name` in sync.
//! - Recompute `group_category` on every write.
//! - Maintain subtasks and tags (rename/delete across all tasks).
//!
//! # Invariants
//! - Tags are trimmed, lowercased and deduplicated before persistence.
//! - Tasks cannot be created directly into Trash.
//! - Restoring a task from Trash puts it back in the Inbox.

use crate::db::now_epoch_ms;
use crate::grouping::{
    group_category_for, group_tasks, local_today, start_of_local_day_ms, TaskGroup,
};
use crate::model::list::same_list_name;
use crate::model::settings::{DefaultDueDate, PreferenceSettings};
use crate::model::task::{
    Subtask, Task, TaskValidationError, INBOX_LIST_ID, INBOX_LIST_NAME, TRASH_LIST_NAME,
};
use crate::repo::list_repo::ListRepository;
use crate::repo::task_repo::{TaskListQuery, TaskRepository};
use crate::repo::RepoError;
use chrono::{Days, NaiveDate};
use log::info;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from task service operations.
#[derive(Debug)]
pub enum TaskServiceError {
    InvalidTitle,
    InvalidTag(String),
    Validation(TaskValidationError),
    ListNotFound(String),
    /// Tasks are moved to Trash through `move_to_trash`, never created there.
    TrashNotAllowed,
    TaskNotFound(String),
    SubtaskNotFound(String),
    Repo(RepoError),
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "task title must not be blank"),
            Self::InvalidTag(value) => write!(f, "invalid tag: `{value}`"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::ListNotFound(name) => write!(f, "list not found: {name}"),
            Self::TrashNotAllowed => write!(f, "tasks cannot be placed in Trash directly"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::SubtaskNotFound(id) => write!(f, "subtask not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity: "task", id } => Self::TaskNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

pub type TaskServiceResult<T> = Result<T, TaskServiceError>;

/// Input for creating a task. Unset fields fall back to preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub content: Option<String>,
    pub due_date: Option<i64>,
    pub priority: Option<u8>,
    pub tags: Vec<String>,
    pub list_name: Option<String>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update. Outer `None` leaves the field untouched; for nullable
/// fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub content: Option<Option<String>>,
    pub due_date: Option<Option<i64>>,
    pub priority: Option<Option<u8>>,
    pub tags: Option<Vec<String>>,
    pub list_name: Option<String>,
}

/// Normalizes one tag: trimmed, lowercased, non-empty.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim().trim_start_matches('#').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes and deduplicates a tag set; blank entries are rejected.
pub fn normalize_tags(tags: &[String]) -> TaskServiceResult<Vec<String>> {
    let mut unique = BTreeSet::new();
    for tag in tags {
        let value = normalize_tag(tag).ok_or_else(|| TaskServiceError::InvalidTag(tag.clone()))?;
        unique.insert(value);
    }
    Ok(unique.into_iter().collect())
}

/// Due date a new task receives when the caller gives none.
pub fn default_due_date(prefs: &PreferenceSettings, today: NaiveDate) -> Option<i64> {
    match prefs.default_new_task_due_date? {
        DefaultDueDate::Today => Some(start_of_local_day_ms(today)),
        DefaultDueDate::Tomorrow => today
            .checked_add_days(Days::new(1))
            .map(start_of_local_day_ms),
    }
}

pub struct TaskService<R: TaskRepository, L: ListRepository> {
    tasks: R,
    lists: L,
}

impl<R: TaskRepository, L: ListRepository> TaskService<R, L> {
    pub fn new(tasks: R, lists: L) -> Self {
        Self { tasks, lists }
    }

    pub fn create_task(
        &self,
        input: NewTask,
        prefs: &PreferenceSettings,
    ) -> TaskServiceResult<Task> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(TaskServiceError::InvalidTitle);
        }

        let now = now_epoch_ms();
        let today = local_today();
        let requested_list = input
            .list_name
            .as_deref()
            .unwrap_or(prefs.default_new_task_list.as_str());
        let (list_id, list_name) = self.resolve_list(requested_list)?;

        let mut task = Task::new(title, now);
        task.content = input.content.filter(|content| !content.trim().is_empty());
        task.due_date = input.due_date.or_else(|| default_due_date(prefs, today));
        task.priority = input.priority.or(prefs.default_new_task_priority);
        task.tags = normalize_tags(&input.tags)?;
        task.order = self.tasks.max_order(&list_name)? + 1;
        task.list_id = list_id;
        task.list_name = list_name;
        task.group_category = group_category_for(&task, today);

        self.tasks.create_task(&task)?;
        info!(
            "event=task_create module=service status=ok task_id={} category={}",
            task.id,
            task.group_category.as_str()
        );
        Ok(task)
    }

    pub fn get_task(&self, id: &str) -> TaskServiceResult<Task> {
        self.tasks
            .get_task(id)?
            .ok_or_else(|| TaskServiceError::TaskNotFound(id.to_string()))
    }

    pub fn update_task(&self, id: &str, patch: TaskPatch) -> TaskServiceResult<Task> {
        let mut task = self.get_task(id)?;

        if let Some(title) = patch.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(TaskServiceError::InvalidTitle);
            }
            task.title = title.to_string();
        }
        if let Some(content) = patch.content {
            task.content = content.filter(|value| !value.trim().is_empty());
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(tags) = patch.tags {
            task.tags = normalize_tags(&tags)?;
        }
        if let Some(list_name) = patch.list_name {
            let (list_id, list_name) = self.resolve_list(&list_name)?;
            if !same_list_name(&task.list_name, &list_name) {
                task.order = self.tasks.max_order(&list_name)? + 1;
            }
            task.list_id = list_id;
            task.list_name = list_name;
        }

        self.save(task)
    }

    pub fn complete_task(&self, id: &str) -> TaskServiceResult<Task> {
        let mut task = self.get_task(id)?;
        if !task.completed {
            task.complete(now_epoch_ms());
        }
        self.save(task)
    }

    pub fn reopen_task(&self, id: &str) -> TaskServiceResult<Task> {
        let mut task = self.get_task(id)?;
        if task.completed {
            task.reopen(now_epoch_ms());
        }
        self.save(task)
    }

    pub fn toggle_complete(&self, id: &str) -> TaskServiceResult<Task> {
        let task = self.get_task(id)?;
        if task.completed {
            self.reopen_task(id)
        } else {
            self.complete_task(id)
        }
    }

    /// Sets progress; `Some(100)` completes the task.
    pub fn set_percentage(&self, id: &str, percentage: Option<u8>) -> TaskServiceResult<Task> {
        let mut task = self.get_task(id)?;
        task.set_percentage(percentage, now_epoch_ms());
        self.save(task)
    }

    pub fn move_to_trash(&self, id: &str) -> TaskServiceResult<Task> {
        let mut task = self.get_task(id)?;
        task.list_id = None;
        task.list_name = TRASH_LIST_NAME.to_string();
        self.save(task)
    }

    pub fn restore_from_trash(&self, id: &str) -> TaskServiceResult<Task> {
        let mut task = self.get_task(id)?;
        if task.is_in_trash() {
            task.list_id = Some(INBOX_LIST_ID.to_string());
            task.list_name = INBOX_LIST_NAME.to_string();
            task.order = self.tasks.max_order(INBOX_LIST_NAME)? + 1;
        }
        self.save(task)
    }

    pub fn delete_permanently(&self, id: &str) -> TaskServiceResult<()> {
        self.tasks.delete_task(id)?;
        info!("event=task_delete module=service status=ok task_id={id}");
        Ok(())
    }

    pub fn empty_trash(&self) -> TaskServiceResult<usize> {
        let purged = self.tasks.purge_trash()?;
        info!("event=trash_empty module=service status=ok purged={purged}");
        Ok(purged)
    }

    /// Lists tasks with categories computed for today.
    pub fn list_tasks(&self, query: &TaskListQuery) -> TaskServiceResult<Vec<Task>> {
        let today = local_today();
        let mut tasks = self.tasks.list_tasks(query)?;
        for task in &mut tasks {
            task.group_category = group_category_for(task, today);
        }
        Ok(tasks)
    }

    pub fn grouped_tasks(
        &self,
        query: &TaskListQuery,
        today: NaiveDate,
    ) -> TaskServiceResult<Vec<TaskGroup>> {
        let tasks = self.tasks.list_tasks(query)?;
        Ok(group_tasks(&tasks, today))
    }

    /// Rewrites stored categories that went stale since the last write
    /// (e.g. after midnight). Returns how many tasks changed.
    pub fn refresh_group_categories(&self, today: NaiveDate) -> TaskServiceResult<usize> {
        let mut changed = 0;
        for mut task in self.tasks.list_tasks(&TaskListQuery::everything())? {
            let category = group_category_for(&task, today);
            if category != task.group_category {
                task.group_category = category;
                self.tasks.update_task(&task)?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    pub fn add_subtask(&self, task_id: &str, title: &str) -> TaskServiceResult<Task> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TaskServiceError::InvalidTitle);
        }
        let mut task = self.get_task(task_id)?;
        let now = now_epoch_ms();
        let mut subtask = Subtask::new(task.id.clone(), title, now);
        subtask.order = task.subtasks.iter().map(|s| s.order).max().unwrap_or(0) + 1;
        task.subtasks.push(subtask);
        task.updated_at = now;
        self.save(task)
    }

    pub fn toggle_subtask(&self, task_id: &str, subtask_id: &str) -> TaskServiceResult<Task> {
        let mut task = self.get_task(task_id)?;
        let now = now_epoch_ms();
        let subtask = task
            .subtasks
            .iter_mut()
            .find(|subtask| subtask.id == subtask_id)
            .ok_or_else(|| TaskServiceError::SubtaskNotFound(subtask_id.to_string()))?;
        subtask.completed = !subtask.completed;
        subtask.completed_at = subtask.completed.then_some(now);
        subtask.updated_at = now;
        task.updated_at = now;
        self.save(task)
    }

    pub fn remove_subtask(&self, task_id: &str, subtask_id: &str) -> TaskServiceResult<Task> {
        let mut task = self.get_task(task_id)?;
        let before = task.subtasks.len();
        task.subtasks.retain(|subtask| subtask.id != subtask_id);
        if task.subtasks.len() == before {
            return Err(TaskServiceError::SubtaskNotFound(subtask_id.to_string()));
        }
        task.updated_at = now_epoch_ms();
        self.save(task)
    }

    pub fn list_tags(&self) -> TaskServiceResult<Vec<String>> {
        Ok(self.tasks.list_tags()?)
    }

    /// Renames a tag on every task. Returns touched tasks.
    pub fn rename_tag(&self, old: &str, new: &str) -> TaskServiceResult<usize> {
        let old = normalize_tag(old).ok_or_else(|| TaskServiceError::InvalidTag(old.to_string()))?;
        let new = normalize_tag(new).ok_or_else(|| TaskServiceError::InvalidTag(new.to_string()))?;
        let touched = self.tasks.rename_tag(&old, &new, now_epoch_ms())?;
        info!("event=tag_rename module=service status=ok touched={touched}");
        Ok(touched)
    }

    /// Removes a tag from every task. Returns touched tasks.
    pub fn delete_tag(&self, tag: &str) -> TaskServiceResult<usize> {
        let tag = normalize_tag(tag).ok_or_else(|| TaskServiceError::InvalidTag(tag.to_string()))?;
        let touched = self.tasks.remove_tag(&tag, now_epoch_ms())?;
        info!("event=tag_delete module=service status=ok touched={touched}");
        Ok(touched)
    }

    fn save(&self, mut task: Task) -> TaskServiceResult<Task> {
        task.updated_at = task.updated_at.max(now_epoch_ms());
        task.group_category = group_category_for(&task, local_today());
        self.tasks.update_task(&task)?;
        Ok(task)
    }

    /// Maps a list name to `(list_id, canonical_name)`.
    fn resolve_list(&self, name: &str) -> TaskServiceResult<(Option<String>, String)> {
        let trimmed = name.trim();
        if same_list_name(trimmed, TRASH_LIST_NAME) {
            return Err(TaskServiceError::TrashNotAllowed);
        }
        if trimmed.is_empty() || same_list_name(trimmed, INBOX_LIST_NAME) {
            return Ok((
                Some(INBOX_LIST_ID.to_string()),
                INBOX_LIST_NAME.to_string(),
            ));
        }
        match self.lists.find_by_name(trimmed)? {
            Some(list) => Ok((Some(list.id), list.name)),
            None => Err(TaskServiceError::ListNotFound(trimmed.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_tags, TaskServiceError};

    #[test]
    fn normalize_tags_lowercases_dedupes_and_strips_hash() {
        let tags = normalize_tags(&[
            "Work".to_string(),
            "#work".to_string(),
            " Home ".to_string(),
        ])
        .unwrap();
        assert_eq!(tags, vec!["home".to_string(), "work".to_string()]);
    }

    #[test]
    fn normalize_tags_rejects_blank() {
        let err = normalize_tags(&["  ".to_string()]).unwrap_err();
        assert!(matches!(err, TaskServiceError::InvalidTag(_)));
    }
}
