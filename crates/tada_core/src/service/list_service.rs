//! Task list use-case service.
//!
//! # Responsibility
//! - Validate list names above the repository layer.
//! - Provide create, rename (with task propagation) and delete operations.
//!
//! # Invariants
//! - Names are trimmed, non-empty, not reserved and unique (all
//!   case-insensitive).
//! - The Inbox list can be neither renamed nor deleted.
//! - Deleting a list moves its tasks to Trash.

use crate::db::now_epoch_ms;
use crate::model::list::{is_reserved_list_name, same_list_name, TaskList};
use crate::repo::list_repo::ListRepository;
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from list service operations.
#[derive(Debug)]
pub enum ListServiceError {
    EmptyName,
    /// Name collides with a built-in list or view.
    ReservedName(String),
    /// Another list already uses this name.
    DuplicateName(String),
    ListNotFound(String),
    InboxIsImmutable,
    Repo(RepoError),
}

impl Display for ListServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "list name must not be blank"),
            Self::ReservedName(name) => write!(f, "\"{name}\" is a reserved list name"),
            Self::DuplicateName(name) => write!(f, "a list named \"{name}\" already exists"),
            Self::ListNotFound(id) => write!(f, "list not found: {id}"),
            Self::InboxIsImmutable => write!(f, "the Inbox list cannot be renamed or deleted"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ListServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ListServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::ListNotFound(id),
            RepoError::Conflict(message) => Self::DuplicateName(message),
            other => Self::Repo(other),
        }
    }
}

/// Result of a rename, including how many tasks were rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOutcome {
    pub list: TaskList,
    pub tasks_updated: usize,
}

/// Validates a candidate list name against existing lists.
///
/// `exclude_id` skips the list being renamed so that changing only the
/// letter case of its own name is allowed.
pub fn validate_list_name(
    name: &str,
    existing: &[TaskList],
    exclude_id: Option<&str>,
) -> Result<String, ListServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ListServiceError::EmptyName);
    }
    if is_reserved_list_name(trimmed) {
        return Err(ListServiceError::ReservedName(trimmed.to_string()));
    }
    let duplicate = existing.iter().any(|list| {
        Some(list.id.as_str()) != exclude_id && same_list_name(&list.name, trimmed)
    });
    if duplicate {
        return Err(ListServiceError::DuplicateName(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

pub struct ListService<L: ListRepository> {
    repo: L,
}

impl<L: ListRepository> ListService<L> {
    pub fn new(repo: L) -> Self {
        Self { repo }
    }

    pub fn list_lists(&self) -> Result<Vec<TaskList>, ListServiceError> {
        Ok(self.repo.list_lists()?)
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<TaskList>, ListServiceError> {
        Ok(self.repo.find_by_name(name)?)
    }

    /// Creates a list appended after the existing ones.
    pub fn create_list(
        &self,
        name: &str,
        icon: Option<String>,
        color: Option<String>,
    ) -> Result<TaskList, ListServiceError> {
        let existing = self.repo.list_lists()?;
        let name = validate_list_name(name, &existing, None)?;
        let next_order = existing
            .iter()
            .filter_map(|list| list.order)
            .max()
            .unwrap_or(0)
            + 1;

        let mut list = TaskList::new(name, now_epoch_ms());
        list.icon = icon;
        list.color = color;
        list.order = Some(next_order);
        self.repo.create_list(&list)?;
        info!(
            "event=list_create module=service status=ok list_id={}",
            list.id
        );
        Ok(list)
    }

    pub fn rename_list(&self, id: &str, new_name: &str) -> Result<RenameOutcome, ListServiceError> {
        let current = self
            .repo
            .get_list(id)?
            .ok_or_else(|| ListServiceError::ListNotFound(id.to_string()))?;
        if current.is_inbox() {
            return Err(ListServiceError::InboxIsImmutable);
        }

        let existing = self.repo.list_lists()?;
        let name = validate_list_name(new_name, &existing, Some(id))?;
        let tasks_updated = self.repo.rename_list(id, &name, now_epoch_ms())?;
        let list = self
            .repo
            .get_list(id)?
            .ok_or_else(|| ListServiceError::ListNotFound(id.to_string()))?;
        info!(
            "event=list_rename module=service status=ok list_id={} tasks_updated={}",
            id, tasks_updated
        );
        Ok(RenameOutcome {
            list,
            tasks_updated,
        })
    }

    /// Updates presentation fields without touching the name.
    pub fn update_appearance(
        &self,
        id: &str,
        icon: Option<String>,
        color: Option<String>,
    ) -> Result<TaskList, ListServiceError> {
        let mut list = self
            .repo
            .get_list(id)?
            .ok_or_else(|| ListServiceError::ListNotFound(id.to_string()))?;
        list.icon = icon;
        list.color = color;
        list.updated_at = now_epoch_ms();
        self.repo.update_list_meta(&list)?;
        Ok(list)
    }

    /// Deletes a list, returning how many tasks moved to Trash.
    pub fn delete_list(&self, id: &str) -> Result<usize, ListServiceError> {
        let current = self
            .repo
            .get_list(id)?
            .ok_or_else(|| ListServiceError::ListNotFound(id.to_string()))?;
        if current.is_inbox() {
            return Err(ListServiceError::InboxIsImmutable);
        }
        let moved = self.repo.delete_list(id, now_epoch_ms())?;
        info!(
            "event=list_delete module=service status=ok list_id={} tasks_trashed={}",
            id, moved
        );
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_list_name, ListServiceError};
    use crate::model::list::TaskList;

    #[test]
    fn validate_list_name_allows_case_change_of_self() {
        let existing = vec![TaskList::new("Work", 0)];
        let id = existing[0].id.clone();
        assert_eq!(
            validate_list_name(" WORK ", &existing, Some(id.as_str())).unwrap(),
            "WORK"
        );
        assert!(matches!(
            validate_list_name("work", &existing, None),
            Err(ListServiceError::DuplicateName(_))
        ));
    }
}
