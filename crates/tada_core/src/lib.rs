//! Core domain logic for Tada.
//! This crate is the single source of truth for task, list and report
//! invariants; front-ends only call into it.

pub mod ai;
pub mod db;
pub mod export;
pub mod grouping;
pub mod logging;
pub mod model;
pub mod repo;
pub mod scheduler;
pub mod search;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError};
pub use grouping::{group_category_for, group_tasks, is_due_today, is_overdue, TaskGroup};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LoggingError};
pub use model::list::TaskList;
pub use model::task::{Subtask, Task, TaskGroupCategory, TaskId};
pub use repo::{RepoError, RepoResult};
pub use scheduler::{ScheduleTrigger, Scheduler};
pub use search::fts::{search_tasks, SearchError, SearchHit, SearchQuery};
pub use service::list_service::{ListService, ListServiceError};
pub use service::task_service::{NewTask, TaskPatch, TaskService, TaskServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
