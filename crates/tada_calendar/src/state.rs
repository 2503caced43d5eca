use std::sync::Arc;

use tada_core::Task;
use tokio::sync::RwLock;

use crate::store::{StoreError, TaskStore};

/// Calendar rendering options fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarConfig {
    pub calendar_name: String,
    pub reminder_minutes: i64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_name: "Tada".to_string(),
            reminder_minutes: 9 * 60,
        }
    }
}

/// Shared handler state. Cloning is cheap; all clones see the same tasks.
#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<RwLock<Vec<Task>>>,
    pub store: Arc<TaskStore>,
    pub calendar: Arc<CalendarConfig>,
}

impl AppState {
    pub fn new(store: TaskStore, calendar: CalendarConfig) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(Vec::new())),
            store: Arc::new(store),
            calendar: Arc::new(calendar),
        }
    }

    /// Builds state with whatever the data file already holds.
    pub async fn load(store: TaskStore, calendar: CalendarConfig) -> Result<Self, StoreError> {
        let synced = store.load().await?;
        let state = Self::new(store, calendar);
        *state.tasks.write().await = synced.tasks;
        Ok(state)
    }
}
