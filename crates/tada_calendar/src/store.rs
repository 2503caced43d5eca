//! JSON file holding the most recently synced task list.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use tada_core::Task;

/// On-disk layout of the data file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedTasks {
    #[serde(default)]
    pub synced_at: i64,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, source: std::io::Error },
    Json(serde_json::Error),
    /// Payload rejected before touching the file.
    Invalid(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "data file `{}`: {source}", path.display()),
            Self::Json(err) => write!(f, "data file is not valid JSON: {err}"),
            Self::Invalid(message) => write!(f, "{message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the data file. A missing file is an empty task list.
    pub async fn load(&self) -> Result<SyncedTasks, StoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SyncedTasks::default())
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(SyncedTasks::default());
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Writes pretty JSON through a sibling temp file so readers never see
    /// a half-written document.
    pub async fn save(&self, data: &SyncedTasks) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

/// Rejects payloads that would corrupt the calendar (blank or duplicate ids).
pub fn validate_tasks(tasks: &[Task]) -> Result<(), StoreError> {
    let mut seen = std::collections::HashSet::with_capacity(tasks.len());
    for task in tasks {
        if task.id.trim().is_empty() {
            return Err(StoreError::Invalid("task id cannot be empty".to_string()));
        }
        if !seen.insert(task.id.as_str()) {
            return Err(StoreError::Invalid(format!("duplicate task id `{}`", task.id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.json"));
        assert_eq!(store.load().await.unwrap(), SyncedTasks::default());
    }

    #[tokio::test]
    async fn save_then_load_keeps_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path().join("nested").join("tasks.json"));
        let data = SyncedTasks {
            synced_at: 42,
            tasks: vec![Task::new("Pay rent", 1)],
        };

        store.save(&data).await.unwrap();

        assert_eq!(store.load().await.unwrap(), data);
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  \"syncedAt\": 42"));
    }

    #[test]
    fn validate_tasks_rejects_duplicates() {
        let task = Task::new("a", 0);
        assert!(validate_tasks(&[task.clone()]).is_ok());
        assert!(matches!(
            validate_tasks(&[task.clone(), task]),
            Err(StoreError::Invalid(_))
        ));
    }
}
