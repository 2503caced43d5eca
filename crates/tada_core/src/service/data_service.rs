//! Local persistence service and full-dataset import/export.
//!
//! # Responsibility
//! - Serve plain-data `fetch_*` reads from a cached snapshot and write
//!   `update_*` calls through to storage.
//! - Reload the snapshot from storage on `reset`.
//! - Export the whole dataset as one JSON bundle and import it back in
//!   `replace` or `merge` mode.
//!
//! # Invariants
//! - The Inbox list always exists after an import.
//! - Imported tasks never point at a list id that does not exist; such
//!   references are re-resolved by list name or cleared.
//! - Merge keeps the record with the newer `updated_at` when ids collide.

use crate::db::now_epoch_ms;
use crate::grouping::{group_category_for, local_today};
use crate::model::list::{list_name_key, same_list_name, TaskList};
use crate::model::profile::UserProfile;
use crate::model::summary::{EchoReport, StoredSummary};
use crate::model::task::{Task, INBOX_LIST_ID, INBOX_LIST_NAME, TRASH_LIST_NAME};
use crate::repo::echo_repo::{EchoReportRepository, SqliteEchoReportRepository};
use crate::repo::list_repo::{ListRepository, SqliteListRepository};
use crate::repo::profile_repo::{ProfileRepository, SqliteProfileRepository};
use crate::repo::settings_repo::{SettingsRepository, SqliteSettingsRepository};
use crate::repo::summary_repo::{SqliteSummaryRepository, SummaryRepository};
use crate::repo::task_repo::{SqliteTaskRepository, TaskListQuery, TaskRepository};
use crate::repo::RepoError;
use log::{error, info};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Instant;

/// Bundle format written by this version.
pub const BUNDLE_VERSION: u32 = 1;

#[derive(Debug)]
pub enum TransferError {
    Io(std::io::Error),
    Json(serde_json::Error),
    UnsupportedVersion(u32),
    Repo(RepoError),
}

impl Display for TransferError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "file error: {err}"),
            Self::Json(err) => write!(f, "invalid bundle JSON: {err}"),
            Self::UnsupportedVersion(version) => write!(
                f,
                "bundle version {version} is newer than supported version {BUNDLE_VERSION}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::UnsupportedVersion(_) => None,
        }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<RepoError> for TransferError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

pub type TransferResult<T> = Result<T, TransferError>;

/// Full dataset as exchanged through export/import files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    #[serde(default = "default_bundle_version")]
    pub version: u32,
    #[serde(default)]
    pub exported_at: i64,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub lists: Vec<TaskList>,
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub summaries: Vec<StoredSummary>,
    #[serde(default)]
    pub echo_reports: Vec<EchoReport>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

fn default_bundle_version() -> u32 {
    BUNDLE_VERSION
}

impl ExportBundle {
    pub fn from_json(text: &str) -> TransferResult<Self> {
        let bundle: Self = serde_json::from_str(text)?;
        if bundle.version > BUNDLE_VERSION {
            return Err(TransferError::UnsupportedVersion(bundle.version));
        }
        Ok(bundle)
    }

    pub fn to_json_pretty(&self) -> TransferResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Wipe local data and load the bundle.
    Replace,
    /// Union by id; the newer record wins.
    Merge,
}

impl ImportMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "replace" => Some(Self::Replace),
            "merge" => Some(Self::Merge),
            _ => None,
        }
    }
}

/// Row counts after an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub tasks: usize,
    pub lists: usize,
    pub settings: usize,
    pub summaries: usize,
    pub echo_reports: usize,
}

/// Cached copy of everything the app reads at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSnapshot {
    pub tasks: Vec<Task>,
    pub lists: Vec<TaskList>,
    pub settings: BTreeMap<String, serde_json::Value>,
    pub summaries: Vec<StoredSummary>,
    pub echo_reports: Vec<EchoReport>,
    pub profile: UserProfile,
}

pub struct DataService<'conn> {
    conn: &'conn Connection,
    snapshot: DataSnapshot,
}

impl<'conn> DataService<'conn> {
    /// Loads the initial snapshot.
    pub fn load(conn: &'conn Connection) -> TransferResult<Self> {
        let snapshot = read_snapshot(conn)?;
        Ok(Self { conn, snapshot })
    }

    /// Discards cached state and reloads it from storage.
    pub fn reset(&mut self) -> TransferResult<()> {
        self.snapshot = read_snapshot(self.conn)?;
        info!(
            "event=data_reset module=service status=ok tasks={} lists={}",
            self.snapshot.tasks.len(),
            self.snapshot.lists.len()
        );
        Ok(())
    }

    pub fn snapshot(&self) -> &DataSnapshot {
        &self.snapshot
    }

    pub fn fetch_tasks(&self) -> &[Task] {
        &self.snapshot.tasks
    }

    pub fn fetch_lists(&self) -> &[TaskList] {
        &self.snapshot.lists
    }

    pub fn fetch_settings(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.snapshot.settings
    }

    pub fn fetch_summaries(&self) -> &[StoredSummary] {
        &self.snapshot.summaries
    }

    pub fn fetch_echo_reports(&self) -> &[EchoReport] {
        &self.snapshot.echo_reports
    }

    pub fn fetch_profile(&self) -> &UserProfile {
        &self.snapshot.profile
    }

    pub fn update_tasks(&mut self, tasks: Vec<Task>) -> TransferResult<()> {
        let tasks = sanitize_tasks(tasks, &self.snapshot.lists);
        SqliteTaskRepository::new(self.conn).replace_all(&tasks)?;
        self.snapshot.tasks = tasks;
        Ok(())
    }

    pub fn update_lists(&mut self, lists: Vec<TaskList>) -> TransferResult<()> {
        let (lists, _) = ensure_inbox(lists);
        SqliteListRepository::new(self.conn).replace_all(&lists)?;
        self.snapshot.lists = lists;
        // Removed lists null out task references; re-read to stay in sync.
        self.snapshot.tasks =
            SqliteTaskRepository::new(self.conn).list_tasks(&TaskListQuery::everything())?;
        Ok(())
    }

    pub fn update_settings(
        &mut self,
        settings: BTreeMap<String, serde_json::Value>,
    ) -> TransferResult<()> {
        SqliteSettingsRepository::new(self.conn).replace_all(&settings, now_epoch_ms())?;
        self.snapshot.settings = settings;
        Ok(())
    }

    pub fn update_summaries(&mut self, summaries: Vec<StoredSummary>) -> TransferResult<()> {
        SqliteSummaryRepository::new(self.conn).replace_all(&summaries)?;
        self.snapshot.summaries = summaries;
        Ok(())
    }

    pub fn update_echo_reports(&mut self, reports: Vec<EchoReport>) -> TransferResult<()> {
        SqliteEchoReportRepository::new(self.conn).replace_all(&reports)?;
        self.snapshot.echo_reports = reports;
        Ok(())
    }

    pub fn update_profile(&mut self, profile: UserProfile) -> TransferResult<()> {
        SqliteProfileRepository::new(self.conn).save_profile(&profile)?;
        self.snapshot.profile = profile;
        Ok(())
    }

    /// Exports straight from storage, ignoring any stale cache.
    pub fn export_bundle(&self) -> TransferResult<ExportBundle> {
        let snapshot = read_snapshot(self.conn)?;
        Ok(ExportBundle {
            version: BUNDLE_VERSION,
            exported_at: now_epoch_ms(),
            tasks: snapshot.tasks,
            lists: snapshot.lists,
            settings: snapshot.settings,
            summaries: snapshot.summaries,
            echo_reports: snapshot.echo_reports,
            profile: Some(snapshot.profile),
        })
    }

    pub fn export_to_file(&self, path: &Path) -> TransferResult<ExportBundle> {
        let bundle = self.export_bundle()?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bundle.to_json_pretty()?)?;
        info!(
            "event=data_export module=service status=ok tasks={} lists={}",
            bundle.tasks.len(),
            bundle.lists.len()
        );
        Ok(bundle)
    }

    pub fn import_from_file(&mut self, path: &Path, mode: ImportMode) -> TransferResult<ImportReport> {
        let text = std::fs::read_to_string(path)?;
        let bundle = ExportBundle::from_json(&text)?;
        self.import_bundle(bundle, mode)
    }

    pub fn import_bundle(
        &mut self,
        bundle: ExportBundle,
        mode: ImportMode,
    ) -> TransferResult<ImportReport> {
        let started_at = Instant::now();
        let result = self.apply_import(bundle, mode);
        match &result {
            Ok(report) => info!(
                "event=data_import module=service status=ok mode={:?} tasks={} lists={} duration_ms={}",
                mode,
                report.tasks,
                report.lists,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=data_import module=service status=error mode={:?} error={}",
                mode, err
            ),
        }
        result
    }

    fn apply_import(&mut self, bundle: ExportBundle, mode: ImportMode) -> TransferResult<ImportReport> {
        let current = read_snapshot(self.conn)?;
        let (lists, tasks, settings, summaries, echo_reports, profile) = match mode {
            ImportMode::Replace => (
                bundle.lists,
                bundle.tasks,
                bundle.settings,
                bundle.summaries,
                bundle.echo_reports,
                bundle.profile.unwrap_or(current.profile),
            ),
            ImportMode::Merge => {
                let mut settings = current.settings;
                settings.extend(bundle.settings);
                let profile = match bundle.profile {
                    Some(incoming) if incoming.updated_at >= current.profile.updated_at => incoming,
                    _ => current.profile,
                };
                (
                    merge_lists(current.lists, bundle.lists),
                    merge_by_id(current.tasks, bundle.tasks, |t| &t.id, |t| t.updated_at),
                    settings,
                    merge_by_id(current.summaries, bundle.summaries, |s| &s.id, |s| s.updated_at),
                    merge_by_id(current.echo_reports, bundle.echo_reports, |r| &r.id, |r| r.created_at),
                    profile,
                )
            }
        };

        let (lists, renamed_inbox) = ensure_inbox(dedupe_list_names(lists));
        let mut tasks = tasks;
        if let Some(previous_id) = renamed_inbox {
            for task in &mut tasks {
                if task.list_id.as_deref() == Some(previous_id.as_str()) {
                    task.list_id = Some(INBOX_LIST_ID.to_string());
                }
            }
        }
        let tasks = sanitize_tasks(tasks, &lists);
        for task in &tasks {
            task.validate().map_err(RepoError::from)?;
        }

        // Every table is replaced inside one transaction; any failure rolls
        // the whole import back.
        let tx = self.conn.unchecked_transaction().map_err(RepoError::from)?;
        SqliteListRepository::new(&tx).replace_all(&lists)?;
        SqliteTaskRepository::new(&tx).replace_all(&tasks)?;
        SqliteSettingsRepository::new(&tx).replace_all(&settings, now_epoch_ms())?;
        SqliteSummaryRepository::new(&tx).replace_all(&summaries)?;
        SqliteEchoReportRepository::new(&tx).replace_all(&echo_reports)?;
        SqliteProfileRepository::new(&tx).save_profile(&profile)?;
        tx.commit().map_err(RepoError::from)?;

        self.reset()?;
        Ok(ImportReport {
            tasks: self.snapshot.tasks.len(),
            lists: self.snapshot.lists.len(),
            settings: self.snapshot.settings.len(),
            summaries: self.snapshot.summaries.len(),
            echo_reports: self.snapshot.echo_reports.len(),
        })
    }
}

fn read_snapshot(conn: &Connection) -> TransferResult<DataSnapshot> {
    Ok(DataSnapshot {
        tasks: SqliteTaskRepository::new(conn).list_tasks(&TaskListQuery::everything())?,
        lists: SqliteListRepository::new(conn).list_lists()?,
        settings: SqliteSettingsRepository::new(conn).all()?,
        summaries: SqliteSummaryRepository::new(conn).list_all()?,
        echo_reports: SqliteEchoReportRepository::new(conn).list_reports(None)?,
        profile: SqliteProfileRepository::new(conn).get_profile()?,
    })
}

/// Guarantees one Inbox row stored under [`INBOX_LIST_ID`]. An incoming
/// Inbox with another id is moved onto the fixed id; that previous id is
/// returned so task references can follow.
fn ensure_inbox(mut lists: Vec<TaskList>) -> (Vec<TaskList>, Option<String>) {
    if lists.iter().any(|list| list.id == INBOX_LIST_ID) {
        lists.retain(|list| list.id == INBOX_LIST_ID || !list.is_inbox());
        return (lists, None);
    }
    if let Some(inbox) = lists.iter_mut().find(|list| list.is_inbox()) {
        let previous = std::mem::replace(&mut inbox.id, INBOX_LIST_ID.to_string());
        inbox.name = INBOX_LIST_NAME.to_string();
        return (lists, Some(previous));
    }
    let now = now_epoch_ms();
    let mut inbox = TaskList::new(INBOX_LIST_NAME, now);
    inbox.id = INBOX_LIST_ID.to_string();
    inbox.icon = Some("inbox".to_string());
    inbox.order = Some(1);
    lists.insert(0, inbox);
    (lists, None)
}

/// Keeps the first list per case-folded name.
fn dedupe_list_names(lists: Vec<TaskList>) -> Vec<TaskList> {
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .filter(|list| seen.insert(list_name_key(&list.name)))
        .collect()
}

/// Points every task at an existing list row (or none), repairs its
/// completion fields and recomputes its category.
fn sanitize_tasks(tasks: Vec<Task>, lists: &[TaskList]) -> Vec<Task> {
    let today = local_today();
    let by_id: HashMap<&str, &TaskList> = lists.iter().map(|list| (list.id.as_str(), list)).collect();
    tasks
        .into_iter()
        .map(|mut task| {
            if task.is_in_trash() {
                task.list_id = None;
                task.list_name = TRASH_LIST_NAME.to_string();
            } else {
                let resolved = task
                    .list_id
                    .as_deref()
                    .and_then(|id| by_id.get(id).copied())
                    .or_else(|| {
                        lists
                            .iter()
                            .find(|list| same_list_name(&list.name, &task.list_name))
                    });
                match resolved {
                    Some(list) => {
                        task.list_id = Some(list.id.clone());
                        task.list_name = list.name.clone();
                    }
                    None => task.list_id = None,
                }
            }
            task.normalize_completion();
            task.group_category = group_category_for(&task, today);
            task
        })
        .collect()
}

/// Lists merge by id; an incoming list whose name is already taken by a
/// different id is dropped and its tasks re-resolve by name.
fn merge_lists(current: Vec<TaskList>, incoming: Vec<TaskList>) -> Vec<TaskList> {
    dedupe_list_names(merge_by_id(current, incoming, |l| &l.id, |l| l.updated_at))
}

fn merge_by_id<T, K, U>(current: Vec<T>, incoming: Vec<T>, key: K, updated: U) -> Vec<T>
where
    K: Fn(&T) -> &String,
    U: Fn(&T) -> i64,
{
    let mut merged = current;
    for item in incoming {
        match merged.iter().position(|existing| key(existing) == key(&item)) {
            Some(index) => {
                if updated(&item) >= updated(&merged[index]) {
                    merged[index] = item;
                }
            }
            None => merged.push(item),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_by_id_keeps_newer_record() {
        let mut old = Task::new("old title", 1);
        old.updated_at = 10;
        let mut newer = old.clone();
        newer.title = "new title".to_string();
        newer.updated_at = 20;
        let other = Task::new("other", 5);

        let merged = merge_by_id(vec![newer.clone()], vec![old, other], |t| &t.id, |t| t.updated_at);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].title, "new title");
    }

    #[test]
    fn sanitize_tasks_resolves_lists_by_name() {
        let work = TaskList::new("Work", 0);
        let mut task = Task::new("t", 0);
        task.list_id = Some("gone".to_string());
        task.list_name = "work".to_string();
        let mut orphan = Task::new("o", 0);
        orphan.list_id = Some("gone".to_string());
        orphan.list_name = "Elsewhere".to_string();

        let tasks = sanitize_tasks(vec![task, orphan], &[work.clone()]);
        assert_eq!(tasks[0].list_id.as_deref(), Some(work.id.as_str()));
        assert_eq!(tasks[0].list_name, "Work");
        assert_eq!(tasks[1].list_id, None);
        assert_eq!(tasks[1].list_name, "Elsewhere");
    }

    #[test]
    fn bundle_rejects_future_versions() {
        let err = ExportBundle::from_json(r#"{"version":99}"#).unwrap_err();
        assert!(matches!(err, TransferError::UnsupportedVersion(99)));
        let bundle = ExportBundle::from_json("{}").unwrap();
        assert_eq!(bundle.version, BUNDLE_VERSION);
    }
}
