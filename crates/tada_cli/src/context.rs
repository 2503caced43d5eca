//! Process-wide state shared by every command: the open database, the
//! output mode and helpers to build services on top of them.

use crate::cli::Cli;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Days, NaiveDate};
use rusqlite::Connection;
use std::future::Future;
use std::path::{Path, PathBuf};
use tada_core::ai::HttpAiClient;
use tada_core::grouping::{local_today, start_of_local_day_ms};
use tada_core::repo::echo_repo::SqliteEchoReportRepository;
use tada_core::repo::list_repo::SqliteListRepository;
use tada_core::repo::profile_repo::SqliteProfileRepository;
use tada_core::repo::settings_repo::SqliteSettingsRepository;
use tada_core::repo::summary_repo::SqliteSummaryRepository;
use tada_core::repo::task_repo::SqliteTaskRepository;
use tada_core::service::echo_service::EchoService;
use tada_core::service::settings_service::{ProfileService, SettingsService};
use tada_core::service::summary_service::SummaryService;
use tada_core::{default_log_level, init_logging, open_db, ListService, LogConfig, TaskService};

const APP_DIR: &str = "tada";
const DB_FILE: &str = "tada.db";

pub type Tasks<'a> = TaskService<SqliteTaskRepository<'a>, SqliteListRepository<'a>>;
pub type Lists<'a> = ListService<SqliteListRepository<'a>>;
pub type Summaries<'a> = SummaryService<SqliteTaskRepository<'a>, SqliteSummaryRepository<'a>>;
pub type Echoes<'a> = EchoService<SqliteTaskRepository<'a>, SqliteEchoReportRepository<'a>>;

pub struct App {
    pub conn: Connection,
    pub json: bool,
}

impl App {
    /// Starts logging and opens (migrating if needed) the database.
    pub fn open(cli: &Cli) -> Result<Self> {
        let data_dir = default_data_dir();
        let log_dir = match &cli.log_dir {
            Some(dir) => absolute(dir)?,
            None => data_dir.as_ref().map(|dir| dir.join("logs")).ok_or_else(|| {
                anyhow!("cannot determine a data directory; pass --log-dir")
            })?,
        };
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(&LogConfig::new(level, log_dir).with_stderr(true))
            .context("failed to start logging")?;

        let db_path = match &cli.db {
            Some(path) => path.clone(),
            None => data_dir
                .map(|dir| dir.join(DB_FILE))
                .ok_or_else(|| anyhow!("cannot determine a data directory; pass --db"))?,
        };
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create `{}`", parent.display()))?;
        }
        let conn = open_db(&db_path)
            .with_context(|| format!("failed to open database `{}`", db_path.display()))?;

        Ok(Self {
            conn,
            json: cli.json,
        })
    }

    pub fn tasks(&self) -> Tasks<'_> {
        TaskService::new(
            SqliteTaskRepository::new(&self.conn),
            SqliteListRepository::new(&self.conn),
        )
    }

    pub fn lists(&self) -> Lists<'_> {
        ListService::new(SqliteListRepository::new(&self.conn))
    }

    pub fn settings(&self) -> SettingsService<SqliteSettingsRepository<'_>> {
        SettingsService::new(SqliteSettingsRepository::new(&self.conn))
    }

    pub fn profile(&self) -> ProfileService<SqliteProfileRepository<'_>> {
        ProfileService::new(SqliteProfileRepository::new(&self.conn))
    }

    pub fn summaries(&self) -> Summaries<'_> {
        SummaryService::new(
            SqliteTaskRepository::new(&self.conn),
            SqliteSummaryRepository::new(&self.conn),
        )
    }

    pub fn echoes(&self) -> Echoes<'_> {
        EchoService::new(
            SqliteTaskRepository::new(&self.conn),
            SqliteEchoReportRepository::new(&self.conn),
        )
    }

    /// HTTP client for the configured provider. Fails early when the
    /// provider is missing an API key or model.
    pub fn ai_client(&self) -> Result<HttpAiClient> {
        let settings = self.settings().ai()?;
        if !settings.is_configured() {
            bail!("AI provider is not configured; run `tada settings ai --api-key ...`");
        }
        Ok(HttpAiClient::new(settings)?)
    }

    pub fn language(&self) -> Result<String> {
        Ok(self.settings().preferences()?.language)
    }
}

/// Runs one async AI call to completion on a private runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

/// Accepts `today`, `tomorrow` or `YYYY-MM-DD` and returns the start of
/// that local day in epoch milliseconds.
pub fn parse_due(value: &str) -> Result<i64> {
    Ok(start_of_local_day_ms(parse_day(value)?))
}

pub fn parse_day(value: &str) -> Result<NaiveDate> {
    let today = local_today();
    match value.trim().to_ascii_lowercase().as_str() {
        "today" => Ok(today),
        "tomorrow" => today
            .checked_add_days(Days::new(1))
            .ok_or_else(|| anyhow!("date out of range")),
        "yesterday" => today.pred_opt().ok_or_else(|| anyhow!("date out of range")),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
            .with_context(|| format!("invalid date `{value}`; expected YYYY-MM-DD")),
    }
}

fn default_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_DIR))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}
