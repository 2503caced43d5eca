//! Stored summary repository.
//!
//! # Invariants
//! - Summaries for one `(period_key, list_key)` are returned newest first.

use crate::model::summary::StoredSummary;
use crate::repo::{
    map_unique_violation, parse_json_column, to_json_text, write_atomically, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SUMMARY_SELECT_SQL: &str = "SELECT
    id, created_at, updated_at, period_key, list_key, task_ids, summary_text
FROM summaries";

pub trait SummaryRepository {
    fn create_summary(&self, summary: &StoredSummary) -> RepoResult<()>;
    fn get_summary(&self, id: &str) -> RepoResult<Option<StoredSummary>>;
    fn update_summary_text(&self, id: &str, text: &str, now_ms: i64) -> RepoResult<()>;
    fn list_for(&self, period_key: &str, list_key: &str) -> RepoResult<Vec<StoredSummary>>;
    fn list_all(&self) -> RepoResult<Vec<StoredSummary>>;
    fn delete_summary(&self, id: &str) -> RepoResult<()>;
    fn replace_all(&self, summaries: &[StoredSummary]) -> RepoResult<()>;
}

pub struct SqliteSummaryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSummaryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SummaryRepository for SqliteSummaryRepository<'_> {
    fn create_summary(&self, summary: &StoredSummary) -> RepoResult<()> {
        insert_summary(self.conn, summary)
    }

    fn get_summary(&self, id: &str) -> RepoResult<Option<StoredSummary>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SUMMARY_SELECT_SQL} WHERE id = ?1;"))?;
        let raw = stmt.query_row([id], read_raw).optional()?;
        raw.map(decode).transpose()
    }

    fn update_summary_text(&self, id: &str, text: &str, now_ms: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE summaries SET summary_text = ?2, updated_at = ?3 WHERE id = ?1;",
            params![id, text, now_ms],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("summary", id));
        }
        Ok(())
    }

    fn list_for(&self, period_key: &str, list_key: &str) -> RepoResult<Vec<StoredSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SUMMARY_SELECT_SQL}
             WHERE period_key = ?1 AND list_key = ?2
             ORDER BY created_at DESC, id ASC;"
        ))?;
        let rows = stmt.query_map([period_key, list_key], read_raw)?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(decode(row?)?);
        }
        Ok(summaries)
    }

    fn list_all(&self) -> RepoResult<Vec<StoredSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SUMMARY_SELECT_SQL} ORDER BY created_at DESC, id ASC;"
        ))?;
        let rows = stmt.query_map([], read_raw)?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(decode(row?)?);
        }
        Ok(summaries)
    }

    fn delete_summary(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM summaries WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("summary", id));
        }
        Ok(())
    }

    fn replace_all(&self, summaries: &[StoredSummary]) -> RepoResult<()> {
        write_atomically(self.conn, |conn| {
            conn.execute("DELETE FROM summaries;", [])?;
            for summary in summaries {
                insert_summary(conn, summary)?;
            }
            Ok(())
        })
    }
}

fn insert_summary(conn: &Connection, summary: &StoredSummary) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO summaries (id, created_at, updated_at, period_key, list_key, task_ids, summary_text)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            summary.id.as_str(),
            summary.created_at,
            summary.updated_at,
            summary.period_key.as_str(),
            summary.list_key.as_str(),
            to_json_text(&summary.task_ids)?,
            summary.summary_text.as_str(),
        ],
    )
    .map_err(|err| map_unique_violation(err, format!("summary already exists: {}", summary.id)))?;
    Ok(())
}

/// Row shape before JSON decoding; keeps `query_map` closures infallible
/// with respect to `RepoError`.
struct RawSummary {
    summary: StoredSummary,
    task_ids: Option<String>,
}

fn read_raw(row: &Row<'_>) -> rusqlite::Result<RawSummary> {
    Ok(RawSummary {
        summary: StoredSummary {
            id: row.get("id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            period_key: row.get("period_key")?,
            list_key: row.get("list_key")?,
            task_ids: Vec::new(),
            summary_text: row.get("summary_text")?,
        },
        task_ids: row.get("task_ids")?,
    })
}

fn decode(raw: RawSummary) -> RepoResult<StoredSummary> {
    let mut summary = raw.summary;
    summary.task_ids = parse_json_column(raw.task_ids, "summaries.task_ids")?;
    Ok(summary)
}
