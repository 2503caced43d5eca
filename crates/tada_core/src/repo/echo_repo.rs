//! Echo report repository.

use crate::model::summary::{EchoReport, EchoStyle};
use crate::repo::{
    map_unique_violation, parse_json_column, to_json_text, write_atomically, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ECHO_SELECT_SQL: &str =
    "SELECT id, created_at, content, job_types, style, user_input FROM echo_reports";

pub trait EchoReportRepository {
    fn create_report(&self, report: &EchoReport) -> RepoResult<()>;
    fn get_report(&self, id: &str) -> RepoResult<Option<EchoReport>>;
    /// Newest first. `None` returns every report.
    fn list_reports(&self, limit: Option<u32>) -> RepoResult<Vec<EchoReport>>;
    fn delete_report(&self, id: &str) -> RepoResult<()>;
    /// Reports created in `[start_ms, end_ms]`.
    fn count_between(&self, start_ms: i64, end_ms: i64) -> RepoResult<u32>;
    fn replace_all(&self, reports: &[EchoReport]) -> RepoResult<()>;
}

pub struct SqliteEchoReportRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEchoReportRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EchoReportRepository for SqliteEchoReportRepository<'_> {
    fn create_report(&self, report: &EchoReport) -> RepoResult<()> {
        insert_report(self.conn, report)
    }

    fn get_report(&self, id: &str) -> RepoResult<Option<EchoReport>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ECHO_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_report_row(row)?));
        }
        Ok(None)
    }

    fn list_reports(&self, limit: Option<u32>) -> RepoResult<Vec<EchoReport>> {
        let mut sql = format!("{ECHO_SELECT_SQL} ORDER BY created_at DESC, id ASC");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut reports = Vec::new();
        while let Some(row) = rows.next()? {
            reports.push(parse_report_row(row)?);
        }
        Ok(reports)
    }

    fn delete_report(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM echo_reports WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("echo report", id));
        }
        Ok(())
    }

    fn count_between(&self, start_ms: i64, end_ms: i64) -> RepoResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM echo_reports WHERE created_at BETWEEN ?1 AND ?2;",
            params![start_ms, end_ms],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn replace_all(&self, reports: &[EchoReport]) -> RepoResult<()> {
        write_atomically(self.conn, |conn| {
            conn.execute("DELETE FROM echo_reports;", [])?;
            for report in reports {
                insert_report(conn, report)?;
            }
            Ok(())
        })
    }
}

fn insert_report(conn: &Connection, report: &EchoReport) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO echo_reports (id, created_at, content, job_types, style, user_input)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            report.id.as_str(),
            report.created_at,
            report.content.as_str(),
            to_json_text(&report.job_types)?,
            report.style.as_str(),
            report.user_input.as_deref(),
        ],
    )
    .map_err(|err| map_unique_violation(err, format!("echo report already exists: {}", report.id)))?;
    Ok(())
}

fn parse_report_row(row: &Row<'_>) -> RepoResult<EchoReport> {
    let style_text: String = row.get("style")?;
    let style = EchoStyle::parse(&style_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid style `{style_text}` in echo_reports.style"))
    })?;
    Ok(EchoReport {
        id: row.get("id")?,
        created_at: row.get("created_at")?,
        content: row.get("content")?,
        job_types: parse_json_column(row.get("job_types")?, "echo_reports.job_types")?,
        style,
        user_input: row.get("user_input")?,
    })
}
