//! Key/value settings repository. Values are JSON documents.

use crate::repo::{write_atomically, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

pub const APPEARANCE_KEY: &str = "appearance";
pub const PREFERENCES_KEY: &str = "preferences";
pub const AI_KEY: &str = "ai";
pub const SCHEDULE_KEY: &str = "schedule";

pub trait SettingsRepository {
    fn get_raw(&self, key: &str) -> RepoResult<Option<serde_json::Value>>;
    fn put_raw(&self, key: &str, value: &serde_json::Value, now_ms: i64) -> RepoResult<()>;
    fn all(&self) -> RepoResult<BTreeMap<String, serde_json::Value>>;
    fn replace_all(
        &self,
        values: &BTreeMap<String, serde_json::Value>,
        now_ms: i64,
    ) -> RepoResult<()>;

    /// Typed read; `None` when the key was never written.
    fn get<T: DeserializeOwned>(&self, key: &str) -> RepoResult<Option<T>> {
        match self.get_raw(key)? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|err| {
                RepoError::InvalidData(format!("invalid settings value for `{key}`: {err}"))
            }),
        }
    }

    fn put<T: Serialize>(&self, key: &str, value: &T, now_ms: i64) -> RepoResult<()> {
        let encoded = serde_json::to_value(value).map_err(|err| {
            RepoError::InvalidData(format!("failed to encode settings `{key}`: {err}"))
        })?;
        self.put_raw(key, &encoded, now_ms)
    }
}

pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn get_raw(&self, key: &str) -> RepoResult<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1;", [key], |row| {
                row.get(0)
            })
            .optional()?;
        raw.map(|text| decode_value(key, &text)).transpose()
    }

    fn put_raw(&self, key: &str, value: &serde_json::Value, now_ms: i64) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at;",
            params![key, value.to_string(), now_ms],
        )?;
        Ok(())
    }

    fn all(&self) -> RepoResult<BTreeMap<String, serde_json::Value>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM settings ORDER BY key ASC;")?;
        let mut rows = stmt.query([])?;
        let mut values = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let text: String = row.get(1)?;
            let value = decode_value(&key, &text)?;
            values.insert(key, value);
        }
        Ok(values)
    }

    fn replace_all(
        &self,
        values: &BTreeMap<String, serde_json::Value>,
        now_ms: i64,
    ) -> RepoResult<()> {
        write_atomically(self.conn, |conn| {
            conn.execute("DELETE FROM settings;", [])?;
            for (key, value) in values {
                conn.execute(
                    "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3);",
                    params![key.as_str(), value.to_string(), now_ms],
                )?;
            }
            Ok(())
        })
    }
}

fn decode_value(key: &str, text: &str) -> RepoResult<serde_json::Value> {
    serde_json::from_str(text)
        .map_err(|err| RepoError::InvalidData(format!("invalid JSON in settings `{key}`: {err}")))
}
