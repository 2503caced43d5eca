//! Task list repository contracts and SQLite implementation.
//!
//! # Invariants
//! - List names are unique case-insensitively (enforced by index).
//! - `rename_list` and `delete_list` update dependent tasks in the same
//!   transaction as the list row.

use crate::model::list::{list_name_key, TaskList};
use crate::model::task::{TaskGroupCategory, TRASH_LIST_NAME};
use crate::repo::{map_unique_violation, write_atomically, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const LIST_SELECT_SQL: &str =
    "SELECT id, name, icon, color, \"order\", created_at, updated_at FROM lists";

/// Repository interface for task lists.
pub trait ListRepository {
    fn create_list(&self, list: &TaskList) -> RepoResult<()>;
    fn get_list(&self, id: &str) -> RepoResult<Option<TaskList>>;
    fn find_by_name(&self, name: &str) -> RepoResult<Option<TaskList>>;
    /// All lists ordered by `order` (unset last), then name.
    fn list_lists(&self) -> RepoResult<Vec<TaskList>>;
    /// Updates icon/color/order only.
    fn update_list_meta(&self, list: &TaskList) -> RepoResult<()>;
    /// Renames a list and rewrites `list_name` on all of its tasks.
    /// Returns the number of tasks touched.
    fn rename_list(&self, id: &str, new_name: &str, now_ms: i64) -> RepoResult<usize>;
    /// Deletes a list and moves its tasks to Trash. Returns moved tasks.
    fn delete_list(&self, id: &str, now_ms: i64) -> RepoResult<usize>;
    fn replace_all(&self, lists: &[TaskList]) -> RepoResult<()>;
}

pub struct SqliteListRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteListRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ListRepository for SqliteListRepository<'_> {
    fn create_list(&self, list: &TaskList) -> RepoResult<()> {
        insert_list(self.conn, list)
    }

    fn get_list(&self, id: &str) -> RepoResult<Option<TaskList>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LIST_SELECT_SQL} WHERE id = ?1;"))?;
        Ok(stmt.query_row([id], parse_list_row).optional()?)
    }

    /// SQLite `NOCASE` only folds ASCII, so names are matched in Rust.
    fn find_by_name(&self, name: &str) -> RepoResult<Option<TaskList>> {
        let key = list_name_key(name);
        Ok(self
            .list_lists()?
            .into_iter()
            .find(|list| list_name_key(&list.name) == key))
    }

    fn list_lists(&self) -> RepoResult<Vec<TaskList>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LIST_SELECT_SQL} ORDER BY \"order\" IS NULL, \"order\" ASC, name COLLATE NOCASE ASC;"
        ))?;
        let rows = stmt.query_map([], parse_list_row)?;
        let mut lists = Vec::new();
        for row in rows {
            lists.push(row?);
        }
        Ok(lists)
    }

    fn update_list_meta(&self, list: &TaskList) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE lists SET icon = ?2, color = ?3, \"order\" = ?4, updated_at = ?5 WHERE id = ?1;",
            params![
                list.id.as_str(),
                list.icon.as_deref(),
                list.color.as_deref(),
                list.order,
                list.updated_at,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("list", list.id.as_str()));
        }
        Ok(())
    }

    fn rename_list(&self, id: &str, new_name: &str, now_ms: i64) -> RepoResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let old_name: Option<String> = tx
            .query_row("SELECT name FROM lists WHERE id = ?1;", [id], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(old_name) = old_name else {
            return Err(RepoError::not_found("list", id));
        };

        tx.execute(
            "UPDATE lists SET name = ?2, updated_at = ?3 WHERE id = ?1;",
            params![id, new_name, now_ms],
        )
        .map_err(|err| map_unique_violation(err, format!("list name already exists: {new_name}")))?;

        // Tasks synced from elsewhere may carry the name without the id.
        let touched = tx.execute(
            "UPDATE tasks
             SET list_name = ?3, list_id = ?1, updated_at = ?4
             WHERE list_id = ?1
                OR (list_id IS NULL AND list_name = ?2 COLLATE NOCASE);",
            params![id, old_name.as_str(), new_name, now_ms],
        )?;
        tx.commit()?;
        Ok(touched)
    }

    fn delete_list(&self, id: &str, now_ms: i64) -> RepoResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let name: Option<String> = tx
            .query_row("SELECT name FROM lists WHERE id = ?1;", [id], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(name) = name else {
            return Err(RepoError::not_found("list", id));
        };

        let moved = tx.execute(
            "UPDATE tasks
             SET list_name = ?3, list_id = NULL, group_category = ?4, updated_at = ?5
             WHERE list_id = ?1
                OR (list_id IS NULL AND list_name = ?2 COLLATE NOCASE);",
            params![
                id,
                name.as_str(),
                TRASH_LIST_NAME,
                TaskGroupCategory::NoDate.as_str(),
                now_ms
            ],
        )?;
        tx.execute("DELETE FROM lists WHERE id = ?1;", [id])?;
        tx.commit()?;
        Ok(moved)
    }

    fn replace_all(&self, lists: &[TaskList]) -> RepoResult<()> {
        write_atomically(self.conn, |conn| {
            conn.execute("DELETE FROM lists;", [])?;
            for list in lists {
                insert_list(conn, list)?;
            }
            Ok(())
        })
    }
}

fn insert_list(conn: &Connection, list: &TaskList) -> RepoResult<()> {
    if list.name.trim().is_empty() {
        return Err(RepoError::InvalidData(format!(
            "list `{}` has a blank name",
            list.id
        )));
    }
    conn.execute(
        "INSERT INTO lists (id, name, icon, color, \"order\", created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            list.id.as_str(),
            list.name.as_str(),
            list.icon.as_deref(),
            list.color.as_deref(),
            list.order,
            list.created_at,
            list.updated_at,
        ],
    )
    .map_err(|err| map_unique_violation(err, format!("list already exists: {}", list.name)))?;
    Ok(())
}

fn parse_list_row(row: &Row<'_>) -> rusqlite::Result<TaskList> {
    Ok(TaskList {
        id: row.get("id")?,
        name: row.get("name")?,
        icon: row.get("icon")?,
        color: row.get("color")?,
        order: row.get("order")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
