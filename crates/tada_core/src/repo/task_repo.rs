//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over `tasks` and their `subtasks`.
//! - Own bulk denormalization writes (list rename, Trash moves, tag rename)
//!   with atomic semantics.
//!
//! # Invariants
//! - Write paths call `Task::validate()` before SQL mutations.
//! - A task write replaces its whole subtask set in the same transaction.
//! - Listing is deterministic: `order ASC, created_at ASC, id ASC`.

use crate::model::task::{Subtask, Task, TaskGroupCategory, TRASH_LIST_NAME};
use crate::repo::{
    bool_to_int, int_to_bool, map_unique_violation, parse_json_column, to_json_text,
    write_atomically, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    title,
    completed,
    completed_at,
    complete_percentage,
    due_date,
    list_id,
    list_name,
    content,
    \"order\",
    created_at,
    updated_at,
    tags,
    priority,
    group_category
FROM tasks";

/// Query options for listing tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListQuery {
    /// Exact list name match (case-insensitive).
    pub list_name: Option<String>,
    /// Exact tag match (case-insensitive).
    pub tag: Option<String>,
    pub include_completed: bool,
    pub include_trash: bool,
}

impl TaskListQuery {
    /// Every stored task, Trash included.
    pub fn everything() -> Self {
        Self {
            include_completed: true,
            include_trash: true,
            ..Self::default()
        }
    }
}

/// Repository interface for task persistence.
pub trait TaskRepository {
    fn create_task(&self, task: &Task) -> RepoResult<()>;
    /// Full replacement of one task row and its subtasks.
    fn update_task(&self, task: &Task) -> RepoResult<()>;
    fn get_task(&self, id: &str) -> RepoResult<Option<Task>>;
    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>>;
    /// Hard delete; subtasks cascade.
    fn delete_task(&self, id: &str) -> RepoResult<()>;
    /// Hard deletes every task in Trash. Returns affected rows.
    fn purge_trash(&self) -> RepoResult<usize>;
    /// Renames `old` to `new` in every task tag set. Returns touched tasks.
    fn rename_tag(&self, old: &str, new: &str, now_ms: i64) -> RepoResult<usize>;
    /// Removes `tag` from every task tag set. Returns touched tasks.
    fn remove_tag(&self, tag: &str, now_ms: i64) -> RepoResult<usize>;
    /// Sorted distinct tags across non-Trash tasks.
    fn list_tags(&self) -> RepoResult<Vec<String>>;
    /// Deletes every task then inserts `tasks`, in one transaction.
    fn replace_all(&self, tasks: &[Task]) -> RepoResult<()>;
    fn max_order(&self, list_name: &str) -> RepoResult<i64>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;
        let tx = self.conn.unchecked_transaction()?;
        insert_task(&tx, task)?;
        tx.commit()?;
        Ok(())
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE tasks
             SET
                title = ?2,
                completed = ?3,
                completed_at = ?4,
                complete_percentage = ?5,
                due_date = ?6,
                list_id = ?7,
                list_name = ?8,
                content = ?9,
                \"order\" = ?10,
                updated_at = ?11,
                tags = ?12,
                priority = ?13,
                group_category = ?14
             WHERE id = ?1;",
            params![
                task.id.as_str(),
                task.title.as_str(),
                bool_to_int(task.completed),
                task.completed_at,
                task.complete_percentage,
                task.due_date,
                task.list_id.as_deref(),
                task.list_name.as_str(),
                task.content.as_deref(),
                task.order,
                task.updated_at,
                to_json_text(&task.tags)?,
                task.priority,
                task.group_category.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("task", task.id.as_str()));
        }

        tx.execute(
            "DELETE FROM subtasks WHERE parent_id = ?1;",
            [task.id.as_str()],
        )?;
        for subtask in &task.subtasks {
            insert_subtask(&tx, &task.id, subtask)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_task(&self, id: &str) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            let mut task = parse_task_row(row)?;
            task.subtasks = load_subtasks(self.conn, &task.id)?;
            return Ok(Some(task));
        }
        Ok(None)
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_completed {
            sql.push_str(" AND completed = 0");
        }
        if !query.include_trash {
            sql.push_str(" AND list_name <> ?");
            bind_values.push(Value::Text(TRASH_LIST_NAME.to_string()));
        }
        if let Some(list_name) = query.list_name.as_ref() {
            sql.push_str(" AND list_name = ? COLLATE NOCASE");
            bind_values.push(Value::Text(list_name.clone()));
        }
        if let Some(tag) = query.tag.as_ref() {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1 FROM json_each(COALESCE(tasks.tags, '[]'))
                    WHERE json_each.value = ? COLLATE NOCASE
                )",
            );
            bind_values.push(Value::Text(tag.clone()));
        }
        sql.push_str(" ORDER BY \"order\" ASC, created_at ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        for task in &mut tasks {
            task.subtasks = load_subtasks(self.conn, &task.id)?;
        }
        Ok(tasks)
    }

    fn delete_task(&self, id: &str) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM tasks WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("task", id));
        }
        Ok(())
    }

    fn purge_trash(&self) -> RepoResult<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE list_name = ?1;", [TRASH_LIST_NAME])?;
        Ok(changed)
    }

    fn rename_tag(&self, old: &str, new: &str, now_ms: i64) -> RepoResult<usize> {
        rewrite_tags(self.conn, old, now_ms, |tags| {
            let mut next: Vec<String> = Vec::with_capacity(tags.len());
            for tag in tags {
                let value = if tag.eq_ignore_ascii_case(old) {
                    new.to_string()
                } else {
                    tag.clone()
                };
                if !next.iter().any(|existing| existing.eq_ignore_ascii_case(&value)) {
                    next.push(value);
                }
            }
            next
        })
    }

    fn remove_tag(&self, tag: &str, now_ms: i64) -> RepoResult<usize> {
        rewrite_tags(self.conn, tag, now_ms, |tags| {
            tags.iter()
                .filter(|value| !value.eq_ignore_ascii_case(tag))
                .cloned()
                .collect()
        })
    }

    fn list_tags(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT json_each.value
             FROM tasks, json_each(COALESCE(tasks.tags, '[]'))
             WHERE tasks.list_name <> ?1
             ORDER BY json_each.value COLLATE NOCASE ASC;",
        )?;
        let mut rows = stmt.query([TRASH_LIST_NAME])?;
        let mut tags: Vec<String> = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            if !tags.iter().any(|existing| existing.eq_ignore_ascii_case(&value)) {
                tags.push(value);
            }
        }
        Ok(tags)
    }

    fn replace_all(&self, tasks: &[Task]) -> RepoResult<()> {
        for task in tasks {
            task.validate()?;
        }
        write_atomically(self.conn, |conn| {
            conn.execute("DELETE FROM tasks;", [])?;
            for task in tasks {
                insert_task(conn, task)?;
            }
            Ok(())
        })
    }

    fn max_order(&self, list_name: &str) -> RepoResult<i64> {
        let value: Option<i64> = self.conn.query_row(
            "SELECT MAX(\"order\") FROM tasks WHERE list_name = ?1 COLLATE NOCASE;",
            [list_name],
            |row| row.get(0),
        )?;
        Ok(value.unwrap_or(0))
    }
}

fn insert_task(tx: &Connection, task: &Task) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO tasks (
            id,
            title,
            completed,
            completed_at,
            complete_percentage,
            due_date,
            list_id,
            list_name,
            content,
            \"order\",
            created_at,
            updated_at,
            tags,
            priority,
            group_category
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15);",
        params![
            task.id.as_str(),
            task.title.as_str(),
            bool_to_int(task.completed),
            task.completed_at,
            task.complete_percentage,
            task.due_date,
            task.list_id.as_deref(),
            task.list_name.as_str(),
            task.content.as_deref(),
            task.order,
            task.created_at,
            task.updated_at,
            to_json_text(&task.tags)?,
            task.priority,
            task.group_category.as_str(),
        ],
    )
    .map_err(|err| map_unique_violation(err, format!("task id already exists: {}", task.id)))?;

    for subtask in &task.subtasks {
        insert_subtask(tx, &task.id, subtask)?;
    }
    Ok(())
}

fn insert_subtask(tx: &Connection, parent_id: &str, subtask: &Subtask) -> RepoResult<()> {
    if subtask.title.trim().is_empty() {
        return Err(RepoError::InvalidData(format!(
            "subtask `{}` has a blank title",
            subtask.id
        )));
    }
    tx.execute(
        "INSERT INTO subtasks (
            id,
            parent_id,
            title,
            completed,
            completed_at,
            due_date,
            \"order\",
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            subtask.id.as_str(),
            parent_id,
            subtask.title.as_str(),
            bool_to_int(subtask.completed),
            subtask.completed_at,
            subtask.due_date,
            subtask.order,
            subtask.created_at,
            subtask.updated_at,
        ],
    )
    .map_err(|err| map_unique_violation(err, format!("subtask id already exists: {}", subtask.id)))?;
    Ok(())
}

fn load_subtasks(conn: &Connection, parent_id: &str) -> RepoResult<Vec<Subtask>> {
    let mut stmt = conn.prepare(
        "SELECT id, parent_id, title, completed, completed_at, due_date, \"order\", created_at, updated_at
         FROM subtasks
         WHERE parent_id = ?1
         ORDER BY \"order\" ASC, created_at ASC, id ASC;",
    )?;
    let mut rows = stmt.query([parent_id])?;
    let mut subtasks = Vec::new();
    while let Some(row) = rows.next()? {
        subtasks.push(Subtask {
            id: row.get("id")?,
            parent_id: row.get("parent_id")?,
            title: row.get("title")?,
            completed: int_to_bool(row.get("completed")?, "subtasks.completed")?,
            completed_at: row.get("completed_at")?,
            due_date: row.get("due_date")?,
            order: row.get("order")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        });
    }
    Ok(subtasks)
}

fn rewrite_tags(
    conn: &Connection,
    matching: &str,
    now_ms: i64,
    rewrite: impl Fn(&[String]) -> Vec<String>,
) -> RepoResult<usize> {
    let tx = conn.unchecked_transaction()?;
    let targets = {
        let mut stmt = tx.prepare(
            "SELECT id, tags FROM tasks
             WHERE EXISTS (
                SELECT 1 FROM json_each(COALESCE(tasks.tags, '[]'))
                WHERE json_each.value = ?1 COLLATE NOCASE
             );",
        )?;
        let mut rows = stmt.query([matching])?;
        let mut targets: Vec<(String, Vec<String>)> = Vec::new();
        while let Some(row) = rows.next()? {
            let tags: Vec<String> = parse_json_column(row.get("tags")?, "tasks.tags")?;
            targets.push((row.get("id")?, tags));
        }
        targets
    };

    for (id, tags) in &targets {
        let next = rewrite(tags);
        tx.execute(
            "UPDATE tasks SET tags = ?2, updated_at = ?3 WHERE id = ?1;",
            params![id.as_str(), to_json_text(&next)?, now_ms],
        )?;
    }
    tx.commit()?;
    Ok(targets.len())
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let category_text: String = row.get("group_category")?;
    let group_category = TaskGroupCategory::parse(&category_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid group category `{category_text}` in tasks.group_category"
        ))
    })?;

    let complete_percentage = match row.get::<_, Option<i64>>("complete_percentage")? {
        Some(value) => Some(u8::try_from(value).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid percentage `{value}` in tasks.complete_percentage"
            ))
        })?),
        None => None,
    };
    let priority = match row.get::<_, Option<i64>>("priority")? {
        Some(value) => Some(u8::try_from(value).map_err(|_| {
            RepoError::InvalidData(format!("invalid priority `{value}` in tasks.priority"))
        })?),
        None => None,
    };

    let task = Task {
        id: row.get("id")?,
        title: row.get("title")?,
        completed: int_to_bool(row.get("completed")?, "tasks.completed")?,
        completed_at: row.get("completed_at")?,
        complete_percentage,
        due_date: row.get("due_date")?,
        list_id: row.get("list_id")?,
        list_name: row.get("list_name")?,
        content: row.get("content")?,
        order: row.get("order")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        tags: parse_json_column(row.get("tags")?, "tasks.tags")?,
        priority,
        group_category,
        subtasks: Vec::new(),
    };
    task.validate()?;
    Ok(task)
}
