//! Human-readable rendering. `--json` bypasses all of this.

use anyhow::Result;
use serde::Serialize;
use tada_core::grouping::local_date_of;
use tada_core::{Task, TaskGroup, TaskList};

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn task_line(task: &Task) -> String {
    let mark = if task.completed {
        "[x]".to_string()
    } else if let Some(pct) = task.complete_percentage.filter(|pct| *pct > 0) {
        format!("[{pct}%]")
    } else {
        "[ ]".to_string()
    };
    let mut line = format!("{mark} {}", task.title);
    if let Some(priority) = task.priority {
        line.push_str(&format!(" !{priority}"));
    }
    if let Some(day) = task.due_date.and_then(local_date_of) {
        line.push_str(&format!(" due {day}"));
    }
    for tag in &task.tags {
        line.push_str(&format!(" #{tag}"));
    }
    line.push_str(&format!("  <{}> {}", task.list_name, task.id));
    line
}

pub fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("(no tasks)");
    }
    for task in tasks {
        println!("{}", task_line(task));
    }
}

pub fn print_groups(groups: &[TaskGroup]) {
    if groups.is_empty() {
        println!("(no tasks)");
    }
    for group in groups {
        println!("{} ({})", group.category.label(), group.tasks.len());
        for task in &group.tasks {
            println!("  {}", task_line(task));
        }
    }
}

pub fn print_task_detail(task: &Task) {
    println!("{}", task_line(task));
    if let Some(content) = task.content.as_deref() {
        for line in content.lines() {
            println!("    {line}");
        }
    }
    for subtask in &task.subtasks {
        let mark = if subtask.completed { "x" } else { " " };
        println!("    - [{mark}] {}  {}", subtask.title, subtask.id);
    }
}

pub fn print_lists(lists: &[TaskList]) {
    for list in lists {
        let icon = list.icon.as_deref().unwrap_or("-");
        println!("{icon} {}  {}", list.name, list.id);
    }
}

#[cfg(test)]
mod tests {
    use super::task_line;
    use tada_core::Task;

    #[test]
    fn task_line_shows_state_priority_and_tags() {
        let mut task = Task::new("Write report", 0);
        task.priority = Some(1);
        task.tags = vec!["work".to_string()];
        task.complete_percentage = Some(40);
        let line = task_line(&task);
        assert!(line.starts_with("[40%] Write report !1"));
        assert!(line.contains("#work"));
        assert!(line.contains("<Inbox>"));
    }
}
