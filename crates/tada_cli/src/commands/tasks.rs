use crate::cli::{AddArgs, EditArgs, LsArgs, SubtaskCommand};
use crate::context::{parse_due, App};
use crate::output::{print_groups, print_json, print_task_detail, print_tasks, task_line};
use anyhow::{bail, Result};
use tada_core::grouping::local_today;
use tada_core::model::task::TRASH_LIST_NAME;
use tada_core::repo::task_repo::TaskListQuery;
use tada_core::{NewTask, Task, TaskPatch};

pub fn add(app: &App, args: AddArgs) -> Result<()> {
    let prefs = app.settings().preferences()?;
    let input = NewTask {
        title: args.title,
        content: args.note,
        due_date: args.due.as_deref().map(parse_due).transpose()?,
        priority: args.priority,
        tags: args.tags,
        list_name: args.list,
    };
    let task = app.tasks().create_task(input, &prefs)?;
    report(app, &task)
}

pub fn list(app: &App, args: LsArgs) -> Result<()> {
    let service = app.tasks();
    let query = TaskListQuery {
        list_name: if args.trash {
            Some(TRASH_LIST_NAME.to_string())
        } else {
            args.list
        },
        tag: args.tag,
        include_completed: args.all || args.trash,
        include_trash: args.trash,
    };

    if args.flat || args.trash {
        let tasks = service.list_tasks(&query)?;
        if app.json {
            return print_json(&tasks);
        }
        print_tasks(&tasks);
    } else {
        let groups = service.grouped_tasks(&query, local_today())?;
        if app.json {
            return print_json(&groups);
        }
        print_groups(&groups);
    }
    Ok(())
}

pub fn show(app: &App, id: &str) -> Result<()> {
    let task = app.tasks().get_task(&resolve_task_id(app, id)?)?;
    if app.json {
        return print_json(&task);
    }
    print_task_detail(&task);
    Ok(())
}

pub fn edit(app: &App, args: EditArgs) -> Result<()> {
    let id = resolve_task_id(app, &args.id)?;
    let patch = TaskPatch {
        title: args.title,
        content: if args.clear_note {
            Some(None)
        } else {
            args.note.map(Some)
        },
        due_date: if args.clear_due {
            Some(None)
        } else {
            args.due.as_deref().map(parse_due).transpose()?.map(Some)
        },
        priority: if args.clear_priority {
            Some(None)
        } else {
            args.priority.map(Some)
        },
        tags: args.tags,
        list_name: args.list,
    };
    if patch == TaskPatch::default() {
        bail!("nothing to change; pass at least one field");
    }
    let task = app.tasks().update_task(&id, patch)?;
    report(app, &task)
}

pub fn complete(app: &App, id: &str, done: bool) -> Result<()> {
    let id = resolve_task_id(app, id)?;
    let service = app.tasks();
    let task = if done {
        service.complete_task(&id)?
    } else {
        service.reopen_task(&id)?
    };
    report(app, &task)
}

pub fn progress(app: &App, id: &str, percent: u8) -> Result<()> {
    if percent > 100 {
        bail!("percentage must be 0..=100, got {percent}");
    }
    let id = resolve_task_id(app, id)?;
    let value = (percent > 0).then_some(percent);
    let task = app.tasks().set_percentage(&id, value)?;
    report(app, &task)
}

pub fn trash(app: &App, id: &str) -> Result<()> {
    let task = app.tasks().move_to_trash(&resolve_task_id(app, id)?)?;
    report(app, &task)
}

pub fn restore(app: &App, id: &str) -> Result<()> {
    let task = app.tasks().restore_from_trash(&resolve_task_id(app, id)?)?;
    report(app, &task)
}

pub fn purge(app: &App, id: &str) -> Result<()> {
    let id = resolve_task_id(app, id)?;
    app.tasks().delete_permanently(&id)?;
    println!("deleted {id}");
    Ok(())
}

pub fn empty_trash(app: &App) -> Result<()> {
    let removed = app.tasks().empty_trash()?;
    println!("removed {removed} task(s) from Trash");
    Ok(())
}

pub fn subtask(app: &App, command: SubtaskCommand) -> Result<()> {
    let service = app.tasks();
    let task = match command {
        SubtaskCommand::Add { task, title } => {
            service.add_subtask(&resolve_task_id(app, &task)?, &title)?
        }
        SubtaskCommand::Toggle { task, subtask } => {
            service.toggle_subtask(&resolve_task_id(app, &task)?, &subtask)?
        }
        SubtaskCommand::Rm { task, subtask } => {
            service.remove_subtask(&resolve_task_id(app, &task)?, &subtask)?
        }
    };
    if app.json {
        return print_json(&task);
    }
    print_task_detail(&task);
    Ok(())
}

/// Expands a unique id prefix into a full task id.
pub fn resolve_task_id(app: &App, prefix: &str) -> Result<String> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        bail!("task id cannot be empty");
    }
    let tasks = app.tasks().list_tasks(&TaskListQuery::everything())?;
    match_prefix(&tasks, prefix)
}

fn match_prefix(tasks: &[Task], prefix: &str) -> Result<String> {
    if let Some(task) = tasks.iter().find(|task| task.id == prefix) {
        return Ok(task.id.clone());
    }
    let matches: Vec<&Task> = tasks
        .iter()
        .filter(|task| task.id.starts_with(prefix))
        .collect();
    match matches.as_slice() {
        [task] => Ok(task.id.clone()),
        [] => bail!("no task matches `{prefix}`"),
        _ => bail!("`{prefix}` matches {} tasks; use more characters", matches.len()),
    }
}

fn report(app: &App, task: &Task) -> Result<()> {
    if app.json {
        return print_json(task);
    }
    println!("{}", task_line(task));
    Ok(())
}
