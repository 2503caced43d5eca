use crate::cli::{IcsArgs, ImportModeArg, SearchArgs};
use crate::context::App;
use crate::output::print_json;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use tada_core::export::{render_calendar, IcsOptions};
use tada_core::repo::task_repo::TaskListQuery;
use tada_core::service::data_service::{DataService, ImportMode};
use tada_core::{search_tasks, SearchQuery};

pub fn search(app: &App, args: SearchArgs) -> Result<()> {
    let query = SearchQuery {
        include_completed: !args.open_only,
        limit: args.limit,
        raw_fts_syntax: args.raw,
        ..SearchQuery::new(args.text)
    };
    let hits = search_tasks(&app.conn, &query)?;
    if app.json {
        return print_json(&hits);
    }
    if hits.is_empty() {
        println!("(no matches)");
    }
    for hit in hits {
        let mark = if hit.completed { "x" } else { " " };
        println!("[{mark}] {}  <{}> {}", hit.title, hit.list_name, hit.task_id);
        if !hit.snippet.trim().is_empty() {
            println!("    {}", hit.snippet);
        }
    }
    Ok(())
}

pub fn export(app: &App, file: &Path) -> Result<()> {
    let service = DataService::load(&app.conn)?;
    let bundle = service.export_to_file(file)?;
    println!(
        "exported {} task(s), {} list(s), {} summary(ies), {} echo report(s) to {}",
        bundle.tasks.len(),
        bundle.lists.len(),
        bundle.summaries.len(),
        bundle.echo_reports.len(),
        file.display()
    );
    Ok(())
}

pub fn import(app: &App, file: &Path, mode: ImportModeArg) -> Result<()> {
    let mode = match mode {
        ImportModeArg::Replace => ImportMode::Replace,
        ImportModeArg::Merge => ImportMode::Merge,
    };
    let mut service = DataService::load(&app.conn)?;
    let report = service
        .import_from_file(file, mode)
        .with_context(|| format!("failed to import `{}`", file.display()))?;
    if app.json {
        return print_json(&report);
    }
    println!(
        "imported {} task(s), {} list(s), {} setting(s), {} summary(ies), {} echo report(s)",
        report.tasks, report.lists, report.settings, report.summaries, report.echo_reports
    );
    Ok(())
}

pub fn ics(app: &App, args: IcsArgs) -> Result<()> {
    let tasks = app.tasks().list_tasks(&TaskListQuery::default())?;
    let options = IcsOptions {
        calendar_name: args.name,
        reminder_minutes: args.reminder_minutes,
        generated_at: Utc::now(),
    };
    let calendar = render_calendar(&tasks, &options);
    match args.out {
        Some(path) => {
            std::fs::write(&path, calendar)
                .with_context(|| format!("failed to write `{}`", path.display()))?;
            println!("wrote {}", path.display());
        }
        None => print!("{calendar}"),
    }
    Ok(())
}
