use crate::cli::{EchoCommand, EchoStyleArg, PeriodArgs, ScheduleCommand, SuggestArgs, SummaryCommand};
use crate::context::{block_on, parse_day, App};
use crate::output::{print_json, print_tasks};
use anyhow::{anyhow, bail, Result};
use log::{info, warn};
use std::io::{self, Write};
use std::sync::mpsc;
use tada_core::ai::prompts::task_suggestion_request;
use tada_core::ai::{parse_task_suggestions, AiProvider};
use tada_core::grouping::local_today;
use tada_core::model::settings::ScheduleSettings;
use tada_core::model::summary::EchoStyle;
use tada_core::service::echo_service::EchoRequest;
use tada_core::service::summary_service::SummaryPeriod;
use tada_core::Scheduler;

pub fn summary(app: &App, command: SummaryCommand) -> Result<()> {
    let service = app.summaries();
    let today = local_today();
    match command {
        SummaryCommand::Preview(args) => {
            let period = period_from(&args)?;
            let tasks = service.candidates(period, &args.list, today)?;
            if app.json {
                return print_json(&tasks);
            }
            println!("{} / {}: {} task(s)", period.label(), args.list, tasks.len());
            print_tasks(&tasks);
        }
        SummaryCommand::Generate { period: args, stream } => {
            let period = period_from(&args)?;
            let client = app.ai_client()?;
            let profile = app.profile().get()?;
            let profile = profile.onboarding_completed.then_some(&profile);
            let language = app.language()?;
            if stream && !app.json {
                block_on(service.generate_streamed(
                    &client,
                    period,
                    &args.list,
                    today,
                    profile,
                    &language,
                    &mut print_fragment,
                ))??;
                println!();
                return Ok(());
            }
            let summary = block_on(service.generate(
                &client, period, &args.list, today, profile, &language,
            ))??;
            if app.json {
                return print_json(&summary);
            }
            println!("{}", summary.summary_text);
        }
        SummaryCommand::Ls(args) => {
            let period = period_from(&args)?;
            let summaries = service.summaries_for(period, &args.list)?;
            if app.json {
                return print_json(&summaries);
            }
            for summary in summaries {
                println!(
                    "== {} ({} task(s))\n{}\n",
                    summary.id,
                    summary.task_ids.len(),
                    summary.summary_text
                );
            }
        }
        SummaryCommand::Edit { id, text } => {
            let summary = service.update_text(&id, &text)?;
            println!("updated summary {}", summary.id);
        }
        SummaryCommand::Rm { id } => {
            service.delete(&id)?;
            println!("deleted summary {id}");
        }
    }
    Ok(())
}

pub fn echo(app: &App, command: EchoCommand) -> Result<()> {
    let service = app.echoes();
    match command {
        EchoCommand::Generate {
            style,
            job_types,
            note,
            stream,
        } => {
            let client = app.ai_client()?;
            let profile = app.profile().get()?;
            let language = app.language()?;
            let request = EchoRequest {
                style: echo_style(style),
                job_types,
                user_input: note,
            };
            if stream && !app.json {
                block_on(service.generate_streamed(
                    &client,
                    &profile,
                    request,
                    local_today(),
                    &language,
                    &mut print_fragment,
                ))??;
                println!();
                return Ok(());
            }
            let report = block_on(service.generate(
                &client,
                &profile,
                request,
                local_today(),
                &language,
            ))??;
            if app.json {
                return print_json(&report);
            }
            println!("{}", report.content);
        }
        EchoCommand::Ls { limit } => {
            let reports = service.list(limit)?;
            if app.json {
                return print_json(&reports);
            }
            for report in reports {
                let first_line = report.content.lines().next().unwrap_or_default();
                println!("{}  [{}] {}", report.id, report.style.as_str(), first_line);
            }
        }
        EchoCommand::Show { id } => {
            let report = service.get(&id)?;
            if app.json {
                return print_json(&report);
            }
            println!("{}", report.content);
        }
        EchoCommand::Rm { id } => {
            service.delete(&id)?;
            println!("deleted echo report {id}");
        }
    }
    Ok(())
}

pub fn suggest(app: &App, args: SuggestArgs) -> Result<()> {
    let client = app.ai_client()?;
    let lists = app.lists().list_lists()?;
    let request = task_suggestion_request(&args.text, &lists, local_today());
    let reply = block_on(client.complete(&request))??;
    let suggestions = parse_task_suggestions(&reply)
        .map_err(|err| anyhow!("could not read suggestions from the model: {err}"))?;

    if !args.apply {
        if app.json {
            let titles: Vec<&str> = suggestions.iter().map(|s| s.title.as_str()).collect();
            return print_json(&titles);
        }
        for suggestion in &suggestions {
            let due = suggestion.due_date.as_deref().unwrap_or("-");
            println!("- {} (due {due})", suggestion.title);
        }
        return Ok(());
    }

    let prefs = app.settings().preferences()?;
    let service = app.tasks();
    let mut created = Vec::with_capacity(suggestions.len());
    for suggestion in suggestions {
        created.push(service.create_task(suggestion.into_new_task(args.list.clone()), &prefs)?);
    }
    if app.json {
        return print_json(&created);
    }
    println!("created {} task(s)", created.len());
    print_tasks(&created);
    Ok(())
}

pub fn schedule(app: &App, command: ScheduleCommand) -> Result<()> {
    let settings = app.settings();
    match command {
        ScheduleCommand::Show => {
            let schedule = settings.schedule()?;
            if app.json {
                return print_json(&schedule);
            }
            print_schedule(&schedule);
        }
        ScheduleCommand::Set {
            enable,
            disable,
            time,
            days,
        } => {
            let mut schedule = settings.schedule()?;
            if enable {
                schedule.enabled = true;
            }
            if disable {
                schedule.enabled = false;
            }
            if let Some(time) = time {
                schedule.time = time;
            }
            if let Some(days) = days {
                schedule.days = days;
            }
            let saved = settings.update_schedule(&schedule)?;
            print_schedule(&saved);
        }
        ScheduleCommand::Run => run_scheduler(app)?,
    }
    Ok(())
}

/// Blocks forever, generating at most one echo report per scheduled day.
fn run_scheduler(app: &App) -> Result<()> {
    let schedule = app.settings().schedule()?;
    if !schedule.enabled {
        bail!("schedule is disabled; run `tada schedule set --enable` first");
    }
    let (tx, rx) = mpsc::channel();
    let scheduler = Scheduler::spawn(schedule.clone(), tx)?;
    print_schedule(&schedule);
    println!("waiting for the next scheduled run (Ctrl+C to stop)");

    for trigger in rx {
        info!(
            "event=schedule_trigger module=cli status=ok date={} time={}",
            trigger.date, trigger.time
        );
        let today = trigger.local_date().unwrap_or_else(local_today);
        match scheduled_echo(app, today) {
            Ok(Some(id)) => println!("{} {}: generated echo report {id}", trigger.date, trigger.time),
            Ok(None) => println!("{}: report already exists, skipped", trigger.date),
            Err(err) => {
                warn!("event=schedule_run module=cli status=error error={err:#}");
                eprintln!("scheduled report failed: {err:#}");
            }
        }
        // Pick up edits made from another process since the last run.
        if let Ok(latest) = app.settings().schedule() {
            scheduler.update_settings(latest);
        }
    }
    Ok(())
}

fn scheduled_echo(app: &App, today: chrono::NaiveDate) -> Result<Option<String>> {
    let client = app.ai_client()?;
    let profile = app.profile().get()?;
    let language = app.language()?;
    let report = block_on(app.echoes().generate_if_absent(
        &client,
        &profile,
        EchoRequest::default(),
        today,
        &language,
    ))??;
    Ok(report.map(|report| report.id))
}

fn period_from(args: &PeriodArgs) -> Result<SummaryPeriod> {
    match (&args.from, &args.to) {
        (Some(from), Some(to)) => Ok(SummaryPeriod::custom(parse_day(from)?, parse_day(to)?)?),
        _ => Ok(SummaryPeriod::parse(&args.period)?),
    }
}

fn echo_style(style: EchoStyleArg) -> EchoStyle {
    match style {
        EchoStyleArg::Balanced => EchoStyle::Balanced,
        EchoStyleArg::Exploration => EchoStyle::Exploration,
        EchoStyleArg::Reflection => EchoStyle::Reflection,
    }
}

fn print_schedule(schedule: &ScheduleSettings) {
    const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    let days: Vec<&str> = schedule
        .days
        .iter()
        .filter_map(|day| DAY_NAMES.get(usize::from(*day)).copied())
        .collect();
    let state = if schedule.enabled { "enabled" } else { "disabled" };
    println!("{state} at {} on {}", schedule.time, days.join(","));
}

/// Writes one streamed fragment straight to stdout.
fn print_fragment(fragment: &str) {
    let mut stdout = io::stdout().lock();
    // A closed pipe only loses the live echo; the text is still stored.
    let _ = stdout.write_all(fragment.as_bytes()).and_then(|()| stdout.flush());
}

#[cfg(test)]
mod tests {
    use super::period_from;
    use crate::cli::PeriodArgs;
    use tada_core::service::summary_service::SummaryPeriod;

    fn args(period: &str, from: Option<&str>, to: Option<&str>) -> PeriodArgs {
        PeriodArgs {
            period: period.to_string(),
            from: from.map(str::to_string),
            to: to.map(str::to_string),
            list: "all".to_string(),
        }
    }

    #[test]
    fn custom_range_overrides_named_period() {
        let period = period_from(&args("today", Some("2026-01-05"), Some("2026-01-09"))).unwrap();
        assert_eq!(period.key(), "custom_2026-01-05_2026-01-09");
    }

    #[test]
    fn named_periods_parse_and_unknown_ones_fail() {
        assert_eq!(
            period_from(&args("lastMonth", None, None)).unwrap(),
            SummaryPeriod::LastMonth
        );
        assert!(period_from(&args("fortnight", None, None)).is_err());
        assert!(period_from(&args("today", Some("2026-02-01"), Some("2026-01-01"))).is_err());
    }
}
