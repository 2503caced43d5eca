use chrono::{Days, TimeZone, Utc};
use rusqlite::Connection;
use tada_core::export::ics::{format_date, render_calendar, IcsOptions};
use tada_core::grouping::{local_today, start_of_local_day_ms};
use tada_core::model::settings::PreferenceSettings;
use tada_core::repo::list_repo::SqliteListRepository;
use tada_core::repo::task_repo::{SqliteTaskRepository, TaskListQuery};
use tada_core::{open_db_in_memory, NewTask, TaskService};

fn service(conn: &Connection) -> TaskService<SqliteTaskRepository<'_>, SqliteListRepository<'_>> {
    TaskService::new(SqliteTaskRepository::new(conn), SqliteListRepository::new(conn))
}

fn options() -> IcsOptions {
    IcsOptions {
        calendar_name: "My tasks".to_string(),
        reminder_minutes: 9 * 60,
        generated_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap(),
    }
}

#[test]
fn only_open_due_dated_tasks_become_events() {
    let conn = open_db_in_memory().unwrap();
    let tasks = service(&conn);
    let prefs = PreferenceSettings::default();
    let today = local_today();
    let due = |title: &str| NewTask {
        due_date: Some(start_of_local_day_ms(today)),
        ..NewTask::titled(title)
    };

    let open = tasks.create_task(due("Dentist, 10am"), &prefs).unwrap();
    let done = tasks.create_task(due("Already done"), &prefs).unwrap();
    tasks.complete_task(&done.id).unwrap();
    let trashed = tasks.create_task(due("Thrown away"), &prefs).unwrap();
    tasks.move_to_trash(&trashed.id).unwrap();
    tasks.create_task(NewTask::titled("Someday"), &prefs).unwrap();

    let all = tasks.list_tasks(&TaskListQuery::everything()).unwrap();
    let calendar = render_calendar(&all, &options());

    assert_eq!(calendar.matches("BEGIN:VEVENT").count(), 1);
    assert!(calendar.contains(&format!("UID:{}@tada", open.id)));
    assert!(calendar.contains("SUMMARY:Dentist\\, 10am"));
    assert!(calendar.contains(&format!("DTSTART;VALUE=DATE:{}", format_date(today))));
    let next = today.checked_add_days(Days::new(1)).unwrap();
    assert!(calendar.contains(&format!("DTEND;VALUE=DATE:{}", format_date(next))));
    assert!(calendar.contains("DTSTAMP:20240301T083000Z"));
    assert!(calendar.contains("X-WR-CALNAME:My tasks"));
}

#[test]
fn events_carry_a_display_alarm() {
    let conn = open_db_in_memory().unwrap();
    let task = service(&conn)
        .create_task(
            NewTask {
                due_date: Some(start_of_local_day_ms(local_today())),
                ..NewTask::titled("Pay rent")
            },
            &PreferenceSettings::default(),
        )
        .unwrap();

    let calendar = render_calendar(&[task], &options());

    assert!(calendar.contains("BEGIN:VALARM\r\nACTION:DISPLAY\r\n"));
    assert!(calendar.contains("TRIGGER:PT9H\r\n"));
    assert!(calendar.contains("END:VALARM\r\nEND:VEVENT\r\n"));
}

#[test]
fn output_uses_crlf_line_endings() {
    let calendar = render_calendar(&[], &options());

    assert!(calendar.starts_with("BEGIN:VCALENDAR\r\n"));
    assert!(calendar.ends_with("END:VCALENDAR\r\n"));
    assert_eq!(calendar.matches('\n').count(), calendar.matches("\r\n").count());
    assert!(!calendar.contains("BEGIN:VEVENT"));
}

#[test]
fn long_titles_are_folded() {
    let conn = open_db_in_memory().unwrap();
    let title = "word ".repeat(40);
    let task = service(&conn)
        .create_task(
            NewTask {
                due_date: Some(start_of_local_day_ms(local_today())),
                ..NewTask::titled(title.clone())
            },
            &PreferenceSettings::default(),
        )
        .unwrap();

    let calendar = render_calendar(&[task], &options());

    for line in calendar.split("\r\n") {
        assert!(line.len() <= 75, "line too long: {line}");
    }
    assert!(calendar.contains("\r\n "));
}
