//! RFC 5545 calendar rendering for due-dated tasks.
//!
//! # Invariants
//! - Exactly one VEVENT per task that is incomplete, outside Trash and has a
//!   due date. Everything else is omitted.
//! - Events are all-day (`VALUE=DATE`) on the local due day and carry one
//!   DISPLAY alarm.
//! - Output lines end with CRLF and are folded at 75 octets.

use crate::grouping::local_date_of;
use crate::model::task::Task;
use chrono::{DateTime, Days, NaiveDate, Utc};

const PRODUCT_ID: &str = "-//Tada//Task Calendar//EN";
const MAX_LINE_OCTETS: usize = 75;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcsOptions {
    pub calendar_name: String,
    /// Alarm offset in minutes from the start of the due day. Negative values
    /// fire the evening before.
    pub reminder_minutes: i64,
    pub generated_at: DateTime<Utc>,
}

impl Default for IcsOptions {
    fn default() -> Self {
        Self {
            calendar_name: "Tada".to_string(),
            reminder_minutes: 9 * 60,
            generated_at: Utc::now(),
        }
    }
}

/// Whether `task` becomes a VEVENT.
pub fn is_exportable(task: &Task) -> bool {
    !task.completed && !task.is_in_trash() && task.due_date.is_some()
}

pub fn render_calendar(tasks: &[Task], options: &IcsOptions) -> String {
    let mut out = String::new();
    push_line(&mut out, "BEGIN:VCALENDAR");
    push_line(&mut out, "VERSION:2.0");
    push_line(&mut out, &format!("PRODID:{PRODUCT_ID}"));
    push_line(&mut out, "CALSCALE:GREGORIAN");
    push_line(&mut out, "METHOD:PUBLISH");
    push_line(
        &mut out,
        &format!("X-WR-CALNAME:{}", escape_text(&options.calendar_name)),
    );

    let stamp = options.generated_at.format("%Y%m%dT%H%M%SZ").to_string();
    for task in tasks.iter().filter(|task| is_exportable(task)) {
        let Some(due_day) = task.due_date.and_then(local_date_of) else {
            continue;
        };
        render_event(&mut out, task, due_day, &stamp, options.reminder_minutes);
    }

    push_line(&mut out, "END:VCALENDAR");
    out
}

fn render_event(out: &mut String, task: &Task, due_day: NaiveDate, stamp: &str, reminder: i64) {
    let next_day = due_day.checked_add_days(Days::new(1)).unwrap_or(due_day);
    let summary = escape_text(task.title.trim());

    push_line(out, "BEGIN:VEVENT");
    push_line(out, &format!("UID:{}@tada", task.id));
    push_line(out, &format!("DTSTAMP:{stamp}"));
    push_line(out, &format!("DTSTART;VALUE=DATE:{}", format_date(due_day)));
    push_line(out, &format!("DTEND;VALUE=DATE:{}", format_date(next_day)));
    push_line(out, &format!("SUMMARY:{summary}"));
    if let Some(content) = task.content.as_deref().map(str::trim) {
        if !content.is_empty() {
            push_line(out, &format!("DESCRIPTION:{}", escape_text(content)));
        }
    }
    let mut categories = vec![escape_text(&task.list_name)];
    categories.extend(task.tags.iter().map(|tag| escape_text(tag)));
    push_line(out, &format!("CATEGORIES:{}", categories.join(",")));
    if let Some(priority) = task.priority.and_then(ical_priority) {
        push_line(out, &format!("PRIORITY:{priority}"));
    }
    push_line(out, "TRANSP:TRANSPARENT");
    push_line(out, "BEGIN:VALARM");
    push_line(out, "ACTION:DISPLAY");
    push_line(out, &format!("DESCRIPTION:{summary}"));
    push_line(out, &format!("TRIGGER:{}", format_trigger(reminder)));
    push_line(out, "END:VALARM");
    push_line(out, "END:VEVENT");
}

/// Task priority 1..=3 onto the iCalendar 1 (high) .. 9 (low) scale.
fn ical_priority(priority: u8) -> Option<u8> {
    match priority {
        1 => Some(1),
        2 => Some(5),
        3 => Some(9),
        _ => None,
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Signed minute offset as an RFC 5545 duration, e.g. `-PT15M`, `P1DT2H`.
pub fn format_trigger(minutes: i64) -> String {
    let sign = if minutes < 0 { "-" } else { "" };
    let total = minutes.unsigned_abs();
    let (days, hours, mins) = (total / 1440, (total % 1440) / 60, total % 60);
    if total == 0 {
        return "PT0M".to_string();
    }

    let mut value = format!("{sign}P");
    if days > 0 {
        value.push_str(&format!("{days}D"));
    }
    if hours > 0 || mins > 0 {
        value.push('T');
        if hours > 0 {
            value.push_str(&format!("{hours}H"));
        }
        if mins > 0 {
            value.push_str(&format!("{mins}M"));
        }
    }
    value
}

pub fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace("\r\n", "\\n")
        .replace(['\n', '\r'], "\\n")
}

/// Folds a content line: the first chunk holds 75 octets, continuations
/// 74 plus the leading space. UTF-8 sequences are never split.
pub fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }
    let mut folded = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut start = 0;
    let mut limit = MAX_LINE_OCTETS;
    while start < line.len() {
        let mut end = (start + limit).min(line.len());
        while end > start && !line.is_char_boundary(end) {
            end -= 1;
        }
        if start > 0 {
            folded.push_str("\r\n ");
        }
        folded.push_str(&line[start..end]);
        start = end;
        limit = MAX_LINE_OCTETS - 1;
    }
    folded
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(&fold_line(line));
    out.push_str("\r\n");
}
