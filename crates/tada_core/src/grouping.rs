//! Date bucketing for task views.
//!
//! # Responsibility
//! - Map a task to its `TaskGroupCategory` relative to a local calendar day.
//! - Group and order tasks for overdue/today/next-7-days/later/no-date views.
//!
//! # Invariants
//! - Completed and Trash tasks are always `nodate`.
//! - Buckets are compared by local calendar day, never by raw timestamp.

use crate::model::task::{Task, TaskGroupCategory};
use chrono::{Days, Local, NaiveDate, TimeZone};
use serde::Serialize;
use std::cmp::Ordering;

/// Days covered by the "next 7 days" window, today included.
pub const UPCOMING_WINDOW_DAYS: u64 = 7;

/// Local calendar day of an epoch-ms timestamp.
pub fn local_date_of(epoch_ms: i64) -> Option<NaiveDate> {
    Local
        .timestamp_millis_opt(epoch_ms)
        .earliest()
        .map(|dt| dt.date_naive())
}

/// Epoch ms of local midnight starting `date`.
pub fn start_of_local_day_ms(date: NaiveDate) -> i64 {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(dt) => dt.timestamp_millis(),
        // Midnight skipped by a DST jump; fall back to the UTC reading.
        None => midnight.and_utc().timestamp_millis(),
    }
}

/// Epoch ms of the last millisecond of local `date`.
pub fn end_of_local_day_ms(date: NaiveDate) -> i64 {
    match date.checked_add_days(Days::new(1)) {
        Some(next) => start_of_local_day_ms(next) - 1,
        None => i64::MAX,
    }
}

/// Today's local calendar day.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Category of a due date relative to `today`, ignoring completion state.
pub fn category_for_due_date(due_date_ms: Option<i64>, today: NaiveDate) -> TaskGroupCategory {
    let Some(due_day) = due_date_ms.and_then(local_date_of) else {
        return TaskGroupCategory::NoDate;
    };

    let days_until = (due_day - today).num_days();
    if days_until < 0 {
        TaskGroupCategory::Overdue
    } else if days_until == 0 {
        TaskGroupCategory::Today
    } else if days_until < UPCOMING_WINDOW_DAYS as i64 {
        TaskGroupCategory::Next7Days
    } else {
        TaskGroupCategory::Later
    }
}

/// Category a task is displayed under on `today`.
pub fn group_category_for(task: &Task, today: NaiveDate) -> TaskGroupCategory {
    if !task.is_active() {
        return TaskGroupCategory::NoDate;
    }
    category_for_due_date(task.due_date, today)
}

pub fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    group_category_for(task, today) == TaskGroupCategory::Overdue
}

pub fn is_due_today(task: &Task, today: NaiveDate) -> bool {
    group_category_for(task, today) == TaskGroupCategory::Today
}

/// One non-empty bucket of a grouped view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskGroup {
    pub category: TaskGroupCategory,
    pub tasks: Vec<Task>,
}

/// Groups tasks into ordered buckets, dropping empty ones.
///
/// Tasks are cloned with a freshly computed `group_category`.
pub fn group_tasks(tasks: &[Task], today: NaiveDate) -> Vec<TaskGroup> {
    let mut groups: Vec<TaskGroup> = TaskGroupCategory::ORDERED
        .iter()
        .map(|category| TaskGroup {
            category: *category,
            tasks: Vec::new(),
        })
        .collect();

    for task in tasks {
        let mut task = task.clone();
        task.group_category = group_category_for(&task, today);
        let slot = TaskGroupCategory::ORDERED
            .iter()
            .position(|category| *category == task.group_category)
            .unwrap_or(TaskGroupCategory::ORDERED.len() - 1);
        groups[slot].tasks.push(task);
    }

    for group in &mut groups {
        group.tasks.sort_by(compare_for_display);
    }
    groups.retain(|group| !group.tasks.is_empty());
    groups
}

/// Due date ascending (undated last), priority high first (unset last),
/// then manual order.
pub fn compare_for_display(a: &Task, b: &Task) -> Ordering {
    cmp_option_last(a.due_date, b.due_date)
        .then_with(|| cmp_option_last(a.priority, b.priority))
        .then_with(|| a.order.cmp(&b.order))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

fn cmp_option_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::TRASH_LIST_NAME;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn due_at_noon(date: NaiveDate) -> i64 {
        start_of_local_day_ms(date) + 12 * 60 * 60 * 1000
    }

    #[test]
    fn buckets_follow_calendar_days() {
        let today = day(2026, 3, 10);
        let cases = [
            (day(2026, 3, 9), TaskGroupCategory::Overdue),
            (day(2026, 3, 10), TaskGroupCategory::Today),
            (day(2026, 3, 11), TaskGroupCategory::Next7Days),
            (day(2026, 3, 16), TaskGroupCategory::Next7Days),
            (day(2026, 3, 17), TaskGroupCategory::Later),
        ];
        for (due, expected) in cases {
            assert_eq!(
                category_for_due_date(Some(due_at_noon(due)), today),
                expected,
                "due {due}"
            );
        }
        assert_eq!(category_for_due_date(None, today), TaskGroupCategory::NoDate);
    }

    #[test]
    fn early_morning_today_is_not_overdue() {
        let today = day(2026, 3, 10);
        let first_ms = start_of_local_day_ms(today);
        assert_eq!(
            category_for_due_date(Some(first_ms), today),
            TaskGroupCategory::Today
        );
        assert_eq!(
            category_for_due_date(Some(first_ms - 1), today),
            TaskGroupCategory::Overdue
        );
    }

    #[test]
    fn completed_and_trashed_tasks_have_no_date_bucket() {
        let today = day(2026, 3, 10);
        let mut done = Task::new("done", 0);
        done.due_date = Some(due_at_noon(day(2026, 3, 1)));
        done.complete(1);
        assert_eq!(group_category_for(&done, today), TaskGroupCategory::NoDate);

        let mut trashed = Task::new("gone", 0);
        trashed.due_date = Some(due_at_noon(day(2026, 3, 1)));
        trashed.list_name = TRASH_LIST_NAME.to_string();
        assert_eq!(group_category_for(&trashed, today), TaskGroupCategory::NoDate);
    }

    #[test]
    fn group_tasks_orders_buckets_and_sorts_within() {
        let today = day(2026, 3, 10);
        let mut later_low = Task::new("later", 0);
        later_low.due_date = Some(due_at_noon(day(2026, 4, 1)));

        let mut today_low = Task::new("today low", 0);
        today_low.due_date = Some(due_at_noon(today));
        today_low.priority = Some(3);

        let mut today_high = Task::new("today high", 0);
        today_high.due_date = Some(due_at_noon(today));
        today_high.priority = Some(1);

        let undated = Task::new("whenever", 0);

        let groups = group_tasks(
            &[later_low, undated, today_low, today_high],
            today,
        );
        let categories: Vec<_> = groups.iter().map(|g| g.category).collect();
        assert_eq!(
            categories,
            vec![
                TaskGroupCategory::Today,
                TaskGroupCategory::Later,
                TaskGroupCategory::NoDate
            ]
        );
        let today_titles: Vec<_> = groups[0].tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(today_titles, vec!["today high", "today low"]);
        assert_eq!(groups[0].tasks[0].group_category, TaskGroupCategory::Today);
    }

    #[test]
    fn local_day_bounds_are_contiguous() {
        let date = day(2026, 10, 19);
        let next = day(2026, 10, 20);
        assert_eq!(end_of_local_day_ms(date) + 1, start_of_local_day_ms(next));
        assert_eq!(local_date_of(start_of_local_day_ms(date)), Some(date));
        assert_eq!(local_date_of(end_of_local_day_ms(date)), Some(date));
    }
}
