//! Background trigger for scheduled echo reports.
//!
//! # Responsibility
//! - Decide whether a schedule fires at a given local minute.
//! - Run a polling thread that sends `ScheduleTrigger` messages.
//!
//! # Invariants
//! - A schedule fires at most once per local date and minute.
//! - The thread exits when stopped or when the receiving side is gone.
//! - Whether a report already exists for the day is checked by the consumer
//!   (`EchoService::generate_if_absent`), not here.

use crate::model::settings::ScheduleSettings;
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

static SCHEDULE_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid schedule time regex"));

/// Parses `HH:mm` into `(hour, minute)`.
pub fn parse_schedule_time(value: &str) -> Option<(u32, u32)> {
    let captures = SCHEDULE_TIME_RE.captures(value.trim())?;
    let hour: u32 = captures[1].parse().ok()?;
    let minute: u32 = captures[2].parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

impl ScheduleSettings {
    /// Enabled, weekday listed (0 = Sunday) and hour/minute equal to `time`.
    pub fn should_trigger(&self, now: NaiveDateTime) -> bool {
        if !self.enabled {
            return false;
        }
        let weekday = now.weekday().num_days_from_sunday() as u8;
        if !self.days.contains(&weekday) {
            return false;
        }
        match parse_schedule_time(&self.time) {
            Some((hour, minute)) => now.hour() == hour && now.minute() == minute,
            None => false,
        }
    }
}

/// Message sent when a schedule fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleTrigger {
    /// Epoch ms.
    pub timestamp: i64,
    /// `YYYY-MM-DD`, local.
    pub date: String,
    /// `H:mm`, local.
    pub time: String,
}

impl ScheduleTrigger {
    pub fn local_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }
}

/// Last fired `(date, hour, minute)`, used to suppress repeats.
type FiredMinute = (NaiveDate, u32, u32);

/// One scheduler step at local time `now`.
pub fn evaluate(
    settings: &ScheduleSettings,
    now: NaiveDateTime,
    timestamp_ms: i64,
    last_fired: &mut Option<FiredMinute>,
) -> Option<ScheduleTrigger> {
    if !settings.should_trigger(now) {
        return None;
    }
    let minute_key = (now.date(), now.hour(), now.minute());
    if *last_fired == Some(minute_key) {
        return None;
    }
    *last_fired = Some(minute_key);
    Some(ScheduleTrigger {
        timestamp: timestamp_ms,
        date: now.format("%Y-%m-%d").to_string(),
        time: format!("{}:{:02}", now.hour(), now.minute()),
    })
}

/// Handle to the polling thread. Dropping it stops the thread.
pub struct Scheduler {
    settings: Arc<Mutex<ScheduleSettings>>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn spawn(
        settings: ScheduleSettings,
        triggers: Sender<ScheduleTrigger>,
    ) -> std::io::Result<Self> {
        Self::spawn_with_interval(settings, triggers, POLL_INTERVAL)
    }

    pub fn spawn_with_interval(
        settings: ScheduleSettings,
        triggers: Sender<ScheduleTrigger>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let settings = Arc::new(Mutex::new(settings));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let shared = Arc::clone(&settings);

        let handle = std::thread::Builder::new()
            .name("tada-scheduler".to_string())
            .spawn(move || {
                info!("event=scheduler_start module=scheduler status=ok");
                let mut last_fired = None;
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let now = Local::now();
                    let snapshot = lock_settings(&shared).clone();
                    let Some(trigger) = evaluate(
                        &snapshot,
                        now.naive_local(),
                        now.timestamp_millis(),
                        &mut last_fired,
                    ) else {
                        continue;
                    };

                    info!(
                        "event=schedule_trigger module=scheduler status=ok date={} time={}",
                        trigger.date, trigger.time
                    );
                    if triggers.send(trigger).is_err() {
                        error!("event=schedule_trigger module=scheduler status=error reason=receiver_dropped");
                        break;
                    }
                }
                info!("event=scheduler_stop module=scheduler status=ok");
            })?;

        Ok(Self {
            settings,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Replaces the settings used from the next poll on.
    pub fn update_settings(&self, settings: ScheduleSettings) {
        info!(
            "event=scheduler_update module=scheduler status=ok enabled={} time={} days={:?}",
            settings.enabled, settings.time, settings.days
        );
        *lock_settings(&self.settings) = settings;
    }

    pub fn settings(&self) -> ScheduleSettings {
        lock_settings(&self.settings).clone()
    }

    /// Stops the thread and waits for it to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock_settings(settings: &Mutex<ScheduleSettings>) -> MutexGuard<'_, ScheduleSettings> {
    settings
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hour, minute, 30)
            .unwrap()
    }

    #[test]
    fn parse_schedule_time_accepts_valid_clock_values() {
        assert_eq!(parse_schedule_time("18:00"), Some((18, 0)));
        assert_eq!(parse_schedule_time("7:05"), Some((7, 5)));
        assert_eq!(parse_schedule_time("24:00"), None);
        assert_eq!(parse_schedule_time("12:60"), None);
        assert_eq!(parse_schedule_time("noon"), None);
    }

    #[test]
    fn should_trigger_checks_enabled_weekday_and_minute() {
        let mut settings = ScheduleSettings::default();
        // 2026-10-19 is a Monday.
        let monday_six = at(2026, 10, 19, 18, 0);
        assert!(!settings.should_trigger(monday_six));

        settings.enabled = true;
        assert!(settings.should_trigger(monday_six));
        assert!(!settings.should_trigger(at(2026, 10, 19, 18, 1)));
        // Sunday is not in the default Mon-Fri set.
        assert!(!settings.should_trigger(at(2026, 10, 18, 18, 0)));
    }

    #[test]
    fn evaluate_fires_once_per_minute() {
        let settings = ScheduleSettings {
            enabled: true,
            ..ScheduleSettings::default()
        };
        let mut last = None;
        let now = at(2026, 10, 19, 18, 0);
        let trigger = evaluate(&settings, now, 42, &mut last).unwrap();
        assert_eq!(trigger.date, "2026-10-19");
        assert_eq!(trigger.time, "18:00");
        assert_eq!(trigger.local_date(), NaiveDate::from_ymd_opt(2026, 10, 19));
        assert!(evaluate(&settings, now, 43, &mut last).is_none());
    }

    #[test]
    fn scheduler_stops_promptly() {
        let (tx, _rx) = mpsc::channel();
        let scheduler = Scheduler::spawn(ScheduleSettings::default(), tx).unwrap();
        scheduler.update_settings(ScheduleSettings {
            enabled: true,
            ..ScheduleSettings::default()
        });
        assert!(scheduler.settings().enabled);
        scheduler.stop();
    }
}
