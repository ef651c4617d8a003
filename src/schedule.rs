use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Local, NaiveDateTime, Timelike};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::destination::{Destination, DestinationKey, TimeWindow};

/// True when `now` (local wall clock) is inside the window and not on an excluded weekday.
///
/// Comparison is at minute resolution, so an end of 23:59 covers the whole last minute.
pub fn is_due(window: &TimeWindow, now: NaiveDateTime) -> bool {
    let weekday = now.weekday().num_days_from_sunday();
    if window.hide_days.contains(&weekday) {
        return false;
    }
    let minute = now.time().hour() * 60 + now.time().minute();
    let start = window.start.hour() * 60 + window.start.minute();
    let end = window.end.hour() * 60 + window.end.minute();
    minute >= start && minute <= end
}

/// Any-of over the windows; no windows means always due.
pub fn is_due_any(windows: &[TimeWindow], now: NaiveDateTime) -> bool {
    windows.is_empty() || windows.iter().any(|w| is_due(w, now))
}

/// Source of poll instants.
pub trait Trigger {
    fn next_after(&self, after: DateTime<Local>) -> Option<DateTime<Local>>;
    fn describe(&self) -> String;
}

pub struct IntervalTrigger {
    every: Duration,
}

impl IntervalTrigger {
    pub fn new(every: Duration) -> Self {
        Self {
            every: every.max(Duration::from_secs(1)),
        }
    }
}

impl Trigger for IntervalTrigger {
    fn next_after(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        let step = chrono::Duration::from_std(self.every).ok()?;
        after.checked_add_signed(step)
    }

    fn describe(&self) -> String {
        format!("every {}s", self.every.as_secs())
    }
}

pub struct CronTrigger {
    expression: String,
    schedule: cron::Schedule,
}

impl CronTrigger {
    /// Accepts classic five-field expressions as well as the six/seven-field
    /// form with seconds (and year).
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let normalized = if trimmed.split_whitespace().count() == 5 {
            format!("0 {trimmed}")
        } else {
            trimmed.to_string()
        };
        let schedule = cron::Schedule::from_str(&normalized)
            .map_err(|err| anyhow!("invalid schedule {trimmed:?}: {err}"))?;
        Ok(Self {
            expression: trimmed.to_string(),
            schedule,
        })
    }
}

impl Trigger for CronTrigger {
    fn next_after(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        self.schedule.after(&after).next()
    }

    fn describe(&self) -> String {
        format!("cron {}", self.expression)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollTarget {
    /// Every active destination that has no schedule of its own.
    Unscheduled,
    Destination(DestinationKey),
}

struct Entry {
    target: PollTarget,
    trigger: Box<dyn Trigger>,
    next: Option<DateTime<Local>>,
}

pub struct PollScheduler {
    entries: Vec<Entry>,
}

impl PollScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            entries: vec![Entry {
                target: PollTarget::Unscheduled,
                trigger: Box::new(IntervalTrigger::new(interval)),
                next: None,
            }],
        }
    }

    /// Keeps one cron trigger per scheduled destination, dropping triggers for
    /// destinations that left the active set.
    pub fn sync(&mut self, destinations: &[Destination], now: DateTime<Local>) {
        self.entries.retain(|entry| match &entry.target {
            PollTarget::Unscheduled => true,
            PollTarget::Destination(key) => destinations
                .iter()
                .any(|d| d.schedule.is_some() && &d.key() == key),
        });

        for dest in destinations {
            let Some(expression) = dest.schedule.as_deref() else {
                continue;
            };
            let key = dest.key();
            let known = self
                .entries
                .iter()
                .any(|e| e.target == PollTarget::Destination(key.clone()));
            if known {
                continue;
            }
            match CronTrigger::parse(expression) {
                Ok(trigger) => {
                    let next = trigger.next_after(now);
                    debug!("schedule {} for {}", trigger.describe(), key.label);
                    self.entries.push(Entry {
                        target: PollTarget::Destination(key),
                        trigger: Box::new(trigger),
                        next,
                    });
                }
                Err(err) => warn!("skipping schedule for {}: {err}", key.label),
            }
        }
    }

    /// Marks every trigger as due right now.
    pub fn reset(&mut self, now: DateTime<Local>) {
        for entry in &mut self.entries {
            entry.next = Some(now);
        }
    }

    /// Returns the targets whose trigger fired and advances those triggers.
    pub fn due(&mut self, now: DateTime<Local>) -> Vec<PollTarget> {
        let mut fired = Vec::new();
        for entry in &mut self.entries {
            if entry.next.is_some_and(|next| next <= now) {
                fired.push(entry.target.clone());
                entry.next = entry.trigger.next_after(now);
            }
        }
        fired
    }

    pub fn next_fire(&self) -> Option<DateTime<Local>> {
        self.entries.iter().filter_map(|e| e.next).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 30)
            .unwrap()
    }

    fn window(start: &str, end: &str, hide: &[u32]) -> TimeWindow {
        TimeWindow::parse(Some(start), Some(end), hide).unwrap()
    }

    #[test]
    fn window_bounds_are_inclusive() {
        // 2026-10-19 is a Monday.
        let w = window("06:00", "09:00", &[]);
        assert!(is_due(&w, at(2026, 10, 19, 6, 0)));
        assert!(is_due(&w, at(2026, 10, 19, 9, 0)));
        assert!(!is_due(&w, at(2026, 10, 19, 5, 59)));
        assert!(!is_due(&w, at(2026, 10, 19, 9, 1)));
    }

    #[test]
    fn excluded_weekday_is_never_due() {
        let sunday = at(2026, 10, 18, 12, 0);
        for (start, end) in [("00:00", "23:59"), ("11:00", "13:00"), ("12:00", "12:00")] {
            assert!(!is_due(&window(start, end, &[0]), sunday));
            assert!(is_due(&window(start, end, &[1, 2]), sunday));
        }
    }

    #[test]
    fn full_day_default_covers_last_minute() {
        assert!(is_due(&TimeWindow::full_day(), at(2026, 10, 20, 23, 59)));
        assert!(is_due(&TimeWindow::full_day(), at(2026, 10, 20, 0, 0)));
    }

    #[test]
    fn windows_are_any_of() {
        let now = at(2026, 10, 19, 17, 30);
        assert!(is_due_any(&[], now));
        let morning = window("06:00", "09:00", &[]);
        let evening = window("16:00", "18:00", &[]);
        assert!(!is_due_any(&[morning.clone()], now));
        assert!(is_due_any(&[morning, evening], now));
    }

    #[test]
    fn interval_trigger_steps_forward() {
        let trigger = IntervalTrigger::new(Duration::from_secs(600));
        let now = Local::now();
        let next = trigger.next_after(now).unwrap();
        assert_eq!((next - now).num_seconds(), 600);
        assert_eq!(trigger.describe(), "every 600s");
    }

    #[test]
    fn cron_trigger_accepts_five_fields() {
        let trigger = CronTrigger::parse("*/15 * * * *").unwrap();
        let start = Local.with_ymd_and_hms(2026, 10, 19, 7, 3, 0).single().unwrap();
        let next = trigger.next_after(start).unwrap();
        assert_eq!(next.time(), NaiveTime::from_hms_opt(7, 15, 0).unwrap());
        assert!(CronTrigger::parse("not a schedule").is_err());
    }

    #[test]
    fn scheduler_fires_and_advances() {
        let mut scheduler = PollScheduler::new(Duration::from_secs(60));
        let now = Local::now();
        assert!(scheduler.due(now).is_empty());

        scheduler.reset(now);
        assert_eq!(scheduler.due(now), vec![PollTarget::Unscheduled]);
        assert!(scheduler.due(now).is_empty());
        let later = now + chrono::Duration::seconds(61);
        assert_eq!(scheduler.due(later), vec![PollTarget::Unscheduled]);
    }

    #[test]
    fn scheduler_tracks_destination_schedules() {
        let mut scheduler = PollScheduler::new(Duration::from_secs(60));
        let scheduled = Destination {
            label: "Office".to_string(),
            address: "1 Main St".to_string(),
            schedule: Some("0 7 * * Mon-Fri".to_string()),
            ..Destination::default()
        };
        let broken = Destination {
            label: "Gym".to_string(),
            schedule: Some("whenever".to_string()),
            ..Destination::default()
        };
        let now = Local::now();
        scheduler.sync(&[scheduled.clone(), broken], now);
        assert_eq!(scheduler.len(), 2);

        scheduler.reset(now);
        let fired = scheduler.due(now);
        assert!(fired.contains(&PollTarget::Destination(scheduled.key())));

        scheduler.sync(&[], now);
        assert_eq!(scheduler.len(), 1);
    }
}
