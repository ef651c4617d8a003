use chrono::{DateTime, Local};
use std::fmt::Write as _;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DelayStatus {
    Good,
    Moderate,
    Poor,
}

impl DelayStatus {
    pub fn label(self) -> &'static str {
        match self {
            DelayStatus::Good => "good",
            DelayStatus::Moderate => "moderate",
            DelayStatus::Poor => "poor",
        }
    }
}

/// Buckets `in_traffic / baseline`. A ratio sitting exactly on a threshold
/// lands in the worse bucket, so 780 s over 600 s at 1.3 is poor rather than
/// the moderate a strict comparison would give. Thresholds are ratios and are
/// not checked against each other.
pub fn classify(baseline: u64, in_traffic: Option<u64>, moderate: f64, poor: f64) -> DelayStatus {
    let Some(traffic) = in_traffic else {
        return DelayStatus::Good;
    };
    if baseline == 0 {
        return DelayStatus::Good;
    }
    let variance = traffic as f64 / baseline as f64;
    if variance >= poor {
        DelayStatus::Poor
    } else if variance >= moderate {
        DelayStatus::Moderate
    } else {
        DelayStatus::Good
    }
}

/// Renders a duration through a template with `{h}` and `{m}` placeholders.
///
/// Without `{h}` the minutes are the whole duration; with it they are the
/// remainder. Minutes are rounded to the nearest whole minute.
pub fn format_travel_time(secs: u64, template: &str) -> String {
    let total_minutes = secs.saturating_add(30) / 60;
    let (hours, minutes) = if template.contains("{h}") {
        (total_minutes / 60, total_minutes % 60)
    } else {
        (0, total_minutes)
    };
    template
        .replace("{h}", &hours.to_string())
        .replace("{m}", &minutes.to_string())
}

/// Travel time, optionally followed by the clock time of arrival when leaving now.
pub fn format_with_arrival(
    secs: u64,
    template: &str,
    show_arrival: bool,
    now: DateTime<Local>,
) -> String {
    let mut text = format_travel_time(secs, template);
    if show_arrival {
        if let Some(arrival) = arrival_after(now, secs) {
            let _ = write!(text, " - {}", arrival.format("%H:%M"));
        }
    }
    text
}

/// `None` when the duration does not fit a calendar date.
fn arrival_after(now: DateTime<Local>, secs: u64) -> Option<DateTime<Local>> {
    let delta = chrono::Duration::try_seconds(i64::try_from(secs).ok()?)?;
    now.checked_add_signed(delta)
}

pub fn format_departure(at: DateTime<Local>, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", at.format(format)).is_err() {
        // chrono reports invalid format strings through fmt::Error
        return at.format("%H:%M").to_string();
    }
    out
}
