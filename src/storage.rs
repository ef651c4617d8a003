use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::model::de_epoch_secs_from_any;

/// One entry of the calendar feed.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CalendarEvent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    /// Epoch seconds.
    #[serde(alias = "startDate", deserialize_with = "de_epoch_secs_from_any")]
    pub start: i64,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CalendarFile {
    List(Vec<CalendarEvent>),
    Wrapped { events: Vec<CalendarEvent> },
}

/// Reads the calendar feed. A missing file is an empty feed.
pub fn load_calendar_events(path: &Path) -> Result<Vec<CalendarEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read calendar feed: {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file: CalendarFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse calendar feed: {}", path.display()))?;
    let mut events = match file {
        CalendarFile::List(events) => events,
        CalendarFile::Wrapped { events } => events,
    };
    events.sort_by_key(|e| e.start);
    Ok(events)
}
