use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::delay::{classify, format_departure, format_with_arrival, DelayStatus};
use crate::destination::{Departure, Destination, DestinationKey};
use crate::destinations::{compute_active_set, ActiveSet, CalendarRules};
use crate::i18n::Strings;
use crate::net::{FetchBatch, FetchReply, PendingQuery};
use crate::normalize::normalize;
use crate::prediction::{DisplayState, Prediction, Route};
use crate::request::{build_query, GlobalDefaults};
use crate::schedule::{is_due_any, PollScheduler, PollTarget};
use crate::storage::load_calendar_events;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThemeMode {
    Default,
    ColorBlind,
    Amber,
    Ocean,
    Monochrome,
}

impl ThemeMode {
    pub fn toggle(self) -> Self {
        match self {
            ThemeMode::Default => ThemeMode::ColorBlind,
            ThemeMode::ColorBlind => ThemeMode::Amber,
            ThemeMode::Amber => ThemeMode::Ocean,
            ThemeMode::Ocean => ThemeMode::Monochrome,
            ThemeMode::Monochrome => ThemeMode::Default,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ThemeMode::Default => "DEFAULT",
            ThemeMode::ColorBlind => "COLOR",
            ThemeMode::Amber => "AMBER",
            ThemeMode::Ocean => "OCEAN",
            ThemeMode::Monochrome => "MONO",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "color" | "colorblind" | "cb" => ThemeMode::ColorBlind,
            "amber" | "gold" => ThemeMode::Amber,
            "ocean" | "blue" => ThemeMode::Ocean,
            "mono" | "monochrome" | "bw" | "grayscale" => ThemeMode::Monochrome,
            _ => ThemeMode::Default,
        }
    }
}

/// How predictions are presented.
#[derive(Clone, Debug)]
pub struct DisplaySettings {
    pub show_summary: bool,
    pub show_updated: bool,
    pub color_code_travel_time: bool,
    pub moderate_threshold: f64,
    pub poor_threshold: f64,
    pub next_departure_format: String,
    pub travel_time_format: String,
    pub show_arrival_time: bool,
}

pub struct App {
    pub instance_id: String,
    pub origin: String,
    pub poll_interval: Duration,
    defaults: GlobalDefaults,
    static_destinations: Vec<Destination>,
    calendar_rules: CalendarRules,
    calendar_file: Option<PathBuf>,
    active: ActiveSet,
    scheduler: PollScheduler,
    next_seq: u64,
    pub state: Arc<DisplayState>,
    /// True until the first batch has been applied.
    pub loading: bool,
    /// False when no active destination is inside one of its windows.
    pub in_window: bool,
    pub suspended: bool,
    pub display: DisplaySettings,
    pub theme_mode: ThemeMode,
    pub strings: Strings,
    pub last_error: Option<String>,
    pub show_help: bool,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let calendar_file = if config.calendar_file.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(config.calendar_file.trim()))
        };
        let static_destinations = config.destinations.clone();
        Self {
            instance_id: config.instance_id.clone(),
            origin: config.origin.clone(),
            poll_interval: config.poll,
            defaults: GlobalDefaults {
                api_url: config.api_url.clone(),
                api_key: config.api_key.clone(),
                origin: config.origin.clone(),
                language: config.language.clone(),
            },
            active: ActiveSet::new(static_destinations.clone()),
            static_destinations,
            calendar_rules: CalendarRules {
                templates: config.calendar_options.clone(),
                max_derived: config.max_calendar_events as usize,
                ttl: Duration::from_secs(config.max_calendar_secs),
            },
            calendar_file,
            scheduler: PollScheduler::new(config.poll),
            next_seq: 1,
            state: Arc::new(DisplayState::default()),
            loading: true,
            in_window: true,
            suspended: false,
            display: DisplaySettings {
                show_summary: config.show_summary,
                show_updated: config.show_updated,
                color_code_travel_time: config.color_code_travel_time,
                moderate_threshold: config.moderate_threshold,
                poor_threshold: config.poor_threshold,
                next_departure_format: config.next_departure_format.clone(),
                travel_time_format: config.travel_time_format.clone(),
                show_arrival_time: config.show_arrival_time,
            },
            theme_mode: ThemeMode::from_str(&config.theme),
            strings: Strings::for_language(&config.language),
            last_error: None,
            show_help: false,
        }
    }

    /// Makes every trigger fire on the next poll.
    pub fn start(&mut self, now: DateTime<Local>) {
        self.refresh_active_set(now);
        self.scheduler.reset(now);
        if self.active.is_empty() {
            warn!("{} has no destinations to track", self.instance_id);
        }
        info!(
            "{} started with {} destinations ({} triggers)",
            self.instance_id,
            self.active.len(),
            self.scheduler.len()
        );
    }

    pub fn destinations(&self) -> Arc<[Destination]> {
        self.active.snapshot()
    }

    pub fn next_poll(&self) -> Option<DateTime<Local>> {
        self.scheduler.next_fire()
    }

    /// Recomputes the active set from the static list and the calendar feed,
    /// and drops predictions for destinations that are no longer tracked.
    pub fn refresh_active_set(&mut self, now: DateTime<Local>) {
        let events = match self.calendar_file.as_deref() {
            Some(path) => load_calendar_events(path).unwrap_or_else(|err| {
                warn!("calendar feed ignored: {err:#}");
                Vec::new()
            }),
            None => Vec::new(),
        };
        let active = compute_active_set(
            &self.static_destinations,
            &events,
            &self.calendar_rules,
            now.timestamp(),
        );
        debug!(
            "active set: {} destinations ({} static, {} events)",
            active.len(),
            self.static_destinations.len(),
            events.len()
        );
        self.active.replace(active);
        let snapshot = self.active.snapshot();
        self.scheduler.sync(&snapshot, now);
        let orphaned = self
            .state
            .predictions
            .iter()
            .any(|p| !snapshot.iter().any(|d| d.key() == p.key()));
        if orphaned {
            self.state = self.state.retained(&snapshot);
        }
    }

    /// Runs one poll cycle and returns the batch to fetch, if any query is due.
    pub fn poll(&mut self, now: DateTime<Local>) -> Option<FetchBatch> {
        if self.suspended {
            return None;
        }
        let fired = self.scheduler.due(now);
        if fired.is_empty() {
            return None;
        }
        self.refresh_active_set(now);

        let snapshot = self.active.snapshot();
        let wall_clock = now.naive_local();
        self.in_window = snapshot.iter().any(|d| is_due_any(&d.windows, wall_clock));

        let mut seen: HashSet<DestinationKey> = HashSet::new();
        let mut queries = Vec::new();
        for dest in snapshot.iter() {
            let selected = fired.iter().any(|target| match target {
                PollTarget::Unscheduled => dest.schedule.is_none(),
                PollTarget::Destination(key) => &dest.key() == key,
            });
            if !selected || !is_due_any(&dest.windows, wall_clock) {
                continue;
            }
            if !seen.insert(dest.key()) {
                continue;
            }
            queries.push(PendingQuery {
                destination: dest.clone(),
                query: build_query(dest, &self.defaults),
            });
        }

        if queries.is_empty() {
            debug!("poll at {}: nothing due", now.format("%H:%M:%S"));
            self.loading = false;
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        debug!("poll batch {seq}: {} queries", queries.len());
        Some(FetchBatch {
            instance_id: self.instance_id.clone(),
            seq,
            queries,
        })
    }

    pub fn apply_reply(&mut self, reply: FetchReply, now: DateTime<Local>) {
        if reply.instance_id != self.instance_id {
            debug!("ignoring reply for instance {}", reply.instance_id);
            return;
        }
        let predictions: Vec<Prediction> = reply
            .results
            .into_iter()
            .map(|(destination, raw)| normalize(&raw, destination, reply.seq))
            .collect();
        for prediction in &predictions {
            let status = prediction
                .routes()
                .first()
                .map(|route| self.delay_status(route).label())
                .unwrap_or("error");
            debug!(
                "batch {}: {} ({}, {}) {status}",
                reply.seq,
                prediction.destination.label,
                prediction.destination.mode,
                prediction.icon().name()
            );
        }
        let failed = predictions.iter().filter(|p| p.is_error()).count();
        if failed > 0 {
            warn!("batch {}: {failed} of {} destinations failed", reply.seq, predictions.len());
        }
        self.state = self.state.merged(predictions, now);
        self.loading = false;
        self.last_error = None;
    }

    pub fn apply_error(&mut self, err: String) {
        warn!("fetch error: {err}");
        self.last_error = Some(err);
    }

    pub fn toggle_suspend(&mut self, now: DateTime<Local>) {
        if self.suspended {
            self.resume(now);
        } else {
            self.suspend();
        }
    }

    pub fn suspend(&mut self) {
        info!("{} suspended", self.instance_id);
        self.suspended = true;
    }

    /// Resuming polls immediately.
    pub fn resume(&mut self, now: DateTime<Local>) {
        info!("{} resumed", self.instance_id);
        self.suspended = false;
        self.scheduler.reset(now);
    }

    pub fn refresh_now(&mut self, now: DateTime<Local>) {
        if !self.suspended {
            self.scheduler.reset(now);
        }
    }

    pub fn toggle_theme(&mut self) {
        self.theme_mode = self.theme_mode.toggle();
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn delay_status(&self, route: &Route) -> DelayStatus {
        classify(
            route.duration_secs,
            route.traffic_secs,
            self.display.moderate_threshold,
            self.display.poor_threshold,
        )
    }

    /// Travel time text; the arrival clock is only meaningful when leaving now.
    pub fn travel_time_text(&self, prediction: &Prediction, route: &Route, now: DateTime<Local>) -> String {
        let show_arrival = self.display.show_arrival_time
            && prediction.destination.departure == Departure::Now;
        format_with_arrival(
            route.display_secs(),
            &self.display.travel_time_format,
            show_arrival,
            now,
        )
    }

    pub fn next_departure_text(&self, route: &Route) -> Option<String> {
        route
            .transit
            .first()
            .and_then(|leg| leg.departure)
            .map(|at| format_departure(at, &self.display.next_departure_format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::{TimeWindow, TravelMode};
    use crate::normalize::RawResponse;
    use chrono::TimeZone;
    use serde_json::json;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn monday_morning() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).single().unwrap()
    }

    fn destination(label: &str, address: &str) -> Destination {
        Destination {
            label: label.to_string(),
            address: address.to_string(),
            ..Destination::default()
        }
    }

    fn config_with(destinations: Vec<Destination>) -> Config {
        Config {
            api_key: "k".to_string(),
            origin: "Home".to_string(),
            destinations,
            ..Config::default()
        }
    }

    fn reply_for(app: &App, batch: &FetchBatch, body: serde_json::Value) -> FetchReply {
        FetchReply {
            instance_id: app.instance_id.clone(),
            seq: batch.seq,
            results: batch
                .queries
                .iter()
                .map(|q| (q.destination.clone(), RawResponse::Body(body.to_string())))
                .collect(),
        }
    }

    #[test]
    fn start_then_poll_builds_one_query_per_destination() {
        let mut app = App::new(&config_with(vec![
            destination("Work", "1 Main St"),
            destination("Gym", "2 Side St"),
        ]));
        let now = monday_morning();
        assert!(app.poll(now).is_none());

        app.start(now);
        let batch = app.poll(now).unwrap();
        assert_eq!(batch.seq, 1);
        assert_eq!(batch.queries.len(), 2);
        assert_eq!(batch.queries[0].query.param("mode"), Some("driving"));
        assert_eq!(batch.queries[0].query.param("origin"), Some("Home"));
        assert!(app.poll(now).is_none());

        let later = now + chrono::Duration::seconds(601);
        assert_eq!(app.poll(later).unwrap().seq, 2);
    }

    #[test]
    fn heavy_traffic_is_poor_and_rounded() {
        let mut config = config_with(vec![destination("Work", "1 Main St")]);
        config.show_arrival_time = false;
        let mut app = App::new(&config);
        let now = monday_morning();
        app.start(now);
        let batch = app.poll(now).unwrap();
        let reply = reply_for(
            &app,
            &batch,
            json!({"status": "OK", "routes": [{"summary": "Gardiner", "legs": [
                {"duration": {"value": 600}, "duration_in_traffic": {"value": 780}}
            ]}]}),
        );
        app.apply_reply(reply, now);

        assert!(!app.loading);
        assert_eq!(app.state.last_updated, Some(now));
        let prediction = &app.state.predictions[0];
        let route = &prediction.routes()[0];
        assert_eq!(app.delay_status(route), DelayStatus::Poor);
        assert_eq!(app.travel_time_text(prediction, route, now), "13 min");
    }

    #[test]
    fn replies_for_other_instances_are_ignored() {
        let mut app = App::new(&config_with(vec![destination("Work", "1 Main St")]));
        let now = monday_morning();
        app.start(now);
        let batch = app.poll(now).unwrap();
        let mut reply = reply_for(&app, &batch, json!({"status": "OK", "routes": []}));
        reply.instance_id = "someone-else".to_string();
        app.apply_reply(reply, now);
        assert!(app.loading);
        assert!(app.state.predictions.is_empty());
    }

    #[test]
    fn older_batch_does_not_overwrite_newer_result() {
        let mut app = App::new(&config_with(vec![destination("Work", "1 Main St")]));
        let now = monday_morning();
        app.start(now);
        let first = app.poll(now).unwrap();
        app.refresh_now(now);
        let second = app.poll(now).unwrap();

        let fast = json!({"status": "OK", "routes": [{"legs": [{"duration": {"value": 300}}]}]});
        let slow = json!({"status": "OK", "routes": [{"legs": [{"duration": {"value": 900}}]}]});
        app.apply_reply(reply_for(&app, &second, fast), now);
        app.apply_reply(reply_for(&app, &first, slow), now);
        assert_eq!(app.state.predictions.len(), 1);
        assert_eq!(app.state.predictions[0].routes()[0].duration_secs, 300);
    }

    #[test]
    fn destinations_outside_their_windows_are_skipped() {
        let mut hidden = destination("Weekend", "Cottage");
        hidden.windows = vec![TimeWindow::parse(None, None, &[1, 2, 3, 4, 5]).unwrap()];
        let mut app = App::new(&config_with(vec![hidden]));
        let now = monday_morning();
        app.start(now);
        assert!(app.poll(now).is_none());
        assert!(!app.in_window);
        assert!(!app.loading);
    }

    #[test]
    fn suspended_instance_does_not_poll_until_resumed() {
        let mut app = App::new(&config_with(vec![destination("Work", "1 Main St")]));
        let now = monday_morning();
        app.start(now);
        app.toggle_suspend(now);
        assert!(app.poll(now).is_none());
        app.toggle_suspend(now);
        assert!(app.poll(now).is_some());
    }

    #[test]
    fn scheduled_destination_only_polls_on_its_schedule() {
        let mut scheduled = destination("Office", "1 Main St");
        scheduled.schedule = Some("30 8 * * *".to_string());
        let mut config = config_with(vec![scheduled, destination("Gym", "2 Side St")]);
        config.poll = Duration::from_secs(15 * 60);
        let mut app = App::new(&config);
        let now = monday_morning();
        app.start(now);
        assert_eq!(app.poll(now).unwrap().queries.len(), 2);

        let batch = app.poll(now + chrono::Duration::minutes(16)).unwrap();
        assert_eq!(batch.queries.len(), 1);
        assert_eq!(batch.queries[0].destination.label, "Gym");

        let batch = app.poll(now + chrono::Duration::minutes(30)).unwrap();
        assert_eq!(batch.queries.len(), 1);
        assert_eq!(batch.queries[0].destination.label, "Office");
    }

    #[test]
    fn calendar_events_become_destinations() {
        let now = monday_morning();
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = std::env::temp_dir().join(format!("commute-board-app-calendar-{suffix}.json"));
        let events = json!([
            {"title": "Dentist", "location": "5 Elm St", "start": now.timestamp() + 3600},
            {"title": "Office again", "location": "1 main st", "start": now.timestamp() + 7200}
        ]);
        fs::write(&path, events.to_string()).unwrap();

        let mut config = config_with(vec![destination("Work", "1 Main St")]);
        config.calendar_file = path.to_string_lossy().to_string();
        config.max_calendar_events = 5;
        config.calendar_options = vec![Destination {
            mode: TravelMode::Transit,
            ..Destination::default()
        }];
        let mut app = App::new(&config);
        app.start(now);
        let labels: Vec<String> = app.destinations().iter().map(|d| d.label.clone()).collect();
        assert_eq!(labels, vec!["Work", "Dentist"]);

        let batch = app.poll(now).unwrap();
        let dentist = &batch.queries[1].query;
        assert_eq!(dentist.param("mode"), Some("transit"));
        assert_eq!(dentist.param("arrival_time"), Some((now.timestamp() + 3600).to_string().as_str()));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn arrival_clock_only_for_leave_now() {
        let now = monday_morning();
        let app = App::new(&config_with(Vec::new()));
        let route = Route {
            summary: String::new(),
            duration_secs: 780,
            traffic_secs: None,
            transit: Vec::new(),
        };
        let leave_now = Prediction::error(destination("A", "a"), 1, "x");
        assert_eq!(app.travel_time_text(&leave_now, &route, now), "13 min - 08:13");
        let mut fixed = leave_now.clone();
        fixed.destination.departure = Departure::ArriveBy(now.timestamp() + 3600);
        assert_eq!(app.travel_time_text(&fixed, &route, now), "13 min");
    }

    #[test]
    fn theme_cycles_back() {
        let mut mode = ThemeMode::from_str("amber");
        for _ in 0..5 {
            mode = mode.toggle();
        }
        assert_eq!(mode, ThemeMode::Amber);
        assert_eq!(ThemeMode::from_str("nope"), ThemeMode::Default);
    }
}
