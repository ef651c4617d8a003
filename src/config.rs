use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::destination::{split_waypoints, Departure, Destination, TimeWindow, TravelMode};
use crate::request::DEFAULT_API_URL;
use crate::schedule::CronTrigger;

pub const DEFAULT_CONFIG_FILE: &str = "commute-board.toml";
pub const DEFAULT_ORIGIN: &str = "65 Front St W, Toronto, ON M5J 1E6";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_SHOW_SUMMARY: bool = true;
pub const DEFAULT_SHOW_UPDATED: bool = true;
pub const DEFAULT_COLOR_CODE: bool = true;
pub const DEFAULT_MODERATE_THRESHOLD: f64 = 1.1;
pub const DEFAULT_POOR_THRESHOLD: f64 = 1.3;
pub const DEFAULT_NEXT_DEPARTURE_FORMAT: &str = "next at %-I:%M %p";
pub const DEFAULT_TRAVEL_TIME_FORMAT: &str = "{m} min";
pub const DEFAULT_SHOW_ARRIVAL_TIME: bool = true;
pub const DEFAULT_POLL_SECS: u64 = 600;
pub const DEFAULT_MAX_CALENDAR_EVENTS: u64 = 0;
pub const DEFAULT_MAX_CALENDAR_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_INSTANCE_ID: &str = "commute-board";
pub const DEFAULT_THEME: &str = "default";
pub const DEFAULT_LOG_FILE: &str = "commute-board.log";

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub api_key: String,
    pub api_url: String,
    pub origin: String,
    pub language: String,
    pub show_summary: bool,
    pub show_updated: bool,
    pub color_code_travel_time: bool,
    pub moderate_threshold: f64,
    pub poor_threshold: f64,
    pub next_departure_format: String,
    pub travel_time_format: String,
    pub show_arrival_time: bool,
    pub poll: Duration,
    pub max_calendar_events: u64,
    pub max_calendar_secs: u64,
    pub calendar_file: String,
    pub calendar_options: Vec<Destination>,
    pub destinations: Vec<Destination>,
    pub request_timeout_secs: u64,
    pub insecure: bool,
    pub instance_id: String,
    pub theme: String,
    pub log_enabled: bool,
    pub log_level: String,
    pub log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
            api_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            show_summary: DEFAULT_SHOW_SUMMARY,
            show_updated: DEFAULT_SHOW_UPDATED,
            color_code_travel_time: DEFAULT_COLOR_CODE,
            moderate_threshold: DEFAULT_MODERATE_THRESHOLD,
            poor_threshold: DEFAULT_POOR_THRESHOLD,
            next_departure_format: DEFAULT_NEXT_DEPARTURE_FORMAT.to_string(),
            travel_time_format: DEFAULT_TRAVEL_TIME_FORMAT.to_string(),
            show_arrival_time: DEFAULT_SHOW_ARRIVAL_TIME,
            poll: Duration::from_secs(DEFAULT_POLL_SECS),
            max_calendar_events: DEFAULT_MAX_CALENDAR_EVENTS,
            max_calendar_secs: DEFAULT_MAX_CALENDAR_SECS,
            calendar_file: String::new(),
            calendar_options: vec![Destination::default()],
            destinations: Vec::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            insecure: false,
            instance_id: DEFAULT_INSTANCE_ID.to_string(),
            theme: DEFAULT_THEME.to_string(),
            log_enabled: false,
            log_level: "info".to_string(),
            log_file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    api_key: Option<String>,
    api_url: Option<String>,
    origin: Option<String>,
    #[serde(alias = "lang")]
    language: Option<String>,
    show_summary: Option<bool>,
    show_updated: Option<bool>,
    color_code_travel_time: Option<bool>,
    moderate_time_threshold: Option<f64>,
    poor_time_threshold: Option<f64>,
    next_departure_format: Option<String>,
    travel_time_format: Option<String>,
    show_arrival_time: Option<bool>,
    poll_secs: Option<u64>,
    max_calendar_events: Option<u64>,
    max_calendar_secs: Option<u64>,
    calendar_file: Option<String>,
    calendar_options: Option<Vec<DestinationConfig>>,
    destinations: Option<Vec<DestinationConfig>>,
    request_timeout_secs: Option<u64>,
    insecure: Option<bool>,
    instance_id: Option<String>,
    theme: Option<String>,
    log_enabled: Option<bool>,
    log_level: Option<String>,
    log_file: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct WindowConfig {
    start: Option<String>,
    end: Option<String>,
    #[serde(default)]
    hide_days: Vec<u32>,
}

/// A `[[destinations]]` or `[[calendar_options]]` table.
#[derive(Debug, Default, Clone, Deserialize)]
struct DestinationConfig {
    label: Option<String>,
    destination: Option<String>,
    origin: Option<String>,
    mode: Option<String>,
    transit_mode: Option<String>,
    avoid: Option<String>,
    waypoints: Option<String>,
    alternatives: Option<bool>,
    arrival_time: Option<i64>,
    color: Option<String>,
    #[serde(alias = "show_next_vehicle_departure")]
    show_next_departure: Option<bool>,
    start_time: Option<String>,
    end_time: Option<String>,
    hide_days: Option<Vec<u32>>,
    windows: Option<Vec<WindowConfig>>,
    schedule: Option<String>,
}

impl DestinationConfig {
    fn into_destination(self, require_address: bool) -> Result<Destination> {
        let address = self.destination.unwrap_or_default().trim().to_string();
        if require_address && address.is_empty() {
            return Err(anyhow!(
                "destination {:?} has no address",
                self.label.as_deref().unwrap_or("")
            ));
        }
        let label = self
            .label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| address.clone());

        let mut windows = Vec::new();
        if self.start_time.is_some() || self.end_time.is_some() || self.hide_days.is_some() {
            windows.push(
                TimeWindow::parse(
                    self.start_time.as_deref(),
                    self.end_time.as_deref(),
                    self.hide_days.as_deref().unwrap_or_default(),
                )
                .with_context(|| format!("invalid window for destination {label:?}"))?,
            );
        }
        for window in self.windows.unwrap_or_default() {
            windows.push(
                TimeWindow::parse(window.start.as_deref(), window.end.as_deref(), &window.hide_days)
                    .with_context(|| format!("invalid window for destination {label:?}"))?,
            );
        }

        let schedule = self.schedule.filter(|s| !s.trim().is_empty());
        if let Some(expression) = schedule.as_deref() {
            CronTrigger::parse(expression)
                .with_context(|| format!("invalid schedule for destination {label:?}"))?;
        }

        Ok(Destination {
            label,
            address,
            origin: self.origin.filter(|o| !o.trim().is_empty()),
            mode: TravelMode::parse_or_default(self.mode.as_deref()),
            transit_mode: self.transit_mode,
            avoid: self.avoid,
            waypoints: self.waypoints.as_deref().map(split_waypoints).unwrap_or_default(),
            alternatives: self.alternatives.unwrap_or(false),
            departure: match self.arrival_time {
                Some(epoch) if epoch > 0 => Departure::ArriveBy(epoch),
                _ => Departure::Now,
            },
            color: self.color.filter(|c| !c.trim().is_empty()),
            show_next_departure: self.show_next_departure.unwrap_or(false),
            windows,
            schedule,
        })
    }
}

pub fn parse_args() -> Result<Config> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut explicit_config: Option<PathBuf> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("--config needs a value"))?;
            explicit_config = Some(PathBuf::from(value));
        }
    }

    let env_config = env::var("COMMUTE_CONFIG").ok().map(PathBuf::from);
    let config_path = explicit_config
        .clone()
        .or(env_config)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut config = Config::default();

    if config_path.exists() {
        if let Some(file_config) = load_file_config(&config_path)? {
            apply_file_config(&mut config, file_config)?;
        }
    } else if explicit_config.is_some() {
        return Err(anyhow!("Config file not found: {}", config_path.display()));
    }

    config.config_path = config_path.clone();
    apply_env(&mut config);

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let _ = iter.next();
            }
            "--api-key" => {
                config.api_key = iter
                    .next()
                    .ok_or_else(|| anyhow!("--api-key needs a value"))?
                    .to_string();
            }
            "--origin" => {
                config.origin = iter
                    .next()
                    .ok_or_else(|| anyhow!("--origin needs a value"))?
                    .to_string();
            }
            "--lang" => {
                config.language = iter
                    .next()
                    .ok_or_else(|| anyhow!("--lang needs a value"))?
                    .to_string();
            }
            "--poll" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--poll needs a value"))?;
                let secs: u64 = value.parse()?;
                config.poll = Duration::from_secs(secs.max(1));
            }
            "--moderate" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--moderate needs a value"))?;
                config.moderate_threshold = value.parse()?;
            }
            "--poor" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--poor needs a value"))?;
                config.poor_threshold = value.parse()?;
            }
            "--calendar-file" => {
                config.calendar_file = iter
                    .next()
                    .ok_or_else(|| anyhow!("--calendar-file needs a value"))?
                    .to_string();
            }
            "--theme" => {
                config.theme = iter
                    .next()
                    .ok_or_else(|| anyhow!("--theme needs a value"))?
                    .to_string();
            }
            "--insecure" => {
                config.insecure = true;
            }
            "--log" => {
                config.log_enabled = true;
            }
            "--no-log" => {
                config.log_enabled = false;
            }
            "--log-level" => {
                config.log_level = iter
                    .next()
                    .ok_or_else(|| anyhow!("--log-level needs a value"))?
                    .to_string();
            }
            "--log-file" => {
                config.log_file = iter
                    .next()
                    .ok_or_else(|| anyhow!("--log-file needs a value"))?
                    .to_string();
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                return Err(anyhow!("Unknown argument: {other}"));
            }
        }
    }

    validate(&config)?;
    Ok(config)
}

fn load_file_config(path: &Path) -> Result<Option<FileConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let cfg: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(Some(cfg))
}

fn apply_file_config(target: &mut Config, file: FileConfig) -> Result<()> {
    if let Some(api_key) = file.api_key {
        target.api_key = api_key;
    }
    if let Some(api_url) = file.api_url {
        target.api_url = api_url;
    }
    if let Some(origin) = file.origin {
        target.origin = origin;
    }
    if let Some(language) = file.language {
        target.language = language;
    }
    if let Some(show_summary) = file.show_summary {
        target.show_summary = show_summary;
    }
    if let Some(show_updated) = file.show_updated {
        target.show_updated = show_updated;
    }
    if let Some(color_code) = file.color_code_travel_time {
        target.color_code_travel_time = color_code;
    }
    if let Some(moderate) = file.moderate_time_threshold {
        target.moderate_threshold = moderate;
    }
    if let Some(poor) = file.poor_time_threshold {
        target.poor_threshold = poor;
    }
    if let Some(format) = file.next_departure_format {
        target.next_departure_format = format;
    }
    if let Some(format) = file.travel_time_format {
        target.travel_time_format = format;
    }
    if let Some(show_arrival_time) = file.show_arrival_time {
        target.show_arrival_time = show_arrival_time;
    }
    if let Some(poll_secs) = file.poll_secs {
        target.poll = Duration::from_secs(poll_secs.max(1));
    }
    if let Some(max_events) = file.max_calendar_events {
        target.max_calendar_events = max_events;
    }
    if let Some(max_secs) = file.max_calendar_secs {
        target.max_calendar_secs = max_secs;
    }
    if let Some(calendar_file) = file.calendar_file {
        target.calendar_file = calendar_file;
    }
    if let Some(options) = file.calendar_options {
        target.calendar_options = options
            .into_iter()
            .map(|opt| opt.into_destination(false))
            .collect::<Result<Vec<_>>>()?;
    }
    if let Some(destinations) = file.destinations {
        target.destinations = destinations
            .into_iter()
            .map(|dest| dest.into_destination(true))
            .collect::<Result<Vec<_>>>()?;
    }
    if let Some(timeout) = file.request_timeout_secs {
        target.request_timeout_secs = timeout.max(1);
    }
    if let Some(insecure) = file.insecure {
        target.insecure = insecure;
    }
    if let Some(instance_id) = file.instance_id {
        target.instance_id = instance_id;
    }
    if let Some(theme) = file.theme {
        target.theme = theme;
    }
    if let Some(log_enabled) = file.log_enabled {
        target.log_enabled = log_enabled;
    }
    if let Some(log_level) = file.log_level {
        target.log_level = log_level;
    }
    if let Some(log_file) = file.log_file {
        target.log_file = log_file;
    }
    Ok(())
}

fn apply_env(config: &mut Config) {
    if let Ok(value) = env::var("COMMUTE_API_KEY") {
        config.api_key = value;
    }
    if let Ok(value) = env::var("COMMUTE_API_URL") {
        config.api_url = value;
    }
    if let Ok(value) = env::var("COMMUTE_ORIGIN") {
        config.origin = value;
    }
    if let Ok(value) = env::var("COMMUTE_LANG") {
        config.language = value;
    }
    if let Ok(value) = env::var("COMMUTE_POLL") {
        if let Ok(secs) = value.parse::<u64>() {
            config.poll = Duration::from_secs(secs.max(1));
        }
    }
    if let Ok(value) = env::var("COMMUTE_MODERATE_THRESHOLD") {
        if let Ok(val) = value.parse::<f64>() {
            config.moderate_threshold = val;
        }
    }
    if let Ok(value) = env::var("COMMUTE_POOR_THRESHOLD") {
        if let Ok(val) = value.parse::<f64>() {
            config.poor_threshold = val;
        }
    }
    if let Ok(value) = env::var("COMMUTE_CALENDAR_FILE") {
        config.calendar_file = value;
    }
    if let Ok(value) = env::var("COMMUTE_INSECURE") {
        config.insecure = matches!(value.as_str(), "1" | "true" | "yes" | "on");
    }
    if let Ok(value) = env::var("COMMUTE_THEME") {
        config.theme = value;
    }
    if let Ok(value) = env::var("COMMUTE_LOG_ENABLED") {
        config.log_enabled = matches!(value.as_str(), "1" | "true" | "yes" | "on");
    }
    if let Ok(value) = env::var("COMMUTE_LOG_LEVEL") {
        config.log_level = value;
    }
    if let Ok(value) = env::var("COMMUTE_LOG_FILE") {
        config.log_file = value;
    }
}

fn print_help() {
    println!("commute-board");
    println!("Usage: commute-board [--config PATH] [--api-key KEY] [--origin ADDRESS]");
    println!("       [--lang CODE] [--poll SECONDS] [--moderate RATIO] [--poor RATIO]");
    println!("       [--calendar-file PATH] [--theme default|color|amber|ocean|mono]");
    println!("       [--insecure] [--log] [--no-log] [--log-level LEVEL] [--log-file PATH]");
    println!("Config: commute-board.toml, or COMMUTE_CONFIG / --config");
    println!("Environment: COMMUTE_API_KEY, COMMUTE_API_URL, COMMUTE_ORIGIN, COMMUTE_LANG");
    println!("Environment: COMMUTE_POLL, COMMUTE_MODERATE_THRESHOLD, COMMUTE_POOR_THRESHOLD");
    println!("Environment: COMMUTE_CALENDAR_FILE, COMMUTE_INSECURE, COMMUTE_THEME");
    println!("Environment: COMMUTE_LOG_ENABLED, COMMUTE_LOG_LEVEL, COMMUTE_LOG_FILE");
    println!("Keys: q quit | p pause/resume | r refresh now | t theme");
}

fn validate(config: &Config) -> Result<()> {
    for (name, value) in [
        ("moderate_time_threshold", config.moderate_threshold),
        ("poor_time_threshold", config.poor_threshold),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(anyhow!("{name} must be a positive ratio, got {value}"));
        }
    }
    if config.api_url.trim().is_empty() {
        return Err(anyhow!("api_url must not be empty"));
    }
    if config.origin.trim().is_empty()
        && config.destinations.iter().any(|d| d.origin.is_none())
    {
        return Err(anyhow!("origin must be set globally or on every destination"));
    }
    Ok(())
}
