use anyhow::{anyhow, Result};
use chrono::NaiveTime;
use std::fmt;
use tracing::warn;

pub const TRAVEL_MODES: [&str; 4] = ["driving", "walking", "bicycling", "transit"];
pub const TRANSIT_MODES: [&str; 5] = ["bus", "subway", "train", "tram", "rail"];
pub const AVOID_OPTIONS: [&str; 4] = ["tolls", "highways", "ferries", "indoor"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Bicycling,
    Transit,
}

impl TravelMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "driving" => Some(TravelMode::Driving),
            "walking" => Some(TravelMode::Walking),
            "bicycling" => Some(TravelMode::Bicycling),
            "transit" => Some(TravelMode::Transit),
            _ => None,
        }
    }

    /// Unknown or missing modes fall back to driving.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            None => TravelMode::Driving,
            Some(raw) if raw.trim().is_empty() => TravelMode::Driving,
            Some(raw) => TravelMode::parse(raw).unwrap_or_else(|| {
                warn!(
                    "unknown travel mode {raw:?} (expected one of {}), using driving",
                    TRAVEL_MODES.join(", ")
                );
                TravelMode::Driving
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TravelMode::Driving => "driving",
            TravelMode::Walking => "walking",
            TravelMode::Bicycling => "bicycling",
            TravelMode::Transit => "transit",
        }
    }

    pub fn icon(self) -> Icon {
        match self {
            TravelMode::Driving => Icon::Car,
            TravelMode::Walking => Icon::Walk,
            TravelMode::Bicycling => Icon::Bike,
            TravelMode::Transit => Icon::Streetcar,
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Icon {
    Car,
    Walk,
    Bike,
    Streetcar,
    Bus,
    Subway,
    Train,
    Taxi,
    Boat,
    Gondola,
}

impl Icon {
    /// Maps a travel mode, transit sub-mode or upstream vehicle type onto an icon.
    pub fn for_symbol(symbol: &str) -> Option<Self> {
        let icon = match symbol.trim().to_ascii_lowercase().as_str() {
            "driving" => Icon::Car,
            "walking" => Icon::Walk,
            "bicycling" => Icon::Bike,
            "transit" | "tram" | "trolleybus" | "other" => Icon::Streetcar,
            "bus" | "intercity_bus" => Icon::Bus,
            "subway" | "metro_rail" => Icon::Subway,
            "train" | "rail" | "monorail" | "heavy_rail" | "commuter_train"
            | "high_speed_train" => Icon::Train,
            "share_taxi" => Icon::Taxi,
            "ferry" => Icon::Boat,
            "cable_car" | "gondola_lift" | "funicular" => Icon::Gondola,
            _ => return None,
        };
        Some(icon)
    }

    pub fn name(self) -> &'static str {
        match self {
            Icon::Car => "car",
            Icon::Walk => "walk",
            Icon::Bike => "bike",
            Icon::Streetcar => "streetcar",
            Icon::Bus => "bus",
            Icon::Subway => "subway",
            Icon::Train => "train",
            Icon::Taxi => "taxi",
            Icon::Boat => "boat",
            Icon::Gondola => "gondola",
        }
    }
}

/// Either a fixed arrival time (epoch seconds) or "leave now".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Departure {
    #[default]
    Now,
    ArriveBy(i64),
}

/// A time-of-day window with weekdays (Sun = 0 .. Sat = 6) on which it never applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub hide_days: Vec<u32>,
}

impl TimeWindow {
    pub fn parse(start: Option<&str>, end: Option<&str>, hide_days: &[u32]) -> Result<Self> {
        let defaults = Self::full_day();
        let start = match start {
            Some(value) if !value.trim().is_empty() => parse_time_of_day(value)?,
            _ => defaults.start,
        };
        let end = match end {
            Some(value) if !value.trim().is_empty() => parse_time_of_day(value)?,
            _ => defaults.end,
        };
        if let Some(day) = hide_days.iter().find(|d| **d > 6) {
            return Err(anyhow!("hide_days value {day} is not a weekday (0-6)"));
        }
        Ok(Self {
            start,
            end,
            hide_days: hide_days.to_vec(),
        })
    }

    pub fn full_day() -> Self {
        Self {
            start: NaiveTime::MIN,
            end: NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN),
            hide_days: Vec::new(),
        }
    }
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| anyhow!("invalid time of day {trimmed:?} (expected HH:MM)"))
}

/// Identity used to keep one prediction per tracked destination.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DestinationKey {
    pub label: String,
    pub mode: TravelMode,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Destination {
    pub label: String,
    pub address: String,
    pub origin: Option<String>,
    pub mode: TravelMode,
    /// Raw `|`-separated sub-modes as configured; filtered when the query is built.
    pub transit_mode: Option<String>,
    /// Raw `|`-separated avoid options as configured; filtered when the query is built.
    pub avoid: Option<String>,
    pub waypoints: Vec<String>,
    pub alternatives: bool,
    pub departure: Departure,
    pub color: Option<String>,
    pub show_next_departure: bool,
    pub windows: Vec<TimeWindow>,
    pub schedule: Option<String>,
}

impl Destination {
    pub fn key(&self) -> DestinationKey {
        DestinationKey {
            label: self.label.clone(),
            mode: self.mode,
        }
    }

    pub fn address_key(&self) -> String {
        self.address.trim().to_lowercase()
    }

    /// Transit sub-modes that pass the allow-list, in configured order.
    pub fn allowed_transit_modes(&self) -> Vec<&str> {
        filter_allowed(self.transit_mode.as_deref(), &TRANSIT_MODES)
    }

    pub fn allowed_avoid_options(&self) -> Vec<&str> {
        filter_allowed(self.avoid.as_deref(), &AVOID_OPTIONS)
    }
}

pub fn filter_allowed<'a>(raw: Option<&'a str>, allowed: &[&str]) -> Vec<&'a str> {
    raw.map(|value| {
        value
            .split('|')
            .filter(|token| allowed.contains(token))
            .collect()
    })
    .unwrap_or_default()
}

/// Splits a `|`-separated waypoint string, dropping blanks.
pub fn split_waypoints(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_defaults_to_driving() {
        assert_eq!(TravelMode::parse_or_default(None), TravelMode::Driving);
        assert_eq!(TravelMode::parse_or_default(Some("")), TravelMode::Driving);
        assert_eq!(
            TravelMode::parse_or_default(Some("hovercraft")),
            TravelMode::Driving
        );
        assert_eq!(
            TravelMode::parse_or_default(Some("Transit")),
            TravelMode::Transit
        );
    }

    #[test]
    fn allow_list_drops_unknown_tokens() {
        let dest = Destination {
            transit_mode: Some("bus|jetpack|subway||Bus".to_string()),
            avoid: Some("tolls|potholes".to_string()),
            ..Destination::default()
        };
        assert_eq!(dest.allowed_transit_modes(), vec!["bus", "subway"]);
        assert_eq!(dest.allowed_avoid_options(), vec!["tolls"]);
        assert!(Destination::default().allowed_avoid_options().is_empty());
    }

    #[test]
    fn window_defaults_and_validation() {
        let window = TimeWindow::parse(None, None, &[]).unwrap();
        assert_eq!(window, TimeWindow::full_day());

        let window = TimeWindow::parse(Some("06:30"), Some("09:15"), &[0, 6]).unwrap();
        assert_eq!(window.start, NaiveTime::from_hms_opt(6, 30, 0).unwrap());
        assert_eq!(window.hide_days, vec![0, 6]);

        assert!(TimeWindow::parse(Some("6h30"), None, &[]).is_err());
        assert!(TimeWindow::parse(None, None, &[7]).is_err());
    }

    #[test]
    fn icons_cover_vehicle_types() {
        assert_eq!(Icon::for_symbol("HEAVY_RAIL"), Some(Icon::Train));
        assert_eq!(Icon::for_symbol("ferry"), Some(Icon::Boat));
        assert_eq!(Icon::for_symbol("tram"), Some(Icon::Streetcar));
        assert_eq!(Icon::for_symbol("spaceship"), None);
        assert_eq!(TravelMode::Bicycling.icon().name(), "bike");
    }

    #[test]
    fn waypoints_split_in_order() {
        assert_eq!(
            split_waypoints("A St| |B Ave|C Rd"),
            vec!["A St".to_string(), "B Ave".to_string(), "C Rd".to_string()]
        );
    }
}
