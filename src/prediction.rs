use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::debug;

use crate::destination::{Destination, DestinationKey, Icon};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VehicleType {
    Bus,
    Subway,
    Train,
    Tram,
    Rail,
    MetroRail,
    Monorail,
    HeavyRail,
    CommuterTrain,
    HighSpeedTrain,
    IntercityBus,
    Trolleybus,
    ShareTaxi,
    Ferry,
    CableCar,
    GondolaLift,
    Funicular,
    Other(String),
}

impl VehicleType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "BUS" => VehicleType::Bus,
            "SUBWAY" => VehicleType::Subway,
            "TRAIN" => VehicleType::Train,
            "TRAM" => VehicleType::Tram,
            "RAIL" => VehicleType::Rail,
            "METRO_RAIL" => VehicleType::MetroRail,
            "MONORAIL" => VehicleType::Monorail,
            "HEAVY_RAIL" => VehicleType::HeavyRail,
            "COMMUTER_TRAIN" => VehicleType::CommuterTrain,
            "HIGH_SPEED_TRAIN" => VehicleType::HighSpeedTrain,
            "INTERCITY_BUS" => VehicleType::IntercityBus,
            "TROLLEYBUS" => VehicleType::Trolleybus,
            "SHARE_TAXI" => VehicleType::ShareTaxi,
            "FERRY" => VehicleType::Ferry,
            "CABLE_CAR" => VehicleType::CableCar,
            "GONDOLA_LIFT" => VehicleType::GondolaLift,
            "FUNICULAR" => VehicleType::Funicular,
            other => VehicleType::Other(other.to_ascii_lowercase()),
        }
    }

    pub fn icon(&self) -> Icon {
        match self {
            VehicleType::Bus | VehicleType::IntercityBus => Icon::Bus,
            VehicleType::Subway | VehicleType::MetroRail => Icon::Subway,
            VehicleType::Train
            | VehicleType::Rail
            | VehicleType::Monorail
            | VehicleType::HeavyRail
            | VehicleType::CommuterTrain
            | VehicleType::HighSpeedTrain => Icon::Train,
            VehicleType::Tram | VehicleType::Trolleybus => Icon::Streetcar,
            VehicleType::ShareTaxi => Icon::Taxi,
            VehicleType::Ferry => Icon::Boat,
            VehicleType::CableCar | VehicleType::GondolaLift | VehicleType::Funicular => {
                Icon::Gondola
            }
            VehicleType::Other(_) => Icon::Streetcar,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransitLeg {
    pub vehicle: VehicleType,
    pub line: String,
    pub departure: Option<DateTime<Local>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub summary: String,
    pub duration_secs: u64,
    pub traffic_secs: Option<u64>,
    pub transit: Vec<TransitLeg>,
}

impl Route {
    /// Traffic-aware duration when known, else the baseline.
    pub fn display_secs(&self) -> u64 {
        self.traffic_secs.unwrap_or(self.duration_secs)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Routes(Vec<Route>),
    Error(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub destination: Destination,
    /// Sequence number of the batch that produced this prediction.
    pub seq: u64,
    pub outcome: Outcome,
}

impl Prediction {
    pub fn error(destination: Destination, seq: u64, message: impl Into<String>) -> Self {
        Self {
            destination,
            seq,
            outcome: Outcome::Error(message.into()),
        }
    }

    pub fn key(&self) -> DestinationKey {
        self.destination.key()
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    pub fn routes(&self) -> &[Route] {
        match &self.outcome {
            Outcome::Routes(routes) => routes,
            Outcome::Error(_) => &[],
        }
    }

    /// Icon shown next to the destination. Transit routes prefer the first
    /// configured sub-mode, then the first leg's vehicle.
    pub fn icon(&self) -> Icon {
        let dest = &self.destination;
        let first_leg = self.routes().first().and_then(|r| r.transit.first());
        let Some(leg) = first_leg else {
            return dest.mode.icon();
        };
        dest.transit_mode
            .as_deref()
            .and_then(|raw| raw.split('|').next())
            .and_then(Icon::for_symbol)
            .unwrap_or_else(|| leg.vehicle.icon())
    }
}

/// Replaces predictions with the same identity in place and appends new ones.
/// An incoming prediction from an older batch than the stored one is ignored.
pub fn merge(current: &[Prediction], incoming: Vec<Prediction>) -> Vec<Prediction> {
    let mut merged = current.to_vec();
    for prediction in incoming {
        let key = prediction.key();
        match merged.iter_mut().find(|p| p.key() == key) {
            Some(existing) if existing.seq > prediction.seq => {
                debug!(
                    "ignoring stale prediction for {} (seq {} < {})",
                    key.label, prediction.seq, existing.seq
                );
            }
            Some(existing) => *existing = prediction,
            None => merged.push(prediction),
        }
    }
    merged
}

/// What the renderer sees; swapped as a whole after each merged batch.
#[derive(Clone, Debug, Default)]
pub struct DisplayState {
    pub predictions: Vec<Prediction>,
    pub last_updated: Option<DateTime<Local>>,
}

impl DisplayState {
    pub fn merged(&self, incoming: Vec<Prediction>, at: DateTime<Local>) -> Arc<DisplayState> {
        Arc::new(DisplayState {
            predictions: merge(&self.predictions, incoming),
            last_updated: Some(at),
        })
    }

    /// Drops predictions whose destination is no longer tracked.
    pub fn retained(&self, active: &[Destination]) -> Arc<DisplayState> {
        Arc::new(DisplayState {
            predictions: self
                .predictions
                .iter()
                .filter(|p| active.iter().any(|d| d.key() == p.key()))
                .cloned()
                .collect(),
            last_updated: self.last_updated,
        })
    }
}
