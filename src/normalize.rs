use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::destination::{Destination, TravelMode};
use crate::model::{DirectionsResponse, LegJson, RouteJson};
use crate::prediction::{Outcome, Prediction, Route, TransitLeg, VehicleType};

/// What the fetch worker hands back for one query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawResponse {
    /// The request never produced an HTTP response.
    Transport(String),
    /// Non-success HTTP status code.
    Status(u16),
    Body(String),
}

pub fn normalize(raw: &RawResponse, destination: Destination, seq: u64) -> Prediction {
    let body = match raw {
        RawResponse::Transport(detail) => {
            warn!("transport error for {}: {detail}", destination.label);
            return Prediction::error(
                destination,
                seq,
                format!("Error getting traffic prediction: {detail}"),
            );
        }
        RawResponse::Status(code) => {
            warn!("HTTP {code} for {}", destination.label);
            return Prediction::error(
                destination,
                seq,
                format!("Error getting traffic prediction: {code}"),
            );
        }
        RawResponse::Body(body) => body,
    };

    match serde_json::from_str::<DirectionsResponse>(body) {
        Ok(data) => normalize_payload(data, destination, seq),
        Err(err) => {
            warn!("malformed directions payload for {}: {err}", destination.label);
            Prediction::error(destination, seq, format!("Malformed directions response: {err}"))
        }
    }
}

pub fn normalize_payload(data: DirectionsResponse, destination: Destination, seq: u64) -> Prediction {
    if let Some(message) = data.error_message.filter(|m| !m.trim().is_empty()) {
        warn!("directions error for {}: {message}", destination.label);
        return Prediction::error(destination, seq, message);
    }
    let status = data.status.unwrap_or_default();
    if status != "OK" {
        warn!("directions status {status} for {}", destination.label);
        return Prediction::error(destination, seq, format!("status != OK: {status}"));
    }

    let transit = destination.mode == TravelMode::Transit;
    let mut routes = Vec::with_capacity(data.routes.len());
    for route in &data.routes {
        let Some(leg) = route.legs.first() else {
            debug!("skipping route without legs for {}", destination.label);
            continue;
        };
        let Some(duration_secs) = leg.duration_secs() else {
            debug!("skipping route without duration for {}", destination.label);
            continue;
        };
        let mut normalized = Route {
            summary: route.summary.clone().unwrap_or_default(),
            duration_secs,
            traffic_secs: leg.traffic_secs(),
            transit: Vec::new(),
        };
        if transit {
            normalized.transit = transit_legs(leg, destination.show_next_departure);
            if normalized.transit.is_empty() {
                let modes = step_modes(route);
                warn!("transit directions without transit legs ({modes})");
                return Prediction::error(
                    destination,
                    seq,
                    format!("Transit directions does not contain any transits ({modes})"),
                );
            }
        }
        routes.push(normalized);
    }

    debug!("normalized {} routes for {}", routes.len(), destination.label);
    Prediction {
        destination,
        seq,
        outcome: Outcome::Routes(routes),
    }
}

fn transit_legs(leg: &LegJson, show_next_departure: bool) -> Vec<TransitLeg> {
    let mut legs = Vec::new();
    for details in leg.steps.iter().filter_map(|s| s.transit_details.as_ref()) {
        let line = details.line.as_ref();
        let label = line
            .and_then(|l| l.short_name.as_deref().filter(|s| !s.is_empty()))
            .or_else(|| line.and_then(|l| l.name.as_deref()))
            .unwrap_or_default()
            .to_string();
        let vehicle = line
            .and_then(|l| l.vehicle.as_ref())
            .and_then(|v| v.kind.as_deref())
            .map(VehicleType::parse)
            .unwrap_or_else(|| VehicleType::Other("other".to_string()));
        let departure = if legs.is_empty() && show_next_departure {
            details
                .departure_time
                .as_ref()
                .and_then(|t| t.value)
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(|dt| dt.with_timezone(&Local))
        } else {
            None
        };
        legs.push(TransitLeg {
            vehicle,
            line: label,
            departure,
        });
    }
    legs
}

fn step_modes(route: &RouteJson) -> String {
    route
        .legs
        .first()
        .map(|leg| {
            leg.steps
                .iter()
                .filter_map(|s| s.travel_mode.as_deref())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}
