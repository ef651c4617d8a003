use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Directions API payload. Every field is optional so that partial payloads
/// still decode; the normalizer decides what is usable.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DirectionsResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub routes: Vec<RouteJson>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RouteJson {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub legs: Vec<LegJson>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct LegJson {
    #[serde(default)]
    pub duration: Option<TextValue>,
    #[serde(default)]
    pub duration_in_traffic: Option<TextValue>,
    #[serde(default)]
    pub steps: Vec<StepJson>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TextValue {
    #[serde(default, deserialize_with = "de_opt_u64_from_any")]
    pub value: Option<u64>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StepJson {
    #[serde(default)]
    pub travel_mode: Option<String>,
    #[serde(default)]
    pub transit_details: Option<TransitDetailsJson>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TransitDetailsJson {
    #[serde(default)]
    pub line: Option<LineJson>,
    #[serde(default)]
    pub departure_time: Option<TimeJson>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct LineJson {
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub vehicle: Option<VehicleJson>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct VehicleJson {
    #[serde(rename = "type")]
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TimeJson {
    #[serde(default, deserialize_with = "de_opt_i64_from_any")]
    pub value: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl LegJson {
    pub fn duration_secs(&self) -> Option<u64> {
        self.duration.as_ref().and_then(|d| d.value)
    }

    pub fn traffic_secs(&self) -> Option<u64> {
        self.duration_in_traffic.as_ref().and_then(|d| d.value)
    }
}

fn de_opt_i64_from_any<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => {
            if let Some(value) = number.as_i64() {
                Ok(Some(value))
            } else if let Some(value) = number.as_f64() {
                Ok(Some(value as i64))
            } else {
                Ok(None)
            }
        }
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else if let Ok(value) = trimmed.parse::<i64>() {
                Ok(Some(value))
            } else if let Ok(value) = trimmed.parse::<f64>() {
                Ok(Some(value as i64))
            } else {
                Ok(None)
            }
        }
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected number or null, got {other}"
        ))),
    }
}

fn de_opt_u64_from_any<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => {
            if let Some(value) = number.as_u64() {
                Ok(Some(value))
            } else if let Some(value) = number.as_f64() {
                Ok(Some(value.max(0.0) as u64))
            } else {
                Ok(None)
            }
        }
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else if let Ok(value) = trimmed.parse::<u64>() {
                Ok(Some(value))
            } else if let Ok(value) = trimmed.parse::<f64>() {
                Ok(Some(value.max(0.0) as u64))
            } else {
                Ok(None)
            }
        }
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected number or null, got {other}"
        ))),
    }
}

/// Epoch values above this are taken to be milliseconds.
const EPOCH_MILLIS_CUTOFF: i64 = 100_000_000_000;

/// Accepts epoch seconds, epoch milliseconds or an RFC 3339 timestamp.
pub(crate) fn de_epoch_secs_from_any<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let scale = |value: i64| {
        if value.abs() > EPOCH_MILLIS_CUTOFF {
            value / 1000
        } else {
            value
        }
    };
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|v| v as i64))
            .map(scale)
            .ok_or_else(|| serde::de::Error::custom("expected integer timestamp")),
        Value::String(text) => {
            let trimmed = text.trim();
            if let Ok(value) = trimmed.parse::<i64>() {
                return Ok(scale(value));
            }
            DateTime::parse_from_rfc3339(trimmed)
                .map(|dt| dt.timestamp())
                .map_err(|err| serde::de::Error::custom(format!("bad timestamp {trimmed:?}: {err}")))
        }
        other => Err(serde::de::Error::custom(format!(
            "expected timestamp, got {other}"
        ))),
    }
}
