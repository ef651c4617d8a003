use urlencoding::encode;

use crate::destination::{Departure, Destination, TravelMode};

pub const DEFAULT_API_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

/// Values shared by every query of a widget instance.
#[derive(Clone, Debug)]
pub struct GlobalDefaults {
    pub api_url: String,
    pub api_key: String,
    pub origin: String,
    pub language: String,
}

/// A directions query with wire-ready parameter values, in emission order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuerySpec {
    pub endpoint: String,
    pub params: Vec<(&'static str, String)>,
}

impl QuerySpec {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn url(&self) -> String {
        let query: Vec<String> = self
            .params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        format!("{}?{}", self.endpoint, query.join("&"))
    }

    /// Same as `url` with the API key masked, for logging.
    pub fn redacted_url(&self) -> String {
        let query: Vec<String> = self
            .params
            .iter()
            .map(|(key, value)| {
                if *key == "key" {
                    format!("{key}=***")
                } else {
                    format!("{key}={value}")
                }
            })
            .collect();
        format!("{}?{}", self.endpoint, query.join("&"))
    }
}

/// Builds the query for one destination. Malformed optional fields are
/// dropped rather than reported.
pub fn build_query(dest: &Destination, defaults: &GlobalDefaults) -> QuerySpec {
    let origin = dest
        .origin
        .as_deref()
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .unwrap_or(defaults.origin.as_str());

    let mut params: Vec<(&'static str, String)> = vec![
        ("origin", encode(origin).into_owned()),
        ("destination", encode(&dest.address).into_owned()),
        ("key", defaults.api_key.clone()),
        ("language", defaults.language.clone()),
        ("mode", dest.mode.as_str().to_string()),
    ];

    if dest.mode == TravelMode::Transit {
        let modes = dest.allowed_transit_modes();
        if !modes.is_empty() {
            params.push(("transit_mode", modes.join("|")));
        }
    }

    if !dest.waypoints.is_empty() {
        let waypoints: Vec<String> = dest
            .waypoints
            .iter()
            .map(|wp| format!("via:{}", encode(wp)))
            .collect();
        params.push(("waypoints", waypoints.join("|")));
    }

    let avoid = dest.allowed_avoid_options();
    if !avoid.is_empty() {
        params.push(("avoid", avoid.join("|")));
    }

    if dest.alternatives {
        params.push(("alternatives", "true".to_string()));
    }

    match dest.departure {
        Departure::ArriveBy(epoch) => params.push(("arrival_time", epoch.to_string())),
        // traffic-aware durations are only returned for a departure time
        Departure::Now => params.push(("departure_time", "now".to_string())),
    }

    QuerySpec {
        endpoint: defaults.api_url.clone(),
        params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> GlobalDefaults {
        GlobalDefaults {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: "secret".to_string(),
            origin: "65 Front St W, Toronto".to_string(),
            language: "en".to_string(),
        }
    }

    fn dest(mode: TravelMode) -> Destination {
        Destination {
            label: "Gallery".to_string(),
            address: "317 Dundas St W".to_string(),
            mode,
            ..Destination::default()
        }
    }

    #[test]
    fn required_params_in_order() {
        let query = build_query(&dest(TravelMode::Driving), &defaults());
        let names: Vec<&str> = query.params.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            names,
            vec!["origin", "destination", "key", "language", "mode", "departure_time"]
        );
        assert_eq!(query.param("origin"), Some("65%20Front%20St%20W%2C%20Toronto"));
        assert_eq!(query.param("destination"), Some("317%20Dundas%20St%20W"));
        assert_eq!(query.param("mode"), Some("driving"));
        assert!(query.url().starts_with(
            "https://maps.googleapis.com/maps/api/directions/json?origin=65%20Front"
        ));
        assert!(query.redacted_url().contains("key=***"));
        assert!(!query.redacted_url().contains("secret"));
    }

    #[test]
    fn origin_override_wins() {
        let mut d = dest(TravelMode::Walking);
        d.origin = Some("Union Station".to_string());
        let query = build_query(&d, &defaults());
        assert_eq!(query.param("origin"), Some("Union%20Station"));

        d.origin = Some("   ".to_string());
        let query = build_query(&d, &defaults());
        assert_eq!(query.param("origin"), Some("65%20Front%20St%20W%2C%20Toronto"));
    }

    #[test]
    fn transit_mode_only_for_transit_and_filtered() {
        let noisy = "bus|rocket||subway|tram|BUS|a|b|rail|train";
        let mut d = dest(TravelMode::Transit);
        d.transit_mode = Some(noisy.to_string());
        let query = build_query(&d, &defaults());
        assert_eq!(query.param("transit_mode"), Some("bus|subway|tram|rail|train"));

        let mut d = dest(TravelMode::Driving);
        d.transit_mode = Some("bus".to_string());
        assert_eq!(build_query(&d, &defaults()).param("transit_mode"), None);

        let mut d = dest(TravelMode::Transit);
        d.transit_mode = Some("hovercraft|zeppelin".to_string());
        assert_eq!(build_query(&d, &defaults()).param("transit_mode"), None);
    }

    #[test]
    fn avoid_never_carries_unknown_values() {
        let allowed = ["tolls", "highways", "ferries", "indoor"];
        for raw in ["tolls|ferries", "x|y|z", "|||", "indoor|tolls|tolls", "HIGHWAYS|highways"] {
            let mut d = dest(TravelMode::Driving);
            d.avoid = Some(raw.to_string());
            let query = build_query(&d, &defaults());
            if let Some(avoid) = query.param("avoid") {
                assert!(avoid.split('|').all(|token| allowed.contains(&token)), "{raw}");
            }
        }
        let mut d = dest(TravelMode::Driving);
        d.avoid = Some("x|y".to_string());
        assert_eq!(build_query(&d, &defaults()).param("avoid"), None);
    }

    #[test]
    fn waypoints_are_marked_and_encoded() {
        let mut d = dest(TravelMode::Driving);
        d.waypoints = vec!["Queen & Spadina".to_string(), "King St".to_string()];
        let query = build_query(&d, &defaults());
        assert_eq!(
            query.param("waypoints"),
            Some("via:Queen%20%26%20Spadina|via:King%20St")
        );
    }

    #[test]
    fn exactly_one_timing_param() {
        for departure in [Departure::Now, Departure::ArriveBy(1_800_000_000)] {
            let mut d = dest(TravelMode::Transit);
            d.departure = departure;
            let query = build_query(&d, &defaults());
            let arrival = query.param("arrival_time");
            let depart = query.param("departure_time");
            assert!(arrival.is_some() ^ depart.is_some());
            match departure {
                Departure::Now => assert_eq!(depart, Some("now")),
                Departure::ArriveBy(_) => assert_eq!(arrival, Some("1800000000")),
            }
        }
    }

    #[test]
    fn alternatives_flag() {
        let mut d = dest(TravelMode::Driving);
        assert_eq!(build_query(&d, &defaults()).param("alternatives"), None);
        d.alternatives = true;
        assert_eq!(build_query(&d, &defaults()).param("alternatives"), Some("true"));
    }
}
