use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::destination::{Departure, Destination};
use crate::storage::CalendarEvent;

/// Rules for turning calendar events into destinations.
#[derive(Clone, Debug, Default)]
pub struct CalendarRules {
    /// One destination per template per qualifying event.
    pub templates: Vec<Destination>,
    pub max_derived: usize,
    pub ttl: Duration,
}

/// Expands qualifying events into destinations, capped at `max_derived`.
pub fn derive_destinations(
    events: &[CalendarEvent],
    rules: &CalendarRules,
    now_epoch: i64,
) -> Vec<Destination> {
    let mut derived = Vec::new();
    if rules.templates.is_empty() {
        return derived;
    }
    let ttl = rules.ttl.as_secs() as i64;
    let (earliest, horizon) = (now_epoch.saturating_sub(ttl), now_epoch.saturating_add(ttl));

    for event in events {
        if derived.len() >= rules.max_derived {
            break;
        }
        let Some(location) = event.location.as_deref().map(str::trim) else {
            continue;
        };
        if location.is_empty() || event.start < earliest || event.start > horizon {
            continue;
        }
        for template in &rules.templates {
            derived.push(Destination {
                label: event.title.trim().to_string(),
                address: location.to_string(),
                departure: Departure::ArriveBy(event.start),
                color: template.color.clone().or_else(|| event.color.clone()),
                windows: Vec::new(),
                ..template.clone()
            });
        }
    }

    derived.truncate(rules.max_derived);
    derived
}

/// Static destinations first, then derived ones. A derived destination whose
/// address is already configured statically is dropped whatever its mode;
/// among derived destinations the first one per address and mode wins.
pub fn compute_active_set(
    static_destinations: &[Destination],
    events: &[CalendarEvent],
    rules: &CalendarRules,
    now_epoch: i64,
) -> Vec<Destination> {
    let derived = derive_destinations(events, rules, now_epoch);
    let static_addresses: HashSet<String> =
        static_destinations.iter().map(Destination::address_key).collect();
    let mut seen = HashSet::new();
    let mut active = static_destinations.to_vec();
    for dest in derived {
        let address = dest.address_key();
        if static_addresses.contains(&address) || !seen.insert((address, dest.mode)) {
            debug!("dropping duplicate destination {} ({})", dest.label, dest.address);
            continue;
        }
        active.push(dest);
    }
    active
}

/// The currently tracked destinations; replaced wholesale, never edited in place.
#[derive(Clone, Debug)]
pub struct ActiveSet {
    current: Arc<[Destination]>,
}

impl ActiveSet {
    pub fn new(destinations: Vec<Destination>) -> Self {
        Self {
            current: destinations.into(),
        }
    }

    pub fn replace(&mut self, destinations: Vec<Destination>) {
        self.current = destinations.into();
    }

    pub fn snapshot(&self) -> Arc<[Destination]> {
        Arc::clone(&self.current)
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::TravelMode;

    const NOW: i64 = 1_800_000_000;

    fn event(title: &str, location: Option<&str>, start: i64) -> CalendarEvent {
        CalendarEvent {
            title: title.to_string(),
            location: location.map(str::to_string),
            start,
            color: None,
        }
    }

    fn rules(max: usize, templates: Vec<Destination>) -> CalendarRules {
        CalendarRules {
            templates,
            max_derived: max,
            ttl: Duration::from_secs(24 * 3600),
        }
    }

    fn driving() -> Destination {
        Destination {
            mode: TravelMode::Driving,
            ..Destination::default()
        }
    }

    #[test]
    fn derived_portion_is_capped_and_deduplicated() {
        let static_dests = vec![Destination {
            label: "Office".to_string(),
            address: "1 Main St".to_string(),
            ..Destination::default()
        }];
        let events: Vec<CalendarEvent> = (0..5)
            .map(|i| {
                let location = if i == 0 {
                    "1 MAIN ST ".to_string()
                } else {
                    format!("Venue {i}")
                };
                event(&format!("Meeting {i}"), Some(&location), NOW + 600)
            })
            .collect();
        let rules = rules(2, vec![driving()]);

        let derived = derive_destinations(&events, &rules, NOW);
        assert_eq!(derived.len(), 2);

        let active = compute_active_set(&static_dests, &events, &rules, NOW);
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].label, "Office");
        assert_eq!(active[1].label, "Meeting 1");
    }

    #[test]
    fn events_outside_horizon_or_without_location_are_skipped() {
        let events = vec![
            event("No location", None, NOW + 60),
            event("Blank location", Some("  "), NOW + 60),
            event("Too far", Some("Airport"), NOW + 3 * 24 * 3600),
            event("Long gone", Some("Museum"), NOW - 3 * 24 * 3600),
            event("Already started", Some("Cafe"), NOW - 60),
            event("Dentist", Some("5 Elm St"), NOW + 3600),
        ];
        let derived = derive_destinations(&events, &rules(5, vec![driving()]), NOW);
        assert_eq!(derived.len(), 2);
        assert_eq!(derived[0].label, "Already started");
        assert_eq!(derived[1].label, "Dentist");
        assert_eq!(derived[1].departure, Departure::ArriveBy(NOW + 3600));
    }

    #[test]
    fn templates_expand_and_truncate() {
        let transit = Destination {
            mode: TravelMode::Transit,
            color: Some("#00ff00".to_string()),
            ..Destination::default()
        };
        let mut colored = event("Concert", Some("Hall"), NOW + 60);
        colored.color = Some("#ff0000".to_string());
        let events = vec![colored, event("Dinner", Some("Bistro"), NOW + 120)];

        let derived = derive_destinations(&events, &rules(3, vec![driving(), transit]), NOW);
        assert_eq!(derived.len(), 3);
        assert_eq!(derived[0].mode, TravelMode::Driving);
        assert_eq!(derived[0].color.as_deref(), Some("#ff0000"));
        assert_eq!(derived[1].mode, TravelMode::Transit);
        assert_eq!(derived[1].color.as_deref(), Some("#00ff00"));
        assert_eq!(derived[2].label, "Dinner");

        let active = compute_active_set(&[], &events, &rules(3, vec![driving(), driving()]), NOW);
        assert_eq!(active.len(), 2);
    }

    #[test]
    fn static_address_wins_over_derived_in_any_mode() {
        let static_dests = vec![Destination {
            label: "Office".to_string(),
            address: "1 Main St".to_string(),
            ..Destination::default()
        }];
        let transit = Destination {
            mode: TravelMode::Transit,
            ..Destination::default()
        };
        let events = vec![event("Review", Some("1 Main St"), NOW + 600)];
        let active = compute_active_set(&static_dests, &events, &rules(4, vec![transit]), NOW);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].label, "Office");
        assert_eq!(active[0].mode, TravelMode::Driving);
    }

    #[test]
    fn static_destinations_to_one_address_in_two_modes_both_stay() {
        let drive = Destination {
            label: "Work".to_string(),
            address: "1 Main St".to_string(),
            ..Destination::default()
        };
        let ride = Destination {
            mode: TravelMode::Transit,
            ..drive.clone()
        };
        let active = compute_active_set(&[drive, ride], &[], &rules(0, Vec::new()), NOW);
        assert_eq!(active.len(), 2);
    }

    #[test]
    fn no_templates_means_no_derived_destinations() {
        let events = vec![event("Dentist", Some("5 Elm St"), NOW + 3600)];
        assert!(derive_destinations(&events, &rules(4, Vec::new()), NOW).is_empty());
    }

    #[test]
    fn active_set_swaps_whole_snapshot() {
        let mut set = ActiveSet::new(vec![driving()]);
        let before = set.snapshot();
        set.replace(vec![driving(), driving()]);
        assert_eq!(before.len(), 1);
        assert_eq!(set.len(), 2);
    }
}
