/// Fixed UI strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Strings {
    pub loading: &'static str,
    pub last_refreshed: &'static str,
    pub error: &'static str,
    pub no_destinations: &'static str,
    pub suspended: &'static str,
}

const EN: Strings = Strings {
    loading: "Loading …",
    last_refreshed: "Last refreshed ",
    error: "Error",
    no_destinations: "No destinations in the current time window",
    suspended: "Paused",
};

const HU: Strings = Strings {
    loading: "Betöltés …",
    last_refreshed: "Utoljára frissítve ",
    error: "Hiba",
    no_destinations: "Nincs úticél az aktuális időablakban",
    suspended: "Szüneteltetve",
};

impl Strings {
    /// Looks up by primary language subtag, falling back to English.
    pub fn for_language(language: &str) -> Self {
        let primary = language
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "hu" => HU,
            _ => EN,
        }
    }
}
