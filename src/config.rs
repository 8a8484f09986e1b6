//! Discovery configuration.

use std::collections::HashMap;

use jid::Jid;
use log::warn;

/// Settings key: comma-separated tracker JIDs queried before auto-discovery.
pub const KEY_TRACKERS: &str = "jinglenodes.trackers";
/// Settings key: comma-separated prefixes probed first among domain items.
pub const KEY_SEARCH_PREFIXES: &str = "jinglenodes.search.prefixes";
/// Settings key: stop auto-discovery after the first prefixed item.
pub const KEY_STOP_ON_FIRST: &str = "jinglenodes.search.stop-on-first";
/// Settings key: search discoverable items under the server domain.
pub const KEY_AUTO_DISCOVER: &str = "jinglenodes.search.auto-discover";
/// Settings key: probe currently-available roster presences.
pub const KEY_SEARCH_BUDDIES: &str = "jinglenodes.search.buddies";
/// Settings key: maximum relay entries collected per run.
pub const KEY_MAX_ENTRIES: &str = "jinglenodes.search.max-entries";
/// Settings key: maximum tracker recursion depth.
pub const KEY_MAX_DEPTH: &str = "jinglenodes.search.max-depth";
/// Settings key: maximum nodes probed per run.
pub const KEY_MAX_PROBES: &str = "jinglenodes.search.max-probes";

/// Configuration for a relay discovery service.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Operator-curated tracker JIDs, queried before any auto-discovery.
    pub trackers: Vec<Jid>,
    /// Domain-item prefixes probed first during auto-discovery.
    pub prefixes: Vec<String>,
    /// Stop the auto-discovery phase after probing the first prefixed item.
    pub stop_on_first: bool,
    /// Search discoverable items under the account's server domain.
    pub auto_discover: bool,
    /// Probe currently-available roster presences as a last resort.
    pub search_buddies: bool,
    /// Maximum relay entries collected per run.
    pub max_entries: usize,
    /// Maximum tracker recursion depth.
    pub max_depth: u32,
    /// Maximum nodes probed per run.
    pub max_probes: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            trackers: Vec::new(),
            prefixes: Vec::new(),
            stop_on_first: true,
            auto_discover: true,
            search_buddies: false,
            max_entries: 6,
            max_depth: 3,
            max_probes: 30,
        }
    }
}

impl DiscoveryConfig {
    /// Build a configuration from a key-value settings store.
    ///
    /// Absent keys fall back to the defaults; malformed values are logged
    /// and fall back as well, so a bad settings entry can never block
    /// discovery from running.
    pub fn from_settings(settings: &HashMap<String, String>) -> Self {
        let defaults = Self::default();

        let trackers = list(settings, KEY_TRACKERS)
            .into_iter()
            .filter_map(|raw| match Jid::new(&raw) {
                Ok(jid) => Some(jid),
                Err(err) => {
                    warn!("ignoring malformed tracker entry {raw:?}: {err}");
                    None
                }
            })
            .collect();

        Self {
            trackers,
            prefixes: list(settings, KEY_SEARCH_PREFIXES),
            stop_on_first: flag(settings, KEY_STOP_ON_FIRST, defaults.stop_on_first),
            auto_discover: flag(settings, KEY_AUTO_DISCOVER, defaults.auto_discover),
            search_buddies: flag(settings, KEY_SEARCH_BUDDIES, defaults.search_buddies),
            max_entries: number(settings, KEY_MAX_ENTRIES, defaults.max_entries),
            max_depth: number(settings, KEY_MAX_DEPTH, defaults.max_depth),
            max_probes: number(settings, KEY_MAX_PROBES, defaults.max_probes),
        }
    }
}

fn flag(settings: &HashMap<String, String>, key: &str, default: bool) -> bool {
    match settings.get(key) {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!("ignoring non-boolean setting {key}={value:?}");
            default
        }),
    }
}

fn number<T: std::str::FromStr + Copy>(
    settings: &HashMap<String, String>,
    key: &str,
    default: T,
) -> T {
    match settings.get(key) {
        None => default,
        Some(value) => match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("ignoring non-numeric setting {key}={value:?}");
                default
            }
        },
    }
}

fn list(settings: &HashMap<String, String>, key: &str) -> Vec<String> {
    settings
        .get(key)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_when_settings_absent() {
        let config = DiscoveryConfig::from_settings(&HashMap::new());

        assert!(config.trackers.is_empty());
        assert!(config.prefixes.is_empty());
        assert!(config.stop_on_first);
        assert!(config.auto_discover);
        assert!(!config.search_buddies);
        assert_eq!(config.max_entries, 6);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.max_probes, 30);
    }

    #[test]
    fn test_settings_override_defaults() {
        let settings = HashMap::from([
            (KEY_TRACKERS.to_owned(), "tracker.example.org, relay.example.net".to_owned()),
            (KEY_SEARCH_PREFIXES.to_owned(), "jn., relay.".to_owned()),
            (KEY_STOP_ON_FIRST.to_owned(), "false".to_owned()),
            (KEY_SEARCH_BUDDIES.to_owned(), "true".to_owned()),
            (KEY_MAX_DEPTH.to_owned(), "5".to_owned()),
        ]);

        let config = DiscoveryConfig::from_settings(&settings);

        assert_eq!(config.trackers.len(), 2);
        assert_eq!(config.trackers[0].to_string(), "tracker.example.org");
        assert_eq!(config.prefixes, vec!["jn.", "relay."]);
        assert!(!config.stop_on_first);
        assert!(config.search_buddies);
        assert_eq!(config.max_depth, 5);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let settings = HashMap::from([
            (KEY_STOP_ON_FIRST.to_owned(), "yes please".to_owned()),
            (KEY_MAX_ENTRIES.to_owned(), "many".to_owned()),
            (KEY_TRACKERS.to_owned(), "valid.example.org,,not a jid@@".to_owned()),
        ]);

        let config = DiscoveryConfig::from_settings(&settings);

        assert!(config.stop_on_first);
        assert_eq!(config.max_entries, 6);
        assert_eq!(config.trackers.len(), 1);
        assert_eq!(config.trackers[0].to_string(), "valid.example.org");
    }
}
