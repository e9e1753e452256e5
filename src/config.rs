use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DEFAULT_LOCAL_DATA_PATH, DEFAULT_POLL_MS, DEFAULT_URL_BASE, MIN_POLL_MS};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub url_base: String,
    pub local_data_path: PathBuf,
    pub poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url_base: DEFAULT_URL_BASE.to_string(),
            local_data_path: PathBuf::from(DEFAULT_LOCAL_DATA_PATH),
            poll_interval_ms: DEFAULT_POLL_MS,
        }
    }
}

impl ClientConfig {
    /// Reads `URL_BASE`, `LOCAL_DATA_PATH` and `POLL_INTERVAL_MS`, falling
    /// back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            url_base: read_string(&lookup, "URL_BASE").unwrap_or(defaults.url_base),
            local_data_path: read_string(&lookup, "LOCAL_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_data_path),
            poll_interval_ms: normalize_poll_ms(
                read_string(&lookup, "POLL_INTERVAL_MS").and_then(|value| value.parse().ok()),
            ),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(normalize_poll_ms(Some(self.poll_interval_ms)))
    }
}

fn read_string(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn normalize_poll_ms(value: Option<u64>) -> u64 {
    value.unwrap_or(DEFAULT_POLL_MS).max(MIN_POLL_MS)
}
