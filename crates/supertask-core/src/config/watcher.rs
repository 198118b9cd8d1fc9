//! Timetable watcher configuration.

use serde::{Deserialize, Serialize};

/// Settings for the reconciliation watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Whether changes to the timetable document are observed.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Notifications arriving within this window of the last processed one are ignored.
    #[serde(default = "default_debounce")]
    pub debounce_millis: u64,
    /// Capacity of the change-notification channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_millis: default_debounce(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_debounce() -> u64 {
    1000
}

fn default_channel_capacity() -> usize {
    16
}
