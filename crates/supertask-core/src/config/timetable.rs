//! Timetable source configuration.

use serde::{Deserialize, Serialize};

/// Where the timetable document comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimetableConfig {
    /// Path or `http(s)://` URL of the timetable document.
    #[serde(default)]
    pub path: Option<String>,
}
