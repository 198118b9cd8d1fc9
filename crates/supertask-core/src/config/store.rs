//! Job store configuration.

use serde::{Deserialize, Serialize};

/// Job store location and connection pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store address. The URI scheme selects the backend:
    /// `memory://`, `postgresql://` or `crate://`.
    #[serde(default = "default_address")]
    pub address: String,
    /// Database schema holding the jobs table.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Base name of the jobs table. The timetable namespace is folded into it.
    #[serde(default = "default_table")]
    pub table: String,
    /// Prune the job store once at startup, before any job is registered.
    #[serde(default)]
    pub pre_delete: bool,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            schema: default_schema(),
            table: default_table(),
            pre_delete: false,
            max_connections: default_max_connections(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

fn default_address() -> String {
    "memory://".to_string()
}

fn default_schema() -> String {
    "supertask".to_string()
}

fn default_table() -> String {
    "jobs".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}
