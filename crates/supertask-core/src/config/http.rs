//! HTTP facade configuration.

use serde::{Deserialize, Serialize};

/// Read-only HTTP status facade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Listen address such as `localhost:4243`. The facade is off when unset.
    #[serde(default)]
    pub listen: Option<String>,
}
