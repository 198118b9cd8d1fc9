//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from an
//! optional TOML file and `ST__SECTION__KEY` environment variables. Every
//! section has defaults, so running without any configuration is valid.

pub mod http;
pub mod logging;
pub mod scheduler;
pub mod store;
pub mod timetable;
pub mod watcher;

use serde::{Deserialize, Serialize};

use self::http::HttpConfig;
use self::logging::LoggingConfig;
use self::scheduler::SchedulerConfig;
use self::store::StoreConfig;
use self::timetable::TimetableConfig;
use self::watcher::WatcherConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Job store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Trigger engine and executor settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Timetable watcher settings.
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// HTTP facade settings.
    #[serde(default)]
    pub http: HttpConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Timetable source.
    #[serde(default)]
    pub timetable: TimetableConfig,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Reads the TOML file at `path` when given (it must exist), then
    /// overlays environment variables prefixed with `ST__`.
    pub fn load(path: Option<&str>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(std::path::Path::new(path))
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("ST")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
