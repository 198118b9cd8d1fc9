//! Loader errors.

use supertask_core::AppError;
use supertask_entity::ModelError;
use thiserror::Error;

/// Errors raised while reading or parsing a timetable document.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The document type is not JSON, YAML or an embedded script.
    #[error("Task or timetable file type not supported: {0}")]
    UnsupportedFormat(String),
    /// The document could not be read from disk.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The document could not be fetched over HTTP.
    #[error("Failed to fetch '{url}': {message}")]
    Fetch { url: String, message: String },
    /// The document is not well-formed.
    #[error("Failed to parse '{source_name}': {message}")]
    Parse {
        source_name: String,
        message: String,
    },
    /// The document parsed but does not describe a valid timetable.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl LoadError {
    pub(crate) fn parse(source_name: &str, message: impl ToString) -> Self {
        Self::Parse {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<LoadError> for AppError {
    fn from(err: LoadError) -> Self {
        match &err {
            LoadError::UnsupportedFormat(_) => AppError::unsupported_format(err.to_string()),
            LoadError::Io { .. } => AppError::storage(err.to_string()),
            LoadError::Fetch { .. } => AppError::external_service(err.to_string()),
            LoadError::Parse { .. } => AppError::validation(err.to_string()),
            LoadError::Model(model) => model.clone().into(),
        }
    }
}
