//! Document type detection.

use std::fmt;

use crate::error::LoadError;

/// Declared type of a timetable document, read from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    /// A script with an embedded `# /// task` block.
    Script,
}

const SCRIPT_EXTENSIONS: &[&str] = &["py", "sh", "bash", "rb", "pl"];

impl DocumentFormat {
    /// Detect the format of `source`. Query strings and fragments of URLs are
    /// ignored.
    pub fn detect(source: &str) -> Result<Self, LoadError> {
        let path = source
            .split(['?', '#'])
            .next()
            .unwrap_or(source)
            .to_ascii_lowercase();
        let extension = path
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.contains('/'))
            .unwrap_or_default();

        match extension {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            ext if SCRIPT_EXTENSIONS.contains(&ext) => Ok(Self::Script),
            _ => Err(LoadError::UnsupportedFormat(source.to_string())),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
            Self::Script => write!(f, "script"),
        }
    }
}
