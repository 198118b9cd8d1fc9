//! Timetable loading.

use std::path::Path;

use tracing::{debug, info};

use supertask_entity::Timetable;

use crate::error::LoadError;
use crate::format::DocumentFormat;
use crate::script;

/// Whether `source` is an `http(s)://` URL.
pub fn is_remote(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Load a timetable from a local path or an `http(s)://` URL.
///
/// The result is validated, records `source` under the `taskfile` meta key
/// and always carries a namespace.
pub async fn load(source: &str) -> Result<Timetable, LoadError> {
    info!(source = %source, "Loading task(s) from timetable");
    let format = DocumentFormat::detect(source)?;

    if format == DocumentFormat::Script {
        if is_remote(source) {
            return Err(LoadError::UnsupportedFormat(format!(
                "{source} (embedded scripts must be local files)"
            )));
        }
        let text = read_local(source).await?;
        let timetable = script::timetable_from_script(Path::new(source), &text)?;
        return Ok(timetable.finalize()?);
    }

    let text = if is_remote(source) {
        fetch(source).await?
    } else {
        read_local(source).await?
    };
    load_str(&text, format, source)
}

/// Parse a JSON or YAML document already in memory.
///
/// YAML is read with the 1.2 core schema, so a literal `on` key stays a string.
pub fn load_str(text: &str, format: DocumentFormat, source: &str) -> Result<Timetable, LoadError> {
    let timetable: Timetable = match format {
        DocumentFormat::Json => {
            serde_json::from_str(text).map_err(|e| LoadError::parse(source, e))?
        }
        DocumentFormat::Yaml => {
            serde_yaml::from_str(text).map_err(|e| LoadError::parse(source, e))?
        }
        DocumentFormat::Script => {
            return Ok(script::timetable_from_script(Path::new(source), text)?.finalize()?);
        }
    };

    let timetable = timetable.with_source(source).finalize()?;
    debug!(
        source = %source,
        namespace = %timetable.namespace(),
        tasks = timetable.tasks.len(),
        "Timetable loaded"
    );
    Ok(timetable)
}

async fn read_local(source: &str) -> Result<String, LoadError> {
    let path = source.strip_prefix("file://").unwrap_or(source);
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::Io {
            path: path.to_string(),
            source,
        })
}

async fn fetch(url: &str) -> Result<String, LoadError> {
    let fetch_error = |message: String| LoadError::Fetch {
        url: url.to_string(),
        message,
    };
    let response = reqwest::get(url)
        .await
        .map_err(|e| fetch_error(e.to_string()))?
        .error_for_status()
        .map_err(|e| fetch_error(e.to_string()))?;
    response.text().await.map_err(|e| fetch_error(e.to_string()))
}
