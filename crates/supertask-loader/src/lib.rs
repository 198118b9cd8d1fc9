//! # supertask-loader
//!
//! Turns a timetable document into a validated [`Timetable`]. Supported
//! documents are JSON, YAML and scripts carrying an embedded `# /// task`
//! metadata block. Sources are local paths or `http(s)://` URLs.
//!
//! [`Timetable`]: supertask_entity::Timetable

pub mod error;
pub mod format;
pub mod loader;
pub mod script;

pub use error::LoadError;
pub use format::DocumentFormat;
pub use loader::{is_remote, load, load_str};
