//! Runtime job entities.

pub mod lane;
pub mod record;
pub mod summary;

pub use lane::ExecutorLane;
pub use record::{JobRecord, RunStatus, TriggerState};
pub use summary::JobSummary;
