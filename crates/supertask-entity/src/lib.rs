//! # supertask-entity
//!
//! Definition and runtime models for Supertask. A [`Timetable`] is what a
//! loader produces from a document; a [`JobRecord`] is what a job store
//! persists for every registered task. All models derive `Debug`, `Clone`,
//! `Serialize` and `Deserialize`.

pub mod cron;
pub mod error;
pub mod job;
pub mod namespace;
pub mod store;
pub mod task;
pub mod timetable;

pub use cron::CronFields;
pub use error::ModelError;
pub use job::{ExecutorLane, JobRecord, JobSummary, RunStatus, TriggerState};
pub use store::{JobStoreLocation, StoreBackend};
pub use task::{Event, Scalar, ScheduleItem, Step, Task, TaskMetadata};
pub use timetable::Timetable;
