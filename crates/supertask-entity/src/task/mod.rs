//! Task definition entities.

pub mod model;
pub mod scalar;
pub mod step;

pub use model::{Event, ScheduleItem, Task, TaskMetadata};
pub use scalar::Scalar;
pub use step::Step;
