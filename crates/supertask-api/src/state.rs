//! State shared by all handlers.

use std::time::Instant;

use supertask_scheduler::Scheduler;

#[derive(Debug, Clone)]
pub struct ApiState {
    pub scheduler: Scheduler,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            started_at: Instant::now(),
        }
    }
}
