//! # supertask-store
//!
//! Job store providers for Supertask. A job store keeps one [`JobRecord`]
//! per registered job, keyed by job id, so the schedule survives a restart.
//!
//! - **memory**: volatile map, lost on restart
//! - **postgresql**: transactional relational table
//! - **crate**: CrateDB over the PostgreSQL wire protocol; every mutation
//!   is followed by a `REFRESH TABLE` so reads see prior writes
//!
//! [`JobRecord`]: supertask_entity::JobRecord

pub mod manager;
#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "relational")]
pub mod relational;
pub mod traits;

pub use manager::JobStoreManager;
#[cfg(feature = "memory")]
pub use memory::MemoryJobStore;
#[cfg(feature = "relational")]
pub use relational::RelationalJobStore;
pub use traits::JobStore;
