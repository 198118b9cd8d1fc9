//! # supertask-api
//!
//! Read-only HTTP facade built on Axum. Exposes the health of the job store
//! and the runtime shape of every registered job.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use router::build_router;
pub use server::serve;
pub use state::ApiState;
