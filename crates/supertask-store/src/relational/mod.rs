//! Relational job stores over the PostgreSQL wire protocol.

pub mod connection;
pub mod dialect;
pub mod store;

pub use dialect::Dialect;
pub use store::RelationalJobStore;
