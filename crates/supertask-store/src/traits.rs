//! Job store provider trait.

use async_trait::async_trait;

use supertask_core::result::AppResult;
use supertask_entity::{JobRecord, StoreBackend};

/// Backend-neutral persistence for job records.
///
/// Every mutating call is atomic per record. After `put` or `remove`
/// returns, `get` and `list` issued from the same process reflect it.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Which backend this store talks to.
    fn backend(&self) -> StoreBackend;

    /// Create the backing schema and table when missing.
    async fn setup(&self) -> AppResult<()>;

    /// Insert or replace a record.
    async fn put(&self, record: &JobRecord) -> AppResult<()>;

    /// Fetch a record by job id.
    async fn get(&self, id: &str) -> AppResult<Option<JobRecord>>;

    /// Delete a record. Returns whether it existed.
    async fn remove(&self, id: &str) -> AppResult<bool>;

    /// Delete every record.
    async fn remove_all(&self) -> AppResult<()>;

    /// All records, ordered by next run time (unscheduled last), then id.
    async fn list(&self) -> AppResult<Vec<JobRecord>>;

    /// Check backend connectivity.
    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
