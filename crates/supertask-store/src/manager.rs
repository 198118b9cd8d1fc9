//! Job store manager that dispatches to the backend selected by the address.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use supertask_core::config::store::StoreConfig;
use supertask_core::error::AppError;
use supertask_core::result::AppResult;
use supertask_entity::{JobRecord, JobStoreLocation, StoreBackend};

use crate::traits::JobStore;

/// Job store wrapper holding the configured backend and its location.
#[derive(Debug, Clone)]
pub struct JobStoreManager {
    inner: Arc<dyn JobStore>,
    location: JobStoreLocation,
}

impl JobStoreManager {
    /// Connect to the store at `location` and create its table.
    ///
    /// An address scheme without a backend is a configuration error.
    pub async fn connect(location: JobStoreLocation, config: &StoreConfig) -> AppResult<Self> {
        let backend = location.backend()?;
        let inner: Arc<dyn JobStore> = match backend {
            #[cfg(feature = "memory")]
            StoreBackend::Memory => {
                info!("Initializing in-memory job store");
                Arc::new(crate::memory::MemoryJobStore::new())
            }
            #[cfg(feature = "relational")]
            StoreBackend::Postgres | StoreBackend::CrateDb => {
                info!(backend = %backend, "Initializing relational job store");
                Arc::new(crate::relational::RelationalJobStore::connect(&location, config).await?)
            }
            #[allow(unreachable_patterns)]
            other => {
                return Err(AppError::configuration(format!(
                    "Job store backend '{other}' is not compiled in"
                )));
            }
        };

        inner.setup().await?;
        Ok(Self { inner, location })
    }

    /// Create a manager from an existing store (for testing).
    pub fn from_store(store: Arc<dyn JobStore>, location: JobStoreLocation) -> Self {
        Self {
            inner: store,
            location,
        }
    }

    pub fn location(&self) -> &JobStoreLocation {
        &self.location
    }

    /// Shared handle to the inner store.
    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.inner)
    }

    /// Best-effort removal of every job. Backend errors are logged and
    /// swallowed. Returns whether the cleanup succeeded.
    pub async fn pre_delete(&self) -> bool {
        match self.inner.remove_all().await {
            Ok(()) => {
                info!(table = %self.location.effective_table(), "Pre-deleted jobs");
                true
            }
            Err(e) => {
                warn!(error = %e, "Pre-deleting jobs failed, continuing");
                false
            }
        }
    }
}

#[async_trait]
impl JobStore for JobStoreManager {
    fn backend(&self) -> StoreBackend {
        self.inner.backend()
    }

    async fn setup(&self) -> AppResult<()> {
        self.inner.setup().await
    }

    async fn put(&self, record: &JobRecord) -> AppResult<()> {
        self.inner.put(record).await
    }

    async fn get(&self, id: &str) -> AppResult<Option<JobRecord>> {
        self.inner.get(id).await
    }

    async fn remove(&self, id: &str) -> AppResult<bool> {
        self.inner.remove(id).await
    }

    async fn remove_all(&self) -> AppResult<()> {
        self.inner.remove_all().await
    }

    async fn list(&self) -> AppResult<Vec<JobRecord>> {
        self.inner.list().await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
