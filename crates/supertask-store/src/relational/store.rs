//! Relational job store.

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgPool;
use tracing::{debug, info};

use supertask_core::config::store::StoreConfig;
use supertask_core::error::{AppError, ErrorKind};
use supertask_core::result::AppResult;
use supertask_entity::{JobRecord, JobStoreLocation, StoreBackend};

use super::connection::connect_pool;
use super::dialect::{Dialect, Mutation, MutationStatements, QualifiedTable};
use crate::traits::JobStore;

/// Job store persisting one row per job: id, next run time as epoch seconds
/// and the full record as JSON.
#[derive(Debug, Clone)]
pub struct RelationalJobStore {
    pool: PgPool,
    dialect: Dialect,
    table: QualifiedTable,
}

impl RelationalJobStore {
    /// Connect to the store at `location`.
    pub async fn connect(location: &JobStoreLocation, config: &StoreConfig) -> AppResult<Self> {
        let backend = location.backend()?;
        let dialect = Dialect::for_backend(backend).ok_or_else(|| {
            AppError::configuration(format!("'{backend}' is not a relational job store"))
        })?;
        let pool = connect_pool(backend, &location.address, config).await?;
        Ok(Self::from_pool(pool, dialect, location))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, dialect: Dialect, location: &JobStoreLocation) -> Self {
        Self {
            pool,
            dialect,
            table: QualifiedTable::new(location.effective_schema(), location.effective_table()),
        }
    }

    pub fn table(&self) -> &QualifiedTable {
        &self.table
    }

    async fn execute(&self, sql: &str) -> AppResult<u64> {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map(|done| done.rows_affected())
            .map_err(|e| db_error("Job store statement failed", e))
    }

    fn statements(&self, mutation: Mutation) -> MutationStatements {
        self.dialect.mutation(mutation, &self.table)
    }

    /// Make a completed write visible to subsequent reads.
    async fn refresh(&self, statements: &MutationStatements) -> AppResult<()> {
        if let Some(sql) = &statements.refresh {
            self.execute(sql).await?;
        }
        Ok(())
    }
}

fn db_error(context: &str, err: sqlx::Error) -> AppError {
    AppError::with_source(ErrorKind::Database, format!("{context}: {err}"), err)
}

fn decode_state(state: &str) -> AppResult<JobRecord> {
    serde_json::from_str(state).map_err(|e| {
        AppError::with_source(
            ErrorKind::Serialization,
            format!("Failed to decode job state: {e}"),
            e,
        )
    })
}

#[async_trait]
impl JobStore for RelationalJobStore {
    fn backend(&self) -> StoreBackend {
        self.dialect.backend()
    }

    async fn setup(&self) -> AppResult<()> {
        if let Some(sql) = self.dialect.create_schema(&self.table.schema) {
            self.execute(&sql).await?;
        }
        self.execute(&self.dialect.create_table(&self.table)).await?;
        info!(table = %self.table, backend = %self.backend(), "Job store table ready");
        Ok(())
    }

    async fn put(&self, record: &JobRecord) -> AppResult<()> {
        let state = serde_json::to_string(record)?;
        let next_run_time = record
            .next_run_time
            .map(|t| t.timestamp_micros() as f64 / 1_000_000.0);

        let statements = self.statements(Mutation::Put);
        sqlx::query(&statements.write)
            .bind(&record.id)
            .bind(next_run_time)
            .bind(state)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to store job", e))?;
        self.refresh(&statements).await?;

        debug!(job_id = %record.id, "Stored job");
        Ok(())
    }

    async fn get(&self, id: &str) -> AppResult<Option<JobRecord>> {
        let row = sqlx::query(&self.dialect.select_one(&self.table))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to fetch job", e))?;

        match row {
            Some(row) => {
                let state: String = row
                    .try_get("job_state")
                    .map_err(|e| db_error("Failed to read job state", e))?;
                Ok(Some(decode_state(&state)?))
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, id: &str) -> AppResult<bool> {
        let statements = self.statements(Mutation::Remove);
        let affected = sqlx::query(&statements.write)
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|done| done.rows_affected())
            .map_err(|e| db_error("Failed to remove job", e))?;
        self.refresh(&statements).await?;

        debug!(job_id = %id, removed = affected > 0, "Removed job");
        Ok(affected > 0)
    }

    async fn remove_all(&self) -> AppResult<()> {
        let statements = self.statements(Mutation::RemoveAll);
        self.execute(&statements.write).await?;
        self.refresh(&statements).await?;
        info!(table = %self.table, "Removed all jobs");
        Ok(())
    }

    async fn list(&self) -> AppResult<Vec<JobRecord>> {
        let rows = sqlx::query(&self.dialect.select_all(&self.table))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list jobs", e))?;

        rows.iter()
            .map(|row| {
                let state: String = row
                    .try_get("job_state")
                    .map_err(|e| db_error("Failed to read job state", e))?;
                decode_state(&state)
            })
            .collect()
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| db_error("Health check failed", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_store(dialect: Dialect) -> RelationalJobStore {
        let pool = PgPool::connect_lazy("postgres://localhost:5432/supertask").unwrap();
        let location = JobStoreLocation::new("crate://localhost:5432").with_namespace("abc");
        RelationalJobStore::from_pool(pool, dialect, &location)
    }

    #[tokio::test]
    async fn test_cratedb_store_refreshes_after_every_mutation() {
        let store = lazy_store(Dialect::CrateDb);
        let refresh = format!("REFRESH TABLE {}", store.table());
        for mutation in [Mutation::Put, Mutation::Remove, Mutation::RemoveAll] {
            let statements = store.statements(mutation);
            assert_eq!(statements.sequence().last().copied(), Some(refresh.as_str()));
        }
    }

    #[tokio::test]
    async fn test_postgres_store_skips_refresh() {
        let store = lazy_store(Dialect::Postgres);
        for mutation in [Mutation::Put, Mutation::Remove, Mutation::RemoveAll] {
            assert_eq!(store.statements(mutation).sequence().len(), 1);
        }
    }
}
