//! SQL statements per relational backend.

use supertask_entity::StoreBackend;

/// A write against the job table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Put,
    Remove,
    RemoveAll,
}

/// Statements for one mutation: the write, then the refresh that makes it
/// visible to the next read where the backend needs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationStatements {
    pub write: String,
    pub refresh: Option<String>,
}

impl MutationStatements {
    /// All statements in execution order.
    pub fn sequence(&self) -> Vec<&str> {
        std::iter::once(self.write.as_str())
            .chain(self.refresh.as_deref())
            .collect()
    }
}

/// Statement flavour of a relational job store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Transactional PostgreSQL.
    Postgres,
    /// CrateDB. Writes become visible to reads only after `REFRESH TABLE`.
    CrateDb,
}

impl Dialect {
    /// Dialect for a relational backend. `None` for non-relational ones.
    pub fn for_backend(backend: StoreBackend) -> Option<Self> {
        match backend {
            StoreBackend::Postgres => Some(Self::Postgres),
            StoreBackend::CrateDb => Some(Self::CrateDb),
            StoreBackend::Memory => None,
        }
    }

    pub fn backend(&self) -> StoreBackend {
        match self {
            Self::Postgres => StoreBackend::Postgres,
            Self::CrateDb => StoreBackend::CrateDb,
        }
    }

    /// `CREATE SCHEMA`, where the backend has explicit schemas.
    pub fn create_schema(&self, schema: &str) -> Option<String> {
        match self {
            Self::Postgres => Some(format!("CREATE SCHEMA IF NOT EXISTS {}", quote(schema))),
            Self::CrateDb => None,
        }
    }

    pub fn create_table(&self, table: &QualifiedTable) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
             id TEXT PRIMARY KEY, \
             next_run_time DOUBLE PRECISION, \
             job_state TEXT NOT NULL)"
        )
    }

    pub fn upsert(&self, table: &QualifiedTable) -> String {
        format!(
            "INSERT INTO {table} (id, next_run_time, job_state) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET \
             next_run_time = excluded.next_run_time, job_state = excluded.job_state"
        )
    }

    pub fn select_one(&self, table: &QualifiedTable) -> String {
        format!("SELECT job_state FROM {table} WHERE id = $1")
    }

    pub fn select_all(&self, table: &QualifiedTable) -> String {
        format!("SELECT job_state FROM {table} ORDER BY next_run_time ASC NULLS LAST, id ASC")
    }

    pub fn delete_one(&self, table: &QualifiedTable) -> String {
        format!("DELETE FROM {table} WHERE id = $1")
    }

    pub fn delete_all(&self, table: &QualifiedTable) -> String {
        match self {
            Self::Postgres => format!("TRUNCATE TABLE {table}"),
            Self::CrateDb => format!("DELETE FROM {table}"),
        }
    }

    pub fn mutation(&self, mutation: Mutation, table: &QualifiedTable) -> MutationStatements {
        let write = match mutation {
            Mutation::Put => self.upsert(table),
            Mutation::Remove => self.delete_one(table),
            Mutation::RemoveAll => self.delete_all(table),
        };
        MutationStatements {
            write,
            refresh: self.refresh(table),
        }
    }

    /// Statement making prior writes visible to reads, where needed.
    pub fn refresh(&self, table: &QualifiedTable) -> Option<String> {
        match self {
            Self::Postgres => None,
            Self::CrateDb => Some(format!("REFRESH TABLE {table}")),
        }
    }
}

/// A schema-qualified, quoted table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedTable {
    pub schema: String,
    pub table: String,
}

impl QualifiedTable {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl std::fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", quote(&self.schema), quote(&self.table))
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
