//! Job store location.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Default schema holding job tables.
pub const DEFAULT_SCHEMA: &str = "supertask";
/// Default base name of job tables.
pub const DEFAULT_TABLE: &str = "jobs";
/// Prefix of namespaced table names.
pub const NAMESPACE_TABLE_PREFIX: &str = "st_";

/// Backend selected by the scheme of a store address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Volatile in-process map.
    Memory,
    /// Transactional relational store.
    Postgres,
    /// Eventually-consistent distributed SQL.
    CrateDb,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Postgres => write!(f, "postgresql"),
            Self::CrateDb => write!(f, "cratedb"),
        }
    }
}

/// Address, schema and table of a job store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStoreLocation {
    pub address: String,
    pub schema: String,
    pub table: String,
    /// Namespace folded into the effective table name.
    #[serde(default)]
    pub namespace: Option<String>,
}

impl JobStoreLocation {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            schema: DEFAULT_SCHEMA.to_string(),
            table: DEFAULT_TABLE.to_string(),
            namespace: None,
        }
    }

    /// Scope the location to a timetable namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Override schema and table. Empty values keep the current ones.
    pub fn with_options(mut self, schema: Option<&str>, table: Option<&str>) -> Self {
        if let Some(schema) = schema.filter(|s| !s.is_empty()) {
            self.schema = schema.to_string();
        }
        if let Some(table) = table.filter(|t| !t.is_empty()) {
            self.table = table.to_string();
        }
        self
    }

    /// Scheme part of the address, lowercased.
    pub fn scheme(&self) -> String {
        let scheme = match self.address.split_once(':') {
            Some((scheme, _)) => scheme,
            None => self.address.as_str(),
        };
        scheme.to_ascii_lowercase()
    }

    /// Select the backend from the address scheme.
    pub fn backend(&self) -> Result<StoreBackend, ModelError> {
        match self.scheme().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgresql" | "postgres" => Ok(StoreBackend::Postgres),
            "crate" | "cratedb" => Ok(StoreBackend::CrateDb),
            other => Err(ModelError::UnsupportedStore(other.to_string())),
        }
    }

    /// Effective schema name, safe to use as an SQL identifier.
    pub fn effective_schema(&self) -> String {
        sanitize_identifier(&self.schema)
    }

    /// Effective table name: `st_{namespace}_{table}` when namespaced.
    pub fn effective_table(&self) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => {
                sanitize_identifier(&format!("{NAMESPACE_TABLE_PREFIX}{ns}_{}", self.table))
            }
            _ => sanitize_identifier(&self.table),
        }
    }
}

fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }
        })
        .collect()
}
