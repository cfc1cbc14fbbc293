//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source cluster configuration (MSSQL).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Copy behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source cluster (MSSQL) configuration.
///
/// One source config covers several catalogs on the same server; each entry
/// in `databases` becomes a schema of the same name on the target.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Server host.
    pub host: String,

    /// Server port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Catalogs to consolidate, processed in declared order.
    pub databases: Vec<String>,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("databases", &self.databases)
            .finish()
    }
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Database name.
    pub database: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .finish()
    }
}

/// Copy behavior configuration.
///
/// Fields are `Option<T>` so "not set" falls back to the tuned defaults via
/// the `get_*` accessors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MigrationConfig {
    /// Number of parallel table copiers per source database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Rows per committed insert batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Attempts to open a source cursor before abandoning a table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<usize>,
}

impl MigrationConfig {
    pub fn get_workers(&self) -> usize {
        self.workers.unwrap_or(30)
    }

    pub fn get_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(25_000)
    }

    pub fn get_max_retries(&self) -> usize {
        self.max_retries.unwrap_or(10)
    }

    /// Connection cap for both pools: headroom over the worker count so
    /// catalog queries and DDL never starve behind streaming copies.
    pub fn pool_size(&self) -> usize {
        self.get_workers() + 10
    }
}

fn default_mssql_port() -> u16 {
    1433
}

fn default_pg_port() -> u16 {
    5432
}
