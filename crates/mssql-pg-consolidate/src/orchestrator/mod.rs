//! Top-level driver: validates configuration and walks the source database
//! list in declared order, one consolidation run per invocation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::runner::process_database;

/// Consolidation driver.
pub struct Migrator {
    config: Config,
}

/// Result of a consolidation run.
///
/// Per-table failures and dropped rows do not fail the run; they show up
/// here and in the logs, and the row-count gap is the reconciliation signal.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Source databases configured.
    pub databases_total: usize,

    /// Source databases skipped (unreachable or catalog failure).
    pub databases_skipped: usize,

    /// Names of skipped databases.
    pub skipped_databases: Vec<String>,

    /// Tables copied to completion.
    pub tables_copied: usize,

    /// Tables abandoned.
    pub tables_failed: usize,

    /// Tables excluded by the ignore policy.
    pub tables_ignored: usize,

    /// Rows inserted.
    pub rows_copied: u64,

    /// Rows dropped by insert failures.
    pub rows_failed: u64,

    /// Foreign keys installed.
    pub fks_installed: usize,

    /// Foreign keys that failed to install.
    pub fks_failed: usize,
}

impl MigrationResult {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Migrator {
    /// Create a new migrator from validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run the consolidation: each source database in declared order, each
    /// into a target namespace of the same name.
    pub async fn run(self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!(
            "Starting consolidation run {} ({} source databases, {} workers)",
            run_id,
            self.config.source.databases.len(),
            self.config.migration.get_workers()
        );

        let mut skipped_databases = Vec::new();
        let mut tables_copied = 0;
        let mut tables_failed = 0;
        let mut tables_ignored = 0;
        let mut rows_copied = 0u64;
        let mut rows_failed = 0u64;
        let mut fks_installed = 0;
        let mut fks_failed = 0;

        for db_name in &self.config.source.databases {
            let report = process_database(db_name, &self.config).await?;
            if report.skipped {
                skipped_databases.push(report.database);
                continue;
            }
            tables_copied += report.tables_copied;
            tables_failed += report.tables_failed;
            tables_ignored += report.tables_ignored;
            rows_copied += report.rows_copied;
            rows_failed += report.rows_failed;
            fks_installed += report.fks_installed;
            fks_failed += report.fks_failed;
        }

        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        info!(
            "Consolidation run {} finished in {:.1}s: {} tables, {} rows",
            run_id, duration_seconds, tables_copied, rows_copied
        );

        Ok(MigrationResult {
            run_id,
            status: "completed".to_string(),
            started_at,
            completed_at,
            duration_seconds,
            databases_total: self.config.source.databases.len(),
            databases_skipped: skipped_databases.len(),
            skipped_databases,
            tables_copied,
            tables_failed,
            tables_ignored,
            rows_copied,
            rows_failed,
            fks_installed,
            fks_failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, SourceConfig, TargetConfig};

    fn config() -> Config {
        Config {
            source: SourceConfig {
                host: "mssql.internal".to_string(),
                port: 1433,
                user: "sa".to_string(),
                password: "pw".to_string(),
                databases: vec!["vin".to_string()],
            },
            target: TargetConfig {
                host: "pg.internal".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: "pw".to_string(),
                database: "warehouse".to_string(),
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut bad = config();
        bad.source.host = String::new();
        assert!(Migrator::new(bad).is_err());
        assert!(Migrator::new(config()).is_ok());
    }

    #[test]
    fn test_result_serializes() {
        let now = Utc::now();
        let result = MigrationResult {
            run_id: "run".to_string(),
            status: "completed".to_string(),
            started_at: now,
            completed_at: now,
            duration_seconds: 1.5,
            databases_total: 2,
            databases_skipped: 1,
            skipped_databases: vec!["siscon".to_string()],
            tables_copied: 10,
            tables_failed: 1,
            tables_ignored: 3,
            rows_copied: 1_000_000,
            rows_failed: 2,
            fks_installed: 4,
            fks_failed: 1,
        };
        let json = result.to_json().unwrap();
        assert!(json.contains("\"rows_copied\": 1000000"));
        assert!(json.contains("\"siscon\""));
    }
}
