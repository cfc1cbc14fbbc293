//! # mssql-pg-consolidate
//!
//! Parallel, schema-preserving bulk consolidation of a set of MSSQL
//! databases into a single PostgreSQL database, one target schema per
//! source database.
//!
//! The run works in two phases per source database: tables and rows stream
//! in first across a fixed worker pool, then every collected foreign key is
//! installed once all copies are done, so inter-table ordering never blocks
//! loading. Reruns are idempotent because each table is dropped with
//! cascade before it is recreated.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_pg_consolidate::{Config, Migrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let result = Migrator::new(config)?.run().await?;
//!     println!("Copied {} rows", result.rows_copied);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod copier;
pub mod core;
pub mod error;
pub mod filter;
pub mod orchestrator;
pub mod runner;
pub mod source;
pub mod target;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use crate::core::{coerce, CellValue, Column, ForeignKey, Table};
pub use error::{MigrateError, Result};
pub use orchestrator::{MigrationResult, Migrator};
pub use runner::DatabaseReport;
pub use source::MssqlPool;
pub use target::PgPool;
pub use typemap::postgres_type;
