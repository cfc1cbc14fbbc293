//! Configuration loading and validation.
//!
//! All settings come from the environment (the migrator runs as a one-shot
//! job under an orchestrator that injects them). `MSSQL_HOST`, `PG_HOST` and
//! `MSSQL_PASS` are mandatory; everything else has a default.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| get(key).unwrap_or_default();

        let port = |key: &str, fallback: u16| -> Result<u16> {
            match get(key) {
                None => Ok(fallback),
                Some(raw) => raw.parse().map_err(|_| {
                    MigrateError::Config(format!("{} is not a valid port: {:?}", key, raw))
                }),
            }
        };

        let databases: Vec<String> = var("MSSQL_DBS")
            .split(',')
            .map(|db| db.trim().to_string())
            .filter(|db| !db.is_empty())
            .collect();

        let config = Config {
            source: SourceConfig {
                host: var("MSSQL_HOST"),
                port: port("MSSQL_PORT", 1433)?,
                user: var("MSSQL_USER"),
                password: var("MSSQL_PASS"),
                databases,
            },
            target: TargetConfig {
                host: var("PG_HOST"),
                port: port("PG_PORT", 5432)?,
                user: var("PG_USER"),
                password: var("PG_PASS"),
                database: var("PG_DB"),
            },
            migration: MigrationConfig::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}
