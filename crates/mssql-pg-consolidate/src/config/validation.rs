//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
///
/// The three values that have no sane default (source host, target host,
/// source password) are checked first and fail the run before any I/O.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.host.is_empty() {
        return Err(MigrateError::Config("MSSQL_HOST is required".into()));
    }
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("PG_HOST is required".into()));
    }
    if config.source.password.is_empty() {
        return Err(MigrateError::Config("MSSQL_PASS is required".into()));
    }

    if config.source.databases.is_empty() {
        return Err(MigrateError::Config(
            "MSSQL_DBS must name at least one source database".into(),
        ));
    }
    if config
        .source
        .databases
        .iter()
        .any(|db| db.trim().is_empty())
    {
        return Err(MigrateError::Config(
            "MSSQL_DBS contains an empty database name".into(),
        ));
    }

    if let Some(0) = config.migration.workers {
        return Err(MigrateError::Config(
            "migration workers must be at least 1".into(),
        ));
    }
    if let Some(0) = config.migration.batch_size {
        return Err(MigrateError::Config(
            "migration batch_size must be at least 1".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, SourceConfig, TargetConfig};

    fn valid_config() -> Config {
        Config {
            source: SourceConfig {
                host: "mssql.internal".to_string(),
                port: 1433,
                user: "sa".to_string(),
                password: "password".to_string(),
                databases: vec!["vin".to_string(), "declaracion".to_string()],
            },
            target: TargetConfig {
                host: "pg.internal".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: "password".to_string(),
                database: "warehouse".to_string(),
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source.host = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_host() {
        let mut config = valid_config();
        config.target.host = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_source_password() {
        let mut config = valid_config();
        config.source.password = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_database_list() {
        let mut config = valid_config();
        config.source.databases.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_blank_database_name() {
        let mut config = valid_config();
        config.source.databases.push("  ".to_string());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = valid_config();
        config.migration.workers = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_source_config_debug_redacts_password() {
        let mut config = valid_config();
        config.source.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.source);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_123"));
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_456"));
    }
}
