//! mssql-pg-consolidate CLI - bulk consolidation of MSSQL databases into
//! PostgreSQL schemas.
//!
//! All connection settings come from the environment (see `Config`); the
//! flags here only shape logging and output.

use clap::Parser;
use mssql_pg_consolidate::{Config, MigrateError, Migrator};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mssql-pg-consolidate")]
#[command(about = "Consolidate MSSQL databases into PostgreSQL schemas")]
#[command(version)]
struct Cli {
    /// Log verbosity: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Print the run result as JSON to stdout
    #[arg(long)]
    output_json: bool,

    /// Override the source database list (comma-separated)
    #[arg(long, value_delimiter = ',')]
    databases: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(MigrateError::Config)?;

    let mut config = Config::from_env()?;
    if let Some(databases) = cli.databases {
        config.source.databases = databases;
        config.validate()?;
    }
    info!(
        "Loaded configuration from environment ({} source databases)",
        config.source.databases.len()
    );

    let result = Migrator::new(config)?.run().await?;

    if cli.output_json {
        println!("{}", result.to_json()?);
    } else {
        println!("\nConsolidation completed!");
        println!("  Run ID: {}", result.run_id);
        println!("  Duration: {:.2}s", result.duration_seconds);
        println!(
            "  Databases: {}/{}",
            result.databases_total - result.databases_skipped,
            result.databases_total
        );
        println!(
            "  Tables: {} copied, {} failed, {} ignored",
            result.tables_copied, result.tables_failed, result.tables_ignored
        );
        println!("  Rows: {}", result.rows_copied);
        if result.rows_failed > 0 {
            println!("  Rows dropped: {}", result.rows_failed);
        }
        println!(
            "  Foreign keys: {} installed, {} failed",
            result.fks_installed, result.fks_failed
        );
        if !result.skipped_databases.is_empty() {
            println!("  Skipped databases: {:?}", result.skipped_databases);
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let filter = EnvFilter::try_new(verbosity)
        .map_err(|e| format!("invalid verbosity {:?}: {}", verbosity, e))?;

    match format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        "text" => tracing_subscriber::fmt().with_env_filter(filter).init(),
        other => return Err(format!("invalid log format {:?} (text or json)", other)),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_databases_flag_splits_on_comma() {
        let cli = Cli::parse_from(["mssql-pg-consolidate", "--databases", "vin,siscon"]);
        assert_eq!(
            cli.databases,
            Some(vec!["vin".to_string(), "siscon".to_string()])
        );
    }
}
