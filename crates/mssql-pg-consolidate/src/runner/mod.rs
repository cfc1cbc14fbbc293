//! Per-database run: connect both ends, fan tables out to a fixed worker
//! pool, then install the collected foreign keys once every copy is done.
//!
//! The two-phase shape (rows first, constraints last) is what lets tables
//! load in any order: no FK exists while data is flowing, so inter-table
//! dependencies never block a worker.

use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::copier::copy_table;
use crate::core::schema::ForeignKey;
use crate::error::{MigrateError, Result};
use crate::filter::is_ignored_table;
use crate::source::MssqlPool;
use crate::target::PgPool;

/// Tally for one processed source database.
#[derive(Debug, Default)]
pub struct DatabaseReport {
    /// Source database / target namespace name.
    pub database: String,

    /// True when the database was skipped (source unreachable, catalog
    /// query failed).
    pub skipped: bool,

    /// Tables copied to completion.
    pub tables_copied: usize,

    /// Tables abandoned after retries or DDL failure.
    pub tables_failed: usize,

    /// Tables excluded by the ignore policy.
    pub tables_ignored: usize,

    /// Rows inserted across all tables.
    pub rows_copied: u64,

    /// Rows dropped by per-row insert failures.
    pub rows_failed: u64,

    /// Foreign keys installed.
    pub fks_installed: usize,

    /// Foreign keys that failed to install (referenced table missing, etc.)
    pub fks_failed: usize,
}

impl DatabaseReport {
    fn skipped(database: &str) -> Self {
        Self {
            database: database.to_string(),
            skipped: true,
            ..Default::default()
        }
    }
}

/// Per-worker accumulation, merged into the database report after the pool
/// drains.
#[derive(Debug, Default)]
struct WorkerTally {
    tables_copied: usize,
    tables_failed: usize,
    rows_copied: u64,
    rows_failed: u64,
}

/// Process one source database end to end.
///
/// Only a target connection failure is returned as an error (it is fatal
/// for the run); source-side failures log and mark the database skipped so
/// the next one can proceed.
pub async fn process_database(db_name: &str, config: &Config) -> Result<DatabaseReport> {
    info!("--- starting database: {} ---", db_name);

    let pool_size = config.migration.pool_size();
    let target = Arc::new(PgPool::connect(&config.target, pool_size).await?);

    if let Err(e) = target.create_schema(db_name).await {
        warn!("{}: could not create target schema: {}", db_name, e);
    }

    let source = match MssqlPool::connect(&config.source, db_name, pool_size as u32).await {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            error!("{}: source connection failed, skipping database: {}", db_name, e);
            return Ok(DatabaseReport::skipped(db_name));
        }
    };

    let all_tables = match source.list_tables().await {
        Ok(tables) => tables,
        Err(e) => {
            error!("{}: table listing failed, skipping database: {}", db_name, e);
            return Ok(DatabaseReport::skipped(db_name));
        }
    };

    let mut report = DatabaseReport {
        database: db_name.to_string(),
        ..Default::default()
    };

    let tables: Vec<String> = all_tables
        .into_iter()
        .filter(|t| {
            if is_ignored_table(t) {
                debug!("{}: ignoring table {}", db_name, t);
                report.tables_ignored += 1;
                false
            } else {
                true
            }
        })
        .collect();

    info!(
        "{}: found {} tables ({} ignored), starting bulk load",
        db_name,
        tables.len(),
        report.tables_ignored
    );

    let foreign_keys = run_worker_pool(db_name, &tables, &source, &target, config, &mut report).await?;

    info!("{}: applying {} foreign keys", db_name, foreign_keys.len());
    for fk in &foreign_keys {
        match target.install_foreign_key(db_name, fk).await {
            Ok(()) => report.fks_installed += 1,
            Err(e) => {
                // Typically the referenced table was itself skipped or
                // abandoned; the remaining constraints still go in.
                warn!(
                    "{}: foreign key {} failed: {}",
                    db_name,
                    fk.constraint_name(),
                    e
                );
                report.fks_failed += 1;
            }
        }
    }

    info!(
        "{}: done ({} tables, {} rows, {} FKs)",
        db_name, report.tables_copied, report.rows_copied, report.fks_installed
    );
    Ok(report)
}

/// Fan the table list out to a fixed pool of copier workers and collect the
/// foreign keys they emit.
///
/// Both channels are sized to the table count, so enqueueing never blocks
/// and FK emission never backpressures a worker. Workers exit when the job
/// queue drains; the collector closes when the last worker drops its sender.
async fn run_worker_pool(
    db_name: &str,
    tables: &[String],
    source: &Arc<MssqlPool>,
    target: &Arc<PgPool>,
    config: &Config,
    report: &mut DatabaseReport,
) -> Result<Vec<ForeignKey>> {
    let capacity = tables.len().max(1);
    let (jobs_tx, jobs_rx) = async_channel::bounded::<String>(capacity);
    let (fk_tx, mut fk_rx) = mpsc::channel::<Vec<ForeignKey>>(capacity);

    let workers = config.migration.get_workers();
    let mut handles = Vec::with_capacity(workers);

    for worker_id in 0..workers {
        let jobs_rx = jobs_rx.clone();
        let fk_tx = fk_tx.clone();
        let source = Arc::clone(source);
        let target = Arc::clone(target);
        let schema = db_name.to_string();
        let migration = config.migration.clone();

        handles.push(tokio::spawn(async move {
            let mut tally = WorkerTally::default();

            while let Ok(table) = jobs_rx.recv().await {
                match copy_table(&schema, &table, Arc::clone(&source), Arc::clone(&target), &migration)
                    .await
                {
                    Ok(outcome) => {
                        tally.tables_copied += 1;
                        tally.rows_copied += outcome.rows_copied;
                        tally.rows_failed += outcome.rows_failed;
                        if !outcome.foreign_keys.is_empty()
                            && fk_tx.send(outcome.foreign_keys).await.is_err()
                        {
                            debug!("worker {}: FK collector closed early", worker_id);
                        }
                    }
                    Err(e) => {
                        error!("{}: table abandoned: {}", table, e);
                        tally.tables_failed += 1;
                    }
                }
            }

            tally
        }));
    }

    // Our clones must go so the channels close once the workers finish.
    drop(jobs_rx);
    drop(fk_tx);

    for table in tables {
        if jobs_tx.send(table.clone()).await.is_err() {
            break;
        }
    }
    jobs_tx.close();

    let tallies = try_join_all(handles)
        .await
        .map_err(|e| MigrateError::pool(e, "worker pool panicked"))?;

    for tally in tallies {
        report.tables_copied += tally.tables_copied;
        report.tables_failed += tally.tables_failed;
        report.rows_copied += tally.rows_copied;
        report.rows_failed += tally.rows_failed;
    }

    let mut foreign_keys = Vec::new();
    while let Some(fks) = fk_rx.recv().await {
        foreign_keys.extend(fks);
    }

    Ok(foreign_keys)
}
