//! Per-table copy: create the target table, stream rows from the source,
//! batch-insert inside transactions, install the primary key, and report the
//! table's foreign keys for the deferred install phase.

use std::sync::Arc;
use std::time::Duration;

use futures_util::TryStreamExt;
use tiberius::QueryItem;
use tokio_postgres::types::ToSql;
use tracing::{debug, info, warn};

use crate::config::MigrationConfig;
use crate::core::identifier::quote_mssql;
use crate::core::schema::{ForeignKey, Table};
use crate::core::value::coerce;
use crate::error::{MigrateError, Result};
use crate::source::{decode_row, MssqlPool};
use crate::target::{insert_sql, PgPool};

/// Outcome of one table copy.
#[derive(Debug)]
pub struct TableReport {
    /// Table name.
    pub table: String,

    /// Rows successfully inserted.
    pub rows_copied: u64,

    /// Rows whose insert failed and was dropped.
    pub rows_failed: u64,

    /// Foreign keys to install once every table of the database is done.
    pub foreign_keys: Vec<ForeignKey>,
}

/// Copy one source table into the target namespace.
///
/// Guaranteed sequence: introspect columns, open the source cursor (with
/// retries), drop-cascade and recreate the target table, stream rows through
/// the coercer into batched inserts, install the primary key, and collect FK
/// descriptors. A table that cannot be read or created is abandoned with an
/// error; it contributes no rows and no foreign keys.
pub async fn copy_table(
    schema: &str,
    table_name: &str,
    source: Arc<MssqlPool>,
    target: Arc<PgPool>,
    migration: &MigrationConfig,
) -> Result<TableReport> {
    let table = source.describe_table(table_name).await?;
    if table.columns.is_empty() {
        return Err(MigrateError::copy(table_name, "no columns in catalog"));
    }

    let select_sql = build_select_sql(&table);
    let max_retries = migration.get_max_retries();
    let mut last_err: Option<MigrateError> = None;

    for attempt in 1..=max_retries {
        if attempt > 1 {
            // Linear backoff: a failed attempt n waits n * 500 ms before
            // the next try.
            tokio::time::sleep(Duration::from_millis((attempt as u64 - 1) * 500)).await;
        }

        let mut src_client = match source.get_client().await {
            Ok(client) => client,
            Err(e) => {
                debug!("{}: attempt {}/{} could not get connection: {}", table_name, attempt, max_retries, e);
                last_err = Some(e);
                continue;
            }
        };

        let stream = match src_client.simple_query(&select_sql).await {
            Ok(stream) => stream,
            Err(e) => {
                debug!("{}: attempt {}/{} could not open cursor: {}", table_name, attempt, max_retries, e);
                last_err = Some(e.into());
                continue;
            }
        };

        // Cursor is open; failures past this point are not retried.
        let mut report = copy_stream(schema, &table, stream, &target, migration).await?;
        drop(src_client);

        report.foreign_keys = match source.foreign_keys(&table.name).await {
            Ok(fks) => fks,
            Err(e) => {
                warn!("{}: could not load foreign keys: {}", table.name, e);
                Vec::new()
            }
        };
        return Ok(report);
    }

    Err(MigrateError::copy(
        table_name,
        format!(
            "could not open source cursor after {} attempts: {}",
            max_retries,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        ),
    ))
}

/// Drive an open source cursor to completion.
async fn copy_stream(
    schema: &str,
    table: &Table,
    mut stream: tiberius::QueryStream<'_>,
    target: &PgPool,
    migration: &MigrationConfig,
) -> Result<TableReport> {
    let batch_size = migration.get_batch_size() as u64;

    // Drop-with-cascade before create makes reruns idempotent and clears
    // FKs left pointing at this table by an earlier run.
    target.recreate_table(schema, table).await.map_err(|e| {
        MigrateError::copy(&table.name, format!("create table failed: {}", e))
    })?;

    let mut pg_client = target.get_client().await?;
    let stmt = pg_client
        .prepare(&insert_sql(schema, &table.name, table.columns.len()))
        .await?;

    let mut tx = pg_client.transaction().await?;
    if let Err(e) = tx.batch_execute("SET LOCAL synchronous_commit TO OFF").await {
        warn!("{}: could not disable synchronous commit: {}", table.name, e);
    }

    let mut rows_copied: u64 = 0;
    let mut rows_failed: u64 = 0;
    let mut in_batch: u64 = 0;

    while let Some(item) = stream.try_next().await.map_err(|e| {
        MigrateError::copy(&table.name, format!("source stream failed: {}", e))
    })? {
        let QueryItem::Row(row) = item else {
            continue;
        };

        let cells: Vec<_> = decode_row(&row, &table.columns)
            .into_iter()
            .zip(&table.columns)
            .map(|(value, col)| coerce(value, &col.data_type))
            .collect();
        let params: Vec<&(dyn ToSql + Sync)> =
            cells.iter().map(|c| c as &(dyn ToSql + Sync)).collect();

        match tx.execute(&stmt, &params).await {
            Ok(_) => rows_copied += 1,
            Err(e) => {
                // A single bad row must not abort a multi-million-row copy;
                // losses surface in the row-count gap and the log.
                debug!("{}: dropped row: {}", table.name, e);
                rows_failed += 1;
            }
        }

        in_batch += 1;
        if in_batch >= batch_size {
            if let Err(e) = tx.commit().await {
                warn!("{}: batch commit failed: {}", table.name, e);
            }
            tx = pg_client.transaction().await?;
            if let Err(e) = tx.batch_execute("SET LOCAL synchronous_commit TO OFF").await {
                warn!("{}: could not disable synchronous commit: {}", table.name, e);
            }
            in_batch = 0;
        }
    }

    if let Err(e) = tx.commit().await {
        warn!("{}: final commit failed: {}", table.name, e);
    }

    // The table survives without its PK if the constraint cannot be added
    // (duplicate keys after a lossy copy, for instance).
    if let Err(e) = target.install_primary_key(schema, table).await {
        warn!("{}: primary key install failed: {}", table.name, e);
    }

    if rows_copied > 0 {
        info!("[OK] {}: {} rows", table.name, rows_copied);
    }
    if rows_failed > 0 {
        warn!("{}: {} rows dropped on insert", table.name, rows_failed);
    }

    Ok(TableReport {
        table: table.name.clone(),
        rows_copied,
        rows_failed,
        foreign_keys: Vec::new(),
    })
}

/// Build the full-table select with an explicit column list in ordinal
/// order, so stream positions match the target column positions.
fn build_select_sql(table: &Table) -> String {
    let cols = table
        .columns
        .iter()
        .map(|c| quote_mssql(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {} FROM {}", cols, quote_mssql(&table.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Column;

    fn column(name: &str, data_type: &str) -> Column {
        Column {
            name: name.to_string(),
            data_type: data_type.to_string(),
            precision: 0,
            scale: 0,
            is_nullable: true,
            ordinal_pos: 0,
        }
    }

    #[test]
    fn test_build_select_sql() {
        let table = Table {
            name: "orders".to_string(),
            columns: vec![column("id", "int"), column("cliente", "nvarchar")],
            primary_key: vec!["id".to_string()],
        };
        assert_eq!(
            build_select_sql(&table),
            "SELECT [id], [cliente] FROM [orders]"
        );
    }

    #[test]
    fn test_build_select_sql_escapes_brackets() {
        let table = Table {
            name: "odd]name".to_string(),
            columns: vec![column("col", "int")],
            primary_key: Vec::new(),
        };
        assert_eq!(build_select_sql(&table), "SELECT [col] FROM [odd]]name]");
    }
}
