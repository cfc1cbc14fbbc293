//! PostgreSQL target access: pooled connections, namespace and table DDL,
//! and session tuning for bulk load.
//!
//! Uses deadpool-postgres over tokio-postgres. The extended query protocol
//! carries parameters in binary form, which keeps LOB and text payloads off
//! the escaping path entirely.

use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::{info, warn};

use crate::config::TargetConfig;
use crate::core::identifier::{qualify_pg, quote_pg};
use crate::core::schema::{ForeignKey, Table};
use crate::error::{MigrateError, Result};
use crate::typemap::postgres_type;

/// Connection timeout for the target pool.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Session settings applied to every checked-out connection. Synchronous
/// commit is traded away for throughput (the target is rebuilt from scratch
/// on every run anyway), and statement/lock timeouts are lifted because bulk
/// loads legitimately hold write locks for a long time.
const SESSION_TUNING: &str = "SET synchronous_commit TO OFF; \
     SET statement_timeout TO 0; \
     SET lock_timeout TO 0";

/// Pooled connections to the target database.
pub struct PgPool {
    pool: Pool,
}

impl PgPool {
    /// Connect to the target database with the given pool cap.
    pub async fn connect(config: &TargetConfig, max_size: usize) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        // sslmode=disable: the target sits next to the migrator and the
        // bulk stream would pay dearly for TLS framing.
        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(max_size)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?;

        // Fail fast before any per-database work starts.
        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "connecting to PostgreSQL target"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { pool })
    }

    /// Check out a connection with bulk-load session tuning applied.
    ///
    /// Tuning failures are non-fatal: the copy still works, just slower.
    pub async fn get_client(&self) -> Result<Object> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting PostgreSQL connection from pool"))?;

        if let Err(e) = client.batch_execute(SESSION_TUNING).await {
            warn!("Could not tune target session for bulk load: {}", e);
        }

        Ok(client)
    }

    /// Create the target namespace for a source database if absent.
    pub async fn create_schema(&self, schema: &str) -> Result<()> {
        let client = self.get_client().await?;
        client
            .batch_execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_pg(schema)))
            .await?;
        Ok(())
    }

    /// Drop-with-cascade then recreate a target table.
    ///
    /// The cascade also removes any FK pointing at this table from an
    /// earlier run; those are reinstalled in the FK phase. This is what
    /// makes reruns idempotent.
    pub async fn recreate_table(&self, schema: &str, table: &Table) -> Result<()> {
        let client = self.get_client().await?;
        client
            .batch_execute(&format!(
                "DROP TABLE IF EXISTS {} CASCADE",
                qualify_pg(schema, &table.name)
            ))
            .await?;
        client.batch_execute(&create_table_sql(schema, table)).await?;
        Ok(())
    }

    /// Install the primary key constraint for a copied table, if it has one.
    pub async fn install_primary_key(&self, schema: &str, table: &Table) -> Result<()> {
        let Some(sql) = table.pk_install_sql(schema) else {
            return Ok(());
        };
        let client = self.get_client().await?;
        client.batch_execute(&sql).await?;
        Ok(())
    }

    /// Install one foreign key constraint.
    pub async fn install_foreign_key(&self, schema: &str, fk: &ForeignKey) -> Result<()> {
        let client = self.get_client().await?;
        client.batch_execute(&fk.install_sql(schema)).await?;
        Ok(())
    }
}

/// Build the CREATE TABLE statement for the target.
///
/// Column order follows the source ordinal order, so positional inserts
/// line up. Nullability and defaults are intentionally not carried over.
pub fn create_table_sql(schema: &str, table: &Table) -> String {
    let col_defs: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            format!(
                "{} {}",
                quote_pg(&c.name),
                postgres_type(&c.data_type, c.precision, c.scale)
            )
        })
        .collect();

    format!(
        "CREATE TABLE {} ({})",
        qualify_pg(schema, &table.name),
        col_defs.join(", ")
    )
}

/// Build the positional parameterized insert for a table.
pub fn insert_sql(schema: &str, table_name: &str, column_count: usize) -> String {
    let placeholders: Vec<String> = (1..=column_count).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO {} VALUES ({})",
        qualify_pg(schema, table_name),
        placeholders.join(",")
    )
}
