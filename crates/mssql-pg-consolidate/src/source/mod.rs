//! MSSQL source access: pooled connections, catalog introspection, and row
//! decoding.
//!
//! Uses Tiberius with bb8 connection pooling. One [`MssqlPool`] is opened per
//! source database; table copiers check out a connection each and hold it for
//! the duration of their streaming read.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SourceConfig;
use crate::core::identifier::sanitize_column;
use crate::core::schema::{Column, ForeignKey, Table};
use crate::core::value::CellValue;
use crate::error::{MigrateError, Result};

/// Connection acquisition timeout from pool.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// TCP keepalive interval; long streaming reads must survive idle firewalls.
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Pooled Tiberius client type.
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    config: SourceConfig,
    database: String,
}

impl TiberiusConnectionManager {
    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        config.database(&self.database);
        config.authentication(AuthMethod::sql_server(
            &self.config.user,
            &self.config.password,
        ));
        // Transport encryption stays off; these servers sit on a private
        // segment and several are too old to negotiate TLS 1.2.
        config.encryption(EncryptionLevel::NotSupported);
        config
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = MssqlClient;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;
        tcp.set_nodelay(true).ok();

        match tcp.into_std() {
            Ok(std_tcp) => {
                let socket = socket2::Socket::from(std_tcp);
                let keepalive = socket2::TcpKeepalive::new()
                    .with_time(TCP_KEEPALIVE_INTERVAL)
                    .with_interval(TCP_KEEPALIVE_INTERVAL);
                if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
                    warn!("Failed to set TCP keepalive on MSSQL connection: {}", e);
                }
                let std_tcp: std::net::TcpStream = socket.into();
                std_tcp.set_nonblocking(true).ok();
                let tcp = TcpStream::from_std(std_tcp).map_err(|e| {
                    tiberius::error::Error::Io {
                        kind: e.kind(),
                        message: format!("Failed to convert socket: {}", e),
                    }
                })?;
                Client::connect(config, tcp.compat_write()).await
            }
            Err(e) => {
                warn!("Failed to configure TCP keepalive on MSSQL connection: {}", e);
                let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
                    tiberius::error::Error::Io {
                        kind: e.kind(),
                        message: e.to_string(),
                    }
                })?;
                tcp.set_nodelay(true).ok();
                Client::connect(config, tcp.compat_write()).await
            }
        }
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Pooled connections to one MSSQL catalog.
pub struct MssqlPool {
    pool: Pool<TiberiusConnectionManager>,
    database: String,
}

impl MssqlPool {
    /// Connect to one source database with the given pool cap.
    pub async fn connect(config: &SourceConfig, database: &str, max_size: u32) -> Result<Self> {
        let manager = TiberiusConnectionManager {
            config: config.clone(),
            database: database.to_string(),
        };
        let pool = Pool::builder()
            .max_size(max_size)
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .build(manager)
            .await
            .map_err(|e| MigrateError::pool(e, format!("creating MSSQL pool for {}", database)))?;

        // Fail fast on bad credentials or an unreachable server.
        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| MigrateError::pool(e, format!("connecting to MSSQL {}", database)))?;
            conn.simple_query("SELECT 1").await?.into_row().await?;
        }

        info!(
            "Connected to MSSQL: {}:{}/{} (pool_size={})",
            config.host, config.port, database, max_size
        );

        Ok(Self {
            pool,
            database: database.to_string(),
        })
    }

    /// Source database name this pool is bound to.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Get a pooled connection; copiers hold one for their whole read.
    pub async fn get_client(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting MSSQL connection from pool"))
    }

    /// List base table names from the catalog, trimmed of padding.
    ///
    /// Filtering by the ignore policy is left to the caller so skipped
    /// tables can be logged alongside kept ones.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let mut client = self.get_client().await?;

        let stream = client
            .simple_query(
                "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME",
            )
            .await
            .map_err(|e| MigrateError::catalog(self.database.as_str(), e))?;
        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| MigrateError::catalog(self.database.as_str(), e))?;

        let tables = rows
            .iter()
            .filter_map(|row| row.get::<&str, _>(0))
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        Ok(tables)
    }

    /// Load full table metadata: columns in ordinal order plus the primary
    /// key column list.
    pub async fn describe_table(&self, table_name: &str) -> Result<Table> {
        let mut table = Table {
            name: table_name.trim().to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        };
        let mut client = self.get_client().await?;

        self.load_columns(&mut client, &mut table).await?;
        self.load_primary_key(&mut client, &mut table).await?;

        Ok(table)
    }

    async fn load_columns(&self, client: &mut MssqlClient, table: &mut Table) -> Result<()> {
        let query = r#"
            SELECT
                COLUMN_NAME,
                DATA_TYPE,
                CAST(ISNULL(NUMERIC_PRECISION, 0) AS INT),
                CAST(ISNULL(NUMERIC_SCALE, 0) AS INT),
                CASE WHEN IS_NULLABLE = 'YES' THEN 1 ELSE 0 END,
                ORDINAL_POSITION
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_NAME = @P1
            ORDER BY ORDINAL_POSITION
        "#;

        let mut query = Query::new(query);
        query.bind(&table.name);

        let stream = query.query(client).await?;
        let rows = stream.into_first_result().await?;

        for row in rows {
            let col = Column {
                name: sanitize_column(row.get::<&str, _>(0).unwrap_or_default()),
                data_type: row.get::<&str, _>(1).unwrap_or_default().to_string(),
                precision: row.get::<i32, _>(2).unwrap_or(0),
                scale: row.get::<i32, _>(3).unwrap_or(0),
                is_nullable: row.get::<i32, _>(4).unwrap_or(0) == 1,
                ordinal_pos: row.get::<i32, _>(5).unwrap_or(0),
            };
            table.columns.push(col);
        }

        debug!("Loaded {} columns for {}", table.columns.len(), table.name);
        Ok(())
    }

    async fn load_primary_key(&self, client: &mut MssqlClient, table: &mut Table) -> Result<()> {
        let query = r#"
            SELECT c.name
            FROM sys.indexes i
            INNER JOIN sys.index_columns ic
                ON i.object_id = ic.object_id AND i.index_id = ic.index_id
            INNER JOIN sys.columns c
                ON ic.object_id = c.object_id AND c.column_id = ic.column_id
            INNER JOIN sys.objects o
                ON i.object_id = o.object_id
            WHERE i.is_primary_key = 1 AND o.name = @P1
            ORDER BY ic.key_ordinal
        "#;

        let mut query = Query::new(query);
        query.bind(&table.name);

        let stream = query.query(client).await?;
        let rows = stream.into_first_result().await?;

        for row in rows {
            if let Some(col) = row.get::<&str, _>(0) {
                table.primary_key.push(col.to_string());
            }
        }

        debug!("Primary key for {}: {:?}", table.name, table.primary_key);
        Ok(())
    }

    /// Load the foreign keys originating from a table, one descriptor per
    /// constrained column pair.
    pub async fn foreign_keys(&self, table_name: &str) -> Result<Vec<ForeignKey>> {
        let query = r#"
            SELECT obj.name, col1.name, tab2.name, col2.name
            FROM sys.foreign_key_columns fkc
            INNER JOIN sys.objects obj ON obj.object_id = fkc.constraint_object_id
            INNER JOIN sys.tables tab1 ON tab1.object_id = fkc.parent_object_id
            INNER JOIN sys.columns col1
                ON col1.column_id = fkc.parent_column_id AND col1.object_id = tab1.object_id
            INNER JOIN sys.tables tab2 ON tab2.object_id = fkc.referenced_object_id
            INNER JOIN sys.columns col2
                ON col2.column_id = fkc.referenced_column_id AND col2.object_id = tab2.object_id
            WHERE tab1.name = @P1
        "#;

        let mut client = self.get_client().await?;
        let mut query = Query::new(query);
        query.bind(table_name);

        let stream = query.query(&mut *client).await?;
        let rows = stream.into_first_result().await?;

        let mut fks = Vec::new();
        for row in rows {
            // The source constraint name (column 0) is read but unused; the
            // target constraint name is derived deterministically instead.
            let (Some(column), Some(ref_table), Some(ref_column)) = (
                row.get::<&str, _>(1),
                row.get::<&str, _>(2),
                row.get::<&str, _>(3),
            ) else {
                continue;
            };
            fks.push(ForeignKey {
                table: table_name.to_string(),
                column: column.to_string(),
                ref_table: ref_table.to_string(),
                ref_column: ref_column.to_string(),
            });
        }

        debug!("Loaded {} foreign keys for {}", fks.len(), table_name);
        Ok(fks)
    }
}

/// Decode one Tiberius row into cells, dispatching on the catalog type name.
///
/// NULLs and convert failures both land as [`CellValue::Null`]; convert
/// failures on non-null cells are edge cases the per-row insert error policy
/// already covers.
pub fn decode_row(row: &Row, columns: &[Column]) -> Vec<CellValue> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, col)| decode_cell(row, idx, &col.data_type))
        .collect()
}

fn decode_cell(row: &Row, idx: usize, data_type: &str) -> CellValue {
    match data_type.to_lowercase().as_str() {
        "bit" => row
            .try_get::<bool, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::Bool)
            .unwrap_or(CellValue::Null),
        "tinyint" => row
            .try_get::<u8, _>(idx)
            .ok()
            .flatten()
            .map(|v| CellValue::I16(v as i16))
            .unwrap_or(CellValue::Null),
        "smallint" => row
            .try_get::<i16, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::I16)
            .unwrap_or(CellValue::Null),
        "int" => row
            .try_get::<i32, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::I32)
            .unwrap_or(CellValue::Null),
        "bigint" => row
            .try_get::<i64, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::I64)
            .unwrap_or(CellValue::Null),
        "real" => row
            .try_get::<f32, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::F32)
            .unwrap_or(CellValue::Null),
        "float" => row
            .try_get::<f64, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::F64)
            .unwrap_or(CellValue::Null),
        "decimal" | "numeric" | "money" | "smallmoney" => row
            .try_get::<Decimal, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::Decimal)
            .or_else(|| {
                // money arrives as a float on some server versions
                row.try_get::<f64, _>(idx).ok().flatten().map(|f| {
                    Decimal::try_from(f)
                        .map(CellValue::Decimal)
                        .unwrap_or(CellValue::F64(f))
                })
            })
            .unwrap_or(CellValue::Null),
        "date" => row
            .try_get::<NaiveDate, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::Date)
            .or_else(|| {
                row.try_get::<NaiveDateTime, _>(idx)
                    .ok()
                    .flatten()
                    .map(|dt| CellValue::Date(dt.date()))
            })
            .unwrap_or(CellValue::Null),
        "time" => row
            .try_get::<NaiveTime, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::Time)
            .or_else(|| {
                row.try_get::<NaiveDateTime, _>(idx)
                    .ok()
                    .flatten()
                    .map(|dt| CellValue::Time(dt.time()))
            })
            .unwrap_or(CellValue::Null),
        "datetime" | "datetime2" | "smalldatetime" => row
            .try_get::<NaiveDateTime, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Null),
        "uniqueidentifier" => row
            .try_get::<Uuid, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::Uuid)
            .unwrap_or(CellValue::Null),
        "binary" | "varbinary" | "image" | "timestamp" | "rowversion" => row
            .try_get::<&[u8], _>(idx)
            .ok()
            .flatten()
            .map(|v| CellValue::Bytes(v.to_vec()))
            .unwrap_or(CellValue::Null),
        _ => row
            .try_get::<&str, _>(idx)
            .ok()
            .flatten()
            .map(|s| CellValue::Text(s.to_string()))
            .or_else(|| {
                row.try_get::<&[u8], _>(idx)
                    .ok()
                    .flatten()
                    .map(|v| CellValue::Bytes(v.to_vec()))
            })
            .unwrap_or(CellValue::Null),
    }
}
