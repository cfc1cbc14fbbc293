//! Error types for the consolidation library.

use thiserror::Error;

/// Main error type for consolidation operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (missing environment variable, bad value, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] tiberius::error::Error),

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Catalog introspection failed for a source database
    #[error("Catalog query failed for {database}: {message}")]
    Catalog { database: String, message: String },

    /// Copy failed for a specific table
    #[error("Copy failed for table {table}: {message}")]
    Copy { table: String, message: String },

    /// JSON serialization error (run result reporting)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Catalog error
    pub fn catalog(database: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Catalog {
            database: database.into(),
            message: message.to_string(),
        }
    }

    /// Create a Copy error
    pub fn copy(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Copy {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this error.
    ///
    /// Configuration failures exit with 2 so wrappers can distinguish
    /// operator mistakes from runtime connectivity failures (1).
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) => 2,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for consolidation operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("missing MSSQL_HOST".into()).exit_code(), 2);
        assert_eq!(MigrateError::copy("orders", "stream dropped").exit_code(), 1);
        assert_eq!(MigrateError::pool("timed out", "target pool").exit_code(), 1);
    }

    #[test]
    fn test_copy_error_display() {
        let err = MigrateError::copy("facturas", "create table failed");
        assert_eq!(
            err.to_string(),
            "Copy failed for table facturas: create table failed"
        );
    }
}
