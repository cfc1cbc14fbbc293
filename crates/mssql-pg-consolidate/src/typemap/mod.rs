//! Type mapping from MSSQL column types to PostgreSQL declarations.

/// Map an MSSQL data type (plus numeric precision/scale) to the PostgreSQL
/// type used when creating the target column.
///
/// Width is deliberately dropped for character types: PostgreSQL `text`
/// costs nothing over `varchar(n)` and removes any truncation risk during
/// coercion. Nullability and defaults are not transferred either; defaults
/// live in source application code and NULLs are preserved value by value.
pub fn postgres_type(mssql_type: &str, precision: i32, scale: i32) -> String {
    match mssql_type.to_uppercase().as_str() {
        // Integers
        "TINYINT" | "SMALLINT" => "SMALLINT".to_string(),
        "INT" | "INTEGER" => "INTEGER".to_string(),
        "BIGINT" => "BIGINT".to_string(),

        // Boolean
        "BIT" => "BOOLEAN".to_string(),

        // Floating point
        "REAL" => "REAL".to_string(),
        "FLOAT" => "DOUBLE PRECISION".to_string(),

        // Exact numerics
        "DECIMAL" | "NUMERIC" | "MONEY" | "SMALLMONEY" => {
            if precision > 0 {
                format!("NUMERIC({},{})", precision, scale)
            } else {
                "NUMERIC".to_string()
            }
        }

        // Date/time
        "DATE" => "DATE".to_string(),
        "DATETIME" | "DATETIME2" | "SMALLDATETIME" => "TIMESTAMP".to_string(),
        "TIME" => "TIME".to_string(),

        // Character data, width dropped
        "CHAR" | "NCHAR" | "VARCHAR" | "NVARCHAR" | "TEXT" | "NTEXT" | "SYSNAME" => {
            "TEXT".to_string()
        }

        // Binary data; "timestamp"/"rowversion" is the row version type,
        // eight opaque bytes rather than a point in time.
        "BINARY" | "VARBINARY" | "IMAGE" | "TIMESTAMP" | "TIMESTAMP_SQL" | "ROWVERSION" => {
            "BYTEA".to_string()
        }

        // GUID
        "UNIQUEIDENTIFIER" => "UUID".to_string(),

        // Everything else (xml, sql_variant, spatial, ...) round-trips as text
        _ => "TEXT".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_types() {
        assert_eq!(postgres_type("tinyint", 0, 0), "SMALLINT");
        assert_eq!(postgres_type("smallint", 0, 0), "SMALLINT");
        assert_eq!(postgres_type("int", 0, 0), "INTEGER");
        assert_eq!(postgres_type("INTEGER", 0, 0), "INTEGER");
        assert_eq!(postgres_type("bigint", 0, 0), "BIGINT");
    }

    #[test]
    fn test_bit_and_floats() {
        assert_eq!(postgres_type("bit", 0, 0), "BOOLEAN");
        assert_eq!(postgres_type("real", 0, 0), "REAL");
        assert_eq!(postgres_type("float", 0, 0), "DOUBLE PRECISION");
    }

    #[test]
    fn test_numeric_with_precision() {
        assert_eq!(postgres_type("decimal", 18, 4), "NUMERIC(18,4)");
        assert_eq!(postgres_type("numeric", 10, 2), "NUMERIC(10,2)");
        assert_eq!(postgres_type("money", 19, 4), "NUMERIC(19,4)");
    }

    #[test]
    fn test_numeric_without_precision() {
        assert_eq!(postgres_type("numeric", 0, 0), "NUMERIC");
        assert_eq!(postgres_type("smallmoney", 0, 0), "NUMERIC");
    }

    #[test]
    fn test_temporal_types() {
        assert_eq!(postgres_type("date", 0, 0), "DATE");
        assert_eq!(postgres_type("datetime", 0, 0), "TIMESTAMP");
        assert_eq!(postgres_type("datetime2", 0, 0), "TIMESTAMP");
        assert_eq!(postgres_type("smalldatetime", 0, 0), "TIMESTAMP");
        assert_eq!(postgres_type("time", 0, 0), "TIME");
    }

    #[test]
    fn test_character_types_drop_width() {
        for ty in ["char", "nchar", "varchar", "nvarchar", "text", "ntext", "sysname"] {
            assert_eq!(postgres_type(ty, 0, 0), "TEXT", "type {}", ty);
        }
    }

    #[test]
    fn test_binary_types() {
        for ty in ["binary", "varbinary", "image", "timestamp", "rowversion"] {
            assert_eq!(postgres_type(ty, 0, 0), "BYTEA", "type {}", ty);
        }
    }

    #[test]
    fn test_uniqueidentifier() {
        assert_eq!(postgres_type("uniqueidentifier", 0, 0), "UUID");
    }

    #[test]
    fn test_unknown_falls_back_to_text() {
        assert_eq!(postgres_type("xml", 0, 0), "TEXT");
        assert_eq!(postgres_type("sql_variant", 0, 0), "TEXT");
        assert_eq!(postgres_type("geography", 0, 0), "TEXT");
    }
}
