//! Identifier quoting and sanitization for the two SQL dialects.
//!
//! Identifiers cannot be bound as statement parameters, so every dynamic
//! table, schema, or column name that lands in SQL text goes through these
//! helpers. Source catalogs on old servers return padded names and the odd
//! embedded quote; the sanitizers normalize those before quoting.

/// PostgreSQL truncates identifiers beyond this many bytes.
pub const PG_MAX_IDENTIFIER_BYTES: usize = 63;

/// Quote a PostgreSQL identifier, doubling embedded double quotes.
pub fn quote_pg(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a SQL Server identifier using brackets, doubling closing brackets.
pub fn quote_mssql(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Qualify a PostgreSQL table name with its schema.
pub fn qualify_pg(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_pg(schema), quote_pg(table))
}

/// Normalize a column name from the source catalog: strip embedded double
/// quotes and surrounding whitespace.
pub fn sanitize_column(name: &str) -> String {
    name.replace('"', "").trim().to_string()
}

/// Truncate a generated constraint name to the PostgreSQL identifier limit.
///
/// Truncation is byte-oriented but never splits a UTF-8 character. Two long
/// names sharing a 63-byte prefix will collide; accepted for now since the
/// constraint names are derived from already-limited source identifiers.
pub fn truncate_ident(name: &str) -> String {
    if name.len() <= PG_MAX_IDENTIFIER_BYTES {
        return name.to_string();
    }
    let mut end = PG_MAX_IDENTIFIER_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_pg() {
        assert_eq!(quote_pg("users"), "\"users\"");
        assert_eq!(quote_pg("table\"name"), "\"table\"\"name\"");
    }

    #[test]
    fn test_quote_mssql() {
        assert_eq!(quote_mssql("users"), "[users]");
        assert_eq!(quote_mssql("table]name"), "[table]]name]");
    }

    #[test]
    fn test_qualify_pg() {
        assert_eq!(qualify_pg("vin", "orders"), "\"vin\".\"orders\"");
    }

    #[test]
    fn test_sanitize_column() {
        assert_eq!(sanitize_column("  codigo  "), "codigo");
        assert_eq!(sanitize_column("\"quoted\""), "quoted");
        assert_eq!(sanitize_column(" \"a b\" "), "a b");
    }

    #[test]
    fn test_truncate_ident_short_names_untouched() {
        assert_eq!(truncate_ident("pk_vin_orders"), "pk_vin_orders");
    }

    #[test]
    fn test_truncate_ident_at_limit() {
        let name = "a".repeat(80);
        let truncated = truncate_ident(&name);
        assert_eq!(truncated.len(), PG_MAX_IDENTIFIER_BYTES);
        assert_eq!(truncated, "a".repeat(63));
    }

    #[test]
    fn test_truncate_ident_respects_char_boundary() {
        // 62 ascii bytes followed by a two-byte char straddling the limit
        let name = format!("{}é!", "a".repeat(62));
        let truncated = truncate_ident(&name);
        assert!(truncated.len() <= PG_MAX_IDENTIFIER_BYTES);
        assert_eq!(truncated, "a".repeat(62));
    }
}
