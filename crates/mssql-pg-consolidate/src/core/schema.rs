//! Schema metadata types for source tables, columns, and constraints.

use serde::{Deserialize, Serialize};

use crate::core::identifier::{qualify_pg, quote_pg, truncate_ident};

/// Column metadata as reported by the source catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name, sanitized (quotes stripped, whitespace trimmed).
    pub name: String,

    /// Source data type name (e.g. "int", "nvarchar", "uniqueidentifier").
    pub data_type: String,

    /// Numeric precision (0 when not applicable).
    pub precision: i32,

    /// Numeric scale (0 when not applicable).
    pub scale: i32,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Ordinal position (1-based); creation and insert order follow it.
    pub ordinal_pos: i32,
}

/// Table metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Table name, trimmed of the padding some catalogs return.
    pub name: String,

    /// Column definitions in ordinal order.
    pub columns: Vec<Column>,

    /// Primary key column names in key ordinal order (empty when none).
    pub primary_key: Vec<String>,
}

impl Table {
    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Deterministic primary key constraint name: `pk_<schema>_<table>`,
    /// truncated to the PostgreSQL identifier limit.
    pub fn pk_constraint_name(&self, schema: &str) -> String {
        truncate_ident(&format!("pk_{}_{}", schema, self.name))
    }

    /// `ALTER TABLE .. ADD CONSTRAINT .. PRIMARY KEY` statement for the
    /// target, or None when the table has no primary key.
    pub fn pk_install_sql(&self, schema: &str) -> Option<String> {
        if !self.has_pk() {
            return None;
        }
        let cols = self
            .primary_key
            .iter()
            .map(|c| quote_pg(c))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
            qualify_pg(schema, &self.name),
            quote_pg(&self.pk_constraint_name(schema)),
            cols
        ))
    }
}

/// A single-column foreign key collected during table copy and installed
/// after every table of the source database has been copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Origin table name.
    pub table: String,

    /// Origin column name.
    pub column: String,

    /// Referenced table name (same target schema).
    pub ref_table: String,

    /// Referenced column name.
    pub ref_column: String,
}

impl ForeignKey {
    /// Deterministic constraint name: `fk_<table>_<column>_<ref_table>`,
    /// truncated to the PostgreSQL identifier limit.
    pub fn constraint_name(&self) -> String {
        truncate_ident(&format!(
            "fk_{}_{}_{}",
            self.table, self.column, self.ref_table
        ))
    }

    /// `ALTER TABLE .. ADD CONSTRAINT .. FOREIGN KEY` statement for the
    /// target schema.
    pub fn install_sql(&self, schema: &str) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            qualify_pg(schema, &self.table),
            quote_pg(&self.constraint_name()),
            quote_pg(&self.column),
            qualify_pg(schema, &self.ref_table),
            quote_pg(&self.ref_column)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_pk(name: &str, pk: &[&str]) -> Table {
        Table {
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: pk.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_pk_constraint_name() {
        let table = table_with_pk("orders", &["id"]);
        assert_eq!(table.pk_constraint_name("vin"), "pk_vin_orders");
    }

    #[test]
    fn test_pk_constraint_name_truncated() {
        let table = table_with_pk(&"t".repeat(80), &["id"]);
        let name = table.pk_constraint_name("vin");
        assert_eq!(name.len(), 63);
        assert!(name.starts_with("pk_vin_t"));
    }

    #[test]
    fn test_pk_install_sql() {
        let table = table_with_pk("orders", &["id", "line"]);
        assert_eq!(
            table.pk_install_sql("vin").unwrap(),
            "ALTER TABLE \"vin\".\"orders\" ADD CONSTRAINT \"pk_vin_orders\" \
             PRIMARY KEY (\"id\", \"line\")"
        );
    }

    #[test]
    fn test_pk_install_sql_none_without_pk() {
        let table = table_with_pk("audit_log", &[]);
        assert!(table.pk_install_sql("vin").is_none());
    }

    #[test]
    fn test_fk_constraint_name() {
        let fk = ForeignKey {
            table: "detalle".to_string(),
            column: "factura_id".to_string(),
            ref_table: "factura".to_string(),
            ref_column: "id".to_string(),
        };
        assert_eq!(fk.constraint_name(), "fk_detalle_factura_id_factura");
    }

    #[test]
    fn test_fk_constraint_name_truncated_to_63() {
        let fk = ForeignKey {
            table: "x".repeat(40),
            column: "y".repeat(40),
            ref_table: "z".repeat(40),
            ref_column: "id".to_string(),
        };
        assert_eq!(fk.constraint_name().len(), 63);
    }

    #[test]
    fn test_fk_install_sql() {
        let fk = ForeignKey {
            table: "detalle".to_string(),
            column: "factura_id".to_string(),
            ref_table: "factura".to_string(),
            ref_column: "id".to_string(),
        };
        assert_eq!(
            fk.install_sql("BD_FACTURA"),
            "ALTER TABLE \"BD_FACTURA\".\"detalle\" ADD CONSTRAINT \
             \"fk_detalle_factura_id_factura\" FOREIGN KEY (\"factura_id\") \
             REFERENCES \"BD_FACTURA\".\"factura\" (\"id\")"
        );
    }
}
