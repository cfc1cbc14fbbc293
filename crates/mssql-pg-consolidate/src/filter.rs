//! Table ignore policy.
//!
//! System/diagram tables and change-tracking artifacts carry nothing the
//! downstream consumers want; copying them wastes time and their dangling
//! references produce spurious FK failures.

/// Change-tracking catalog tables maintained by the source engine.
const CDC_CATALOG_TABLES: &[&str] = &[
    "change_tables",
    "ddl_history",
    "lsn_time_mapping",
    "captured_columns",
    "index_columns",
    "comandos",
];

/// Decide whether a source table is skipped.
///
/// Matching is case-insensitive on the trimmed name: the system/diagram
/// tables, change-tracking shadow tables (`*_ct`, `*_ct_*`), and the
/// change-tracking catalog itself.
pub fn is_ignored_table(table_name: &str) -> bool {
    let t = table_name.trim().to_lowercase();

    if t == "dtproperties" || t == "sysdiagrams" || t == "systranschemas" {
        return true;
    }
    if t.ends_with("_ct") || t.contains("_ct_") {
        return true;
    }
    CDC_CATALOG_TABLES.contains(&t.as_str())
}
