//! Database schema definitions

/// SQL to create the key-value table
pub const CREATE_DATA_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS data (
    key TEXT NOT NULL PRIMARY KEY,
    value BLOB
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS data_key ON data(key)",
];

/// Liveness probe. Reads metadata only.
pub const PROBE: &str = "SELECT count(*) FROM sqlite_master";

/// User tables, excluding SQLite's internal ones
pub const SELECT_TABLE_NAMES: &str = r#"
SELECT name FROM sqlite_master
WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
ORDER BY name
"#;

/// Column metadata of the table bound to ?1
pub const SELECT_TABLE_INFO: &str = r#"
SELECT cid, name, type, "notnull", dflt_value, pk
FROM pragma_table_info(?1)
ORDER BY cid
"#;

/// All key-value schema creation statements
pub fn keystore_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_DATA_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
