//! Namespaced key composition
//!
//! Every value key is stored under a flat engine key of the form
//! `tableName=>{table}:{key}`. The format is a persisted convention and
//! must stay bit-exact: existing data is addressed by these strings.

/// Marker that opens every namespaced key
const TABLE_MARKER: &str = "tableName=>";

/// Prefix shared by every key of a table: `tableName=>{table}:`
fn table_prefix(table: &str) -> String {
    format!("{}{}:", TABLE_MARKER, table)
}

/// Engine key for a `(table, key)` pair: `tableName=>{table}:{key}`
pub fn table_key(table: &str, key: &str) -> String {
    format!("{}{}:{}", TABLE_MARKER, table, key)
}

/// Wildcard pattern matching every key of a table: `tableName=>{table}:*`
pub fn table_pattern(table: &str) -> String {
    format!("{}{}:*", TABLE_MARKER, table)
}

/// Recover the original key from a namespaced engine key
///
/// Returns `None` when the engine key does not belong to the table.
pub fn strip_table_prefix<'a>(table: &str, engine_key: &'a str) -> Option<&'a str> {
    let prefix = table_prefix(table);
    engine_key.strip_prefix(prefix.as_str())
}
