//! SQL for one kv table.
//!
//! Every table has exactly two columns: `key`, declared without a type so
//! `SQLite` preserves each key's storage class, and `value`, holding JSON
//! text. There is no version header and no migration path.

/// Statements bound to a single table, built once per store.
///
/// Table names are spliced in as quoted identifiers; keys and values are
/// always bound parameters.
#[derive(Debug, Clone)]
pub struct TableSql {
    /// Idempotent bootstrap.
    pub create: String,
    /// Value lookup for a non-null key.
    pub select_value: String,
    /// Value lookup for the null key.
    pub select_value_null: String,
    /// Existence check for a non-null key.
    pub exists: String,
    /// Existence check for the null key.
    pub exists_null: String,
    /// Row count.
    pub count: String,
    /// One page of `(rowid, key)` after a given rowid.
    pub page_keys: String,
    /// One page of `(rowid, key, value)` after a given rowid.
    pub page_items: String,
    /// Native upsert for a non-null key.
    pub upsert: String,
    /// Update of the null key's row.
    pub update_null: String,
    /// Plain insert.
    pub insert: String,
    /// Delete by non-null key.
    pub delete: String,
    /// Delete of the null key's row.
    pub delete_null: String,
    /// Delete of every row.
    pub clear: String,
}

impl TableSql {
    /// Builds the statements for `table`.
    #[must_use]
    pub fn new(table: &str) -> Self {
        let t = quote_identifier(table);
        Self {
            create: format!("CREATE TABLE IF NOT EXISTS {t} (key PRIMARY KEY, value)"),
            select_value: format!("SELECT value FROM {t} WHERE key = ?1"),
            select_value_null: format!("SELECT value FROM {t} WHERE key IS NULL LIMIT 1"),
            exists: format!("SELECT 1 FROM {t} WHERE key = ?1"),
            exists_null: format!("SELECT 1 FROM {t} WHERE key IS NULL LIMIT 1"),
            count: format!("SELECT COUNT(*) FROM {t}"),
            page_keys: format!(
                "SELECT rowid, key FROM {t} WHERE rowid > ?1 ORDER BY rowid LIMIT ?2"
            ),
            page_items: format!(
                "SELECT rowid, key, value FROM {t} WHERE rowid > ?1 ORDER BY rowid LIMIT ?2"
            ),
            upsert: format!(
                "INSERT INTO {t} (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value"
            ),
            update_null: format!("UPDATE {t} SET value = ?1 WHERE key IS NULL"),
            insert: format!("INSERT INTO {t} (key, value) VALUES (?1, ?2)"),
            delete: format!("DELETE FROM {t} WHERE key = ?1"),
            delete_null: format!("DELETE FROM {t} WHERE key IS NULL"),
            clear: format!("DELETE FROM {t}"),
        }
    }
}

/// Quotes an identifier for `SQLite`, doubling embedded quotes.
///
/// # Examples
///
/// ```
/// use kv_rs::storage::schema::quote_identifier;
///
/// assert_eq!(quote_identifier("data"), "\"data\"");
/// assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
/// ```
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
