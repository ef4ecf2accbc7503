//! `SQLite` storage implementation.
//!
//! Provides a dictionary-like store over a single `SQLite` table, with an
//! explicit, reentrant write scope layered on the engine's own locking.

// SQLite reports counts as i64; a row count is never negative.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::core::Key;
use crate::error::{Error, Result, StorageError};
use crate::storage::config::{KvOptions, Location};
use crate::storage::iter::{self, Items};
use crate::storage::lock::{LockState, WriteLock};
use crate::storage::schema::TableSql;
use crate::storage::traits::KeyValueStore;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// SQLite-backed key-value store bound to one table.
///
/// The connection stays in autocommit mode: every transaction boundary is
/// an explicit statement issued by the write scope (see [`SqliteKv::lock`]).
/// The store is `Send` but not `Sync`; open one per thread.
///
/// # Examples
///
/// ```
/// use kv_rs::storage::{KeyValueStore, SqliteKv};
///
/// let kv = SqliteKv::in_memory().unwrap();
/// kv.set("a", "b").unwrap();
/// assert_eq!(kv.get::<_, String>("a").unwrap(), "b");
/// assert!(kv.get::<_, String>("missing").unwrap_err().is_not_found());
/// ```
pub struct SqliteKv {
    /// `SQLite` connection.
    conn: Connection,
    /// Where the database lives.
    location: Location,
    /// Table holding the entries.
    table: String,
    /// Statements for `table`.
    sql: TableSql,
    /// Write scope depth.
    lock: LockState,
}

impl SqliteKv {
    /// Opens a store with the given options, creating the table if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid, the database cannot be
    /// opened, or the table cannot be created.
    pub fn open(options: KvOptions) -> Result<Self> {
        options.validate()?;

        let conn = match &options.location {
            Location::Memory => Connection::open_in_memory(),
            Location::File(path) => {
                ensure_parent_dir(path)?;
                Connection::open(path)
            }
        }
        .map_err(StorageError::from)?;

        conn.busy_timeout(options.timeout)
            .map_err(StorageError::from)?;

        let sql = TableSql::new(&options.table);
        conn.execute_batch(&sql.create)
            .map_err(StorageError::from)?;

        tracing::debug!(
            location = %options.location,
            table = %options.table,
            timeout_ms = options.timeout.as_millis(),
            "opened kv store"
        );

        Ok(Self {
            conn,
            location: options.location,
            table: options.table,
            sql,
            lock: LockState::new(),
        })
    }

    /// Opens the default table in the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(KvOptions::new(path.as_ref()))
    }

    /// Creates a store in a private in-memory database.
    ///
    /// Useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        Self::open(KvOptions::in_memory())
    }

    /// Returns where the database lives.
    #[must_use]
    pub const fn location(&self) -> &Location {
        &self.location
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Enters the write scope.
    ///
    /// The outermost scope runs `BEGIN IMMEDIATE`; nested scopes on the same
    /// store only count. The matching `COMMIT` runs when the outermost guard
    /// is released or dropped, whichever way the enclosing code exits.
    ///
    /// A `COMMIT` that fails on drop is rolled back and only logged. Call
    /// [`WriteLock::release`] or use [`SqliteKv::with_lock`] to see it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockContention`] when another connection
    /// holds the write reservation for longer than the timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use kv_rs::storage::{KeyValueStore, SqliteKv};
    ///
    /// let kv = SqliteKv::in_memory().unwrap();
    /// {
    ///     let _outer = kv.lock().unwrap();
    ///     kv.set("a", &1).unwrap();
    ///     kv.set("b", &2).unwrap();
    ///     assert!(kv.in_transaction());
    /// }
    /// assert!(!kv.in_transaction());
    /// ```
    pub fn lock(&self) -> Result<WriteLock<'_>> {
        self.lock.acquire(&self.conn)
    }

    /// Runs `f` inside the write scope.
    ///
    /// The scope is released whether `f` succeeds or not. An error from `f`
    /// takes precedence over an error from the final `COMMIT`.
    ///
    /// # Errors
    ///
    /// Returns the error from acquiring the scope, from `f`, or from the
    /// commit, in that order of precedence.
    pub fn with_lock<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let guard = self.lock()?;
        let outcome = f();
        let released = guard.release();
        let value = outcome?;
        released?;
        Ok(value)
    }

    /// Current depth of the write scope; zero when it is not held.
    #[must_use]
    pub fn lock_depth(&self) -> usize {
        self.lock.depth()
    }

    /// Returns true while the write scope is held.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.lock.depth() > 0
    }

    /// Iterates over `(key, value)` pairs, decoding each value as `V`.
    pub fn items<V: DeserializeOwned>(&self) -> Items<'_, V> {
        Items::new(&self.conn, &self.sql.page_items)
    }

    /// Stores every pair from `entries` inside a single write scope.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; pairs stored before it are
    /// committed with the scope.
    pub fn update<I, K, V>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Serialize,
    {
        self.with_lock(|| {
            for (key, value) in entries {
                self.set(key, &value)?;
            }
            Ok(())
        })
    }

    /// Removes `key` and returns the value it held.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the key is absent.
    pub fn pop<K, V>(&self, key: K) -> Result<V>
    where
        K: Into<Key>,
        V: DeserializeOwned,
    {
        let key = key.into();
        self.with_lock(|| {
            let value = self.get(&key)?;
            self.delete_row(&key)?;
            Ok(value)
        })
    }

    /// Removes every entry from the table. The table itself is kept.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns `LockContention` if the write reservation cannot be acquired.
    pub fn clear(&self) -> Result<usize> {
        self.with_lock(|| {
            let removed = self
                .conn
                .prepare_cached(&self.sql.clear)?
                .execute([])
                .map_err(StorageError::from)?;
            Ok(removed)
        })
    }

    /// Closes the connection, reporting any error from the engine.
    ///
    /// Dropping the store also closes it, silently.
    ///
    /// # Errors
    ///
    /// Returns an error if `SQLite` refuses to close the connection.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, err)| StorageError::from(err))?;
        Ok(())
    }

    /// Reads the raw stored value for `key`.
    fn fetch(&self, key: &Key) -> Result<Option<Value>> {
        let raw = if key.is_null() {
            self.conn
                .prepare_cached(&self.sql.select_value_null)?
                .query_row([], |row| row.get(0))
        } else {
            self.conn
                .prepare_cached(&self.sql.select_value)?
                .query_row([key], |row| row.get(0))
        }
        .optional()
        .map_err(StorageError::from)?;
        Ok(raw)
    }

    /// Inserts or replaces the row for `key`. Must run inside the write scope.
    fn upsert(&self, key: &Key, json: &str) -> Result<()> {
        if key.is_null() {
            // NULLs never collide under a uniqueness constraint, so the
            // null key is kept unique here instead of by ON CONFLICT.
            let changed = self
                .conn
                .prepare_cached(&self.sql.update_null)?
                .execute([json])
                .map_err(StorageError::from)?;
            if changed == 0 {
                self.conn
                    .prepare_cached(&self.sql.insert)?
                    .execute(params![key, json])
                    .map_err(StorageError::from)?;
            }
        } else {
            self.conn
                .prepare_cached(&self.sql.upsert)?
                .execute(params![key, json])
                .map_err(StorageError::from)?;
        }
        Ok(())
    }

    /// Deletes the row for `key`, failing if there was none.
    fn delete_row(&self, key: &Key) -> Result<()> {
        let removed = if key.is_null() {
            self.conn
                .prepare_cached(&self.sql.delete_null)?
                .execute([])
        } else {
            self.conn.prepare_cached(&self.sql.delete)?.execute([key])
        }
        .map_err(StorageError::from)?;

        if removed == 0 {
            return Err(not_found(key));
        }
        Ok(())
    }
}

impl KeyValueStore for SqliteKv {
    type Keys<'a>
        = iter::Keys<'a>
    where
        Self: 'a;

    fn get<K, V>(&self, key: K) -> Result<V>
    where
        K: Into<Key>,
        V: DeserializeOwned,
    {
        let key = key.into();
        match self.fetch(&key)? {
            Some(raw) => decode_value(raw),
            None => Err(not_found(&key)),
        }
    }

    fn try_get<K, V>(&self, key: K) -> Result<Option<V>>
    where
        K: Into<Key>,
        V: DeserializeOwned,
    {
        self.fetch(&key.into())?.map(decode_value).transpose()
    }

    fn contains<K: Into<Key>>(&self, key: K) -> Result<bool> {
        let key = key.into();
        let found: Option<i64> = if key.is_null() {
            self.conn
                .prepare_cached(&self.sql.exists_null)?
                .query_row([], |row| row.get(0))
        } else {
            self.conn
                .prepare_cached(&self.sql.exists)?
                .query_row([&key], |row| row.get(0))
        }
        .optional()
        .map_err(StorageError::from)?;
        Ok(found.is_some())
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .prepare_cached(&self.sql.count)?
            .query_row([], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count as usize)
    }

    fn keys(&self) -> iter::Keys<'_> {
        iter::Keys::new(&self.conn, &self.sql.page_keys)
    }

    fn set<K, V>(&self, key: K, value: &V) -> Result<()>
    where
        K: Into<Key>,
        V: Serialize + ?Sized,
    {
        let key = key.into();
        let json = serde_json::to_string(value).map_err(StorageError::from)?;
        self.with_lock(|| self.upsert(&key, &json))
    }

    fn delete<K: Into<Key>>(&self, key: K) -> Result<()> {
        let key = key.into();
        self.with_lock(|| self.delete_row(&key))
    }
}

impl std::fmt::Debug for SqliteKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteKv")
            .field("location", &self.location)
            .field("table", &self.table)
            .field("lock_depth", &self.lock.depth())
            .finish_non_exhaustive()
    }
}

/// Decodes a stored value. Anything other than valid JSON text is an error.
pub(crate) fn decode_value<V: DeserializeOwned>(raw: Value) -> Result<V> {
    match raw {
        Value::Text(json) => {
            serde_json::from_str(&json).map_err(|e| StorageError::Decode(e.to_string()).into())
        }
        Value::Null => Err(StorageError::Decode("stored value is NULL".to_string()).into()),
        Value::Integer(_) | Value::Real(_) | Value::Blob(_) => Err(StorageError::Decode(
            "stored value is not JSON text".to_string(),
        )
        .into()),
    }
}

fn not_found(key: &Key) -> Error {
    StorageError::KeyNotFound {
        key: key.to_string(),
    }
    .into()
}

/// Creates the database file's parent directory if it is missing.
///
/// `file:` URIs are left to `SQLite`.
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if path.to_str().is_some_and(|s| s.starts_with("file:")) {
        return Ok(());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value as Json, json};

    fn setup() -> SqliteKv {
        SqliteKv::in_memory().unwrap()
    }

    #[test]
    fn test_new_store_is_empty() {
        let kv = setup();
        assert_eq!(kv.len().unwrap(), 0);
        assert!(kv.is_empty().unwrap());
    }

    #[test]
    fn test_two_items_have_size_two() {
        let kv = setup();
        kv.set("a", "x").unwrap();
        kv.set("b", "x").unwrap();
        assert_eq!(kv.len().unwrap(), 2);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let kv = setup();
        let err = kv.get::<_, Json>("missing").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "storage error: key not found: 'missing'");
    }

    #[test]
    fn test_try_get_and_get_or() {
        let kv = setup();
        assert_eq!(kv.try_get::<_, String>("missing").unwrap(), None);
        assert_eq!(
            kv.get_or("missing", "fallback".to_string()).unwrap(),
            "fallback"
        );

        kv.set("a", "b").unwrap();
        assert_eq!(kv.try_get::<_, String>("a").unwrap(), Some("b".to_string()));
        assert_eq!(kv.get_or("a", "fallback".to_string()).unwrap(), "b");
    }

    #[test]
    fn test_contains() {
        let kv = setup();
        assert!(!kv.contains("missing").unwrap());
        kv.set("a", "b").unwrap();
        assert!(kv.contains("a").unwrap());
    }

    #[test]
    fn test_overwrite_keeps_one_row() {
        let kv = setup();
        kv.set("a", "b").unwrap();
        kv.set("a", "c").unwrap();
        assert_eq!(kv.get::<_, String>("a").unwrap(), "c");
        assert_eq!(kv.len().unwrap(), 1);
    }

    #[test]
    fn test_update_sets_all_pairs() {
        let kv = setup();
        kv.update([("a", "b"), ("c", "d")]).unwrap();
        assert_eq!(kv.get::<_, String>("a").unwrap(), "b");
        assert_eq!(kv.get::<_, String>("c").unwrap(), "d");
        assert!(!kv.in_transaction());
    }

    #[test]
    fn test_delete() {
        let kv = setup();
        assert!(kv.delete("missing").unwrap_err().is_not_found());

        kv.set("a", "b").unwrap();
        kv.delete("a").unwrap();
        assert!(kv.get::<_, Json>("a").unwrap_err().is_not_found());
        assert!(!kv.in_transaction());
    }

    #[test]
    fn test_pop() {
        let kv = setup();
        kv.set("a", &json!([1, 2])).unwrap();
        assert_eq!(kv.pop::<_, Json>("a").unwrap(), json!([1, 2]));
        assert!(!kv.contains("a").unwrap());
        assert!(kv.pop::<_, Json>("a").unwrap_err().is_not_found());
    }

    #[test]
    fn test_clear_keeps_table() {
        let kv = setup();
        kv.update([(1, "a"), (2, "b")]).unwrap();
        assert_eq!(kv.clear().unwrap(), 2);
        assert_eq!(kv.len().unwrap(), 0);
        kv.set(3, "c").unwrap();
        assert_eq!(kv.len().unwrap(), 1);
    }

    #[test]
    fn test_keys_in_insertion_order() {
        let kv = setup();
        kv.set("a", "x").unwrap();
        kv.set("b", "x").unwrap();
        kv.set("c", "x").unwrap();
        let keys: Vec<Key> = kv.keys().collect::<Result<_>>().unwrap();
        assert_eq!(keys, [Key::from("a"), Key::from("b"), Key::from("c")]);
    }

    #[test]
    fn test_keys_is_restartable() {
        let kv = setup();
        kv.set("a", "x").unwrap();
        assert_eq!(kv.keys().count(), 1);
        kv.set("b", "x").unwrap();
        assert_eq!(kv.keys().count(), 2);
    }

    #[test]
    fn test_keys_span_pages() {
        let kv = setup();
        let n = iter::PAGE_SIZE * 2 + 3;
        kv.update((0..n).map(|i| (i, i))).unwrap();
        let keys: Vec<Key> = kv.keys().collect::<Result<_>>().unwrap();
        assert_eq!(keys.len() as i64, n);
        assert_eq!(keys.last(), Some(&Key::Integer(n - 1)));
    }

    #[test]
    fn test_items_decode_values() {
        let kv = setup();
        kv.set("a", &1).unwrap();
        kv.set("b", &2).unwrap();
        let items: Vec<(Key, i64)> = kv.items().collect::<Result<_>>().unwrap();
        assert_eq!(items, [(Key::from("a"), 1), (Key::from("b"), 2)]);
    }

    #[test]
    fn test_int_key_not_found_with_str_key() {
        let kv = setup();
        kv.set(13, "a").unwrap();
        assert_eq!(kv.get::<_, String>(13).unwrap(), "a");
        assert_eq!(kv.try_get::<_, String>("13").unwrap(), None);
    }

    #[test]
    fn test_str_key_not_found_with_int_key() {
        let kv = setup();
        kv.set("13", "a").unwrap();
        assert_eq!(kv.try_get::<_, String>(13).unwrap(), None);
    }

    #[test]
    fn test_null_key() {
        let kv = setup();
        assert!(!kv.contains(Key::Null).unwrap());
        kv.set(Key::Null, "a").unwrap();
        assert_eq!(kv.get::<_, String>(Key::Null).unwrap(), "a");
        assert!(kv.contains(Key::Null).unwrap());
    }

    #[test]
    fn test_null_key_overwrite_keeps_one_row() {
        let kv = setup();
        kv.set(Key::Null, "a").unwrap();
        kv.set(Key::Null, "b").unwrap();
        assert_eq!(kv.get::<_, String>(Key::Null).unwrap(), "b");
        assert_eq!(kv.len().unwrap(), 1);

        kv.delete(Key::Null).unwrap();
        assert!(kv.is_empty().unwrap());
    }

    #[test]
    fn test_null_key_distinct_from_text_null() {
        let kv = setup();
        kv.set("NULL", "text").unwrap();
        assert_eq!(kv.try_get::<_, String>(Key::Null).unwrap(), None);
    }

    #[test]
    fn test_nan_key_is_the_null_key() {
        let kv = setup();
        kv.set(f64::NAN, "a").unwrap();
        kv.set(Key::Real(f64::NAN), "b").unwrap();
        assert_eq!(kv.len().unwrap(), 1);
        assert_eq!(kv.get::<_, String>(f64::NAN).unwrap(), "b");
        assert_eq!(kv.get::<_, String>(Key::Null).unwrap(), "b");

        kv.set(Key::Null, "c").unwrap();
        assert_eq!(kv.len().unwrap(), 1);
        kv.delete(Key::Real(f64::NAN)).unwrap();
        assert!(kv.is_empty().unwrap());
    }

    #[test]
    fn test_float_key() {
        let kv = setup();
        kv.set(2.5, "a").unwrap();
        assert_eq!(kv.get::<_, String>(2.5).unwrap(), "a");
    }

    #[test]
    fn test_unicode_key() {
        let kv = setup();
        kv.set("\u{2022}", "a").unwrap();
        assert_eq!(kv.get::<_, String>("\u{2022}").unwrap(), "a");
    }

    #[test]
    fn test_blob_key() {
        let kv = setup();
        kv.set(vec![0_u8, 1, 2], "a").unwrap();
        assert_eq!(kv.get::<_, String>(vec![0_u8, 1, 2]).unwrap(), "a");
        assert_eq!(kv.try_get::<_, String>("\u{0}\u{1}\u{2}").unwrap(), None);
    }

    #[test]
    fn test_deep_structure() {
        let kv = setup();
        let value = json!({"a": ["b", {"c": 123}]});
        kv.set("a", &value).unwrap();
        assert_eq!(kv.get::<_, Json>("a").unwrap(), value);
    }

    #[test]
    fn test_values_stored_as_json_text() {
        let kv = setup();
        kv.set("a", &json!({"b": [1, null]})).unwrap();
        let raw: String = kv
            .conn
            .query_row("SELECT value FROM data WHERE key = 'a'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(raw, r#"{"b":[1,null]}"#);
    }

    #[test]
    fn test_malformed_value_is_decode_error() {
        let kv = setup();
        kv.conn
            .execute("INSERT INTO data VALUES ('bad', 'not json')", [])
            .unwrap();
        assert!(kv.get::<_, Json>("bad").unwrap_err().is_decode());
        assert!(kv.contains("bad").unwrap());
    }

    #[test]
    fn test_non_text_value_is_decode_error() {
        let kv = setup();
        kv.conn
            .execute("INSERT INTO data VALUES ('n', 42)", [])
            .unwrap();
        assert!(kv.get::<_, Json>("n").unwrap_err().is_decode());
    }

    #[test]
    fn test_wrong_value_type_is_decode_error() {
        let kv = setup();
        kv.set("a", "text").unwrap();
        assert!(kv.get::<_, i64>("a").unwrap_err().is_decode());
    }

    #[test]
    fn test_nested_lock_commits_once() {
        let kv = setup();
        {
            let _outer = kv.lock().unwrap();
            {
                let _inner = kv.lock().unwrap();
                kv.set("a", "b").unwrap();
                assert_eq!(kv.lock_depth(), 2);
            }
            assert_eq!(kv.lock_depth(), 1);
            assert!(!kv.conn.is_autocommit());
        }
        assert_eq!(kv.lock_depth(), 0);
        assert!(kv.conn.is_autocommit());
        assert_eq!(kv.get::<_, String>("a").unwrap(), "b");
    }

    #[test]
    fn test_with_lock_releases_on_error() {
        let kv = setup();
        let result: Result<()> = kv.with_lock(|| {
            kv.set("a", "b")?;
            kv.delete("missing")
        });
        assert!(result.unwrap_err().is_not_found());
        assert!(!kv.in_transaction());
        // Writes before the failure are committed with the scope.
        assert_eq!(kv.get::<_, String>("a").unwrap(), "b");
    }

    #[test]
    fn test_two_tables_in_one_connection_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("kv.sqlite");
        let data = SqliteKv::open_path(&path).unwrap();
        let other = SqliteKv::open(KvOptions::new(&path).table("other")).unwrap();
        data.set("a", "b").unwrap();
        other.set("a", "c").unwrap();
        assert_eq!(data.get::<_, String>("a").unwrap(), "b");
        assert_eq!(other.get::<_, String>("a").unwrap(), "c");
        assert_eq!(other.table(), "other");
    }

    #[test]
    fn test_quoted_table_name() {
        let kv = SqliteKv::open(KvOptions::in_memory().table("weird \"name\"; --")).unwrap();
        kv.set("a", "b").unwrap();
        assert_eq!(kv.get::<_, String>("a").unwrap(), "b");
    }

    #[test]
    fn test_invalid_table_is_config_error() {
        let err = SqliteKv::open(KvOptions::in_memory().table("")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_open_file_uri() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("kv.sqlite");
        let uri = format!("file:{}", path.display());
        let kv = SqliteKv::open_path(&uri).unwrap();
        kv.set("a", "b").unwrap();
        kv.close().unwrap();

        assert!(path.exists());
        assert!(!Path::new("file:").exists());
        let kv = SqliteKv::open_path(&path).unwrap();
        assert_eq!(kv.get::<_, String>("a").unwrap(), "b");
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("nested").join("kv.sqlite");
        let kv = SqliteKv::open_path(&path).unwrap();
        assert_eq!(kv.location().path(), Some(path.as_path()));
        assert!(path.exists());
        kv.close().unwrap();
    }
}
