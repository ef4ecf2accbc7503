//! Lazy scans over a kv table.
//!
//! A scan reads the table in rowid order, one page at a time. No statement
//! stays open between pages, so a scan never pins a read transaction and a
//! writer on the same connection can run while it is alive. Rows inserted
//! behind the cursor are not revisited; rows inserted ahead of it are.

use crate::core::Key;
use crate::error::Result;
use crate::storage::sqlite::decode_value;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::marker::PhantomData;

/// Rows fetched per query.
pub const PAGE_SIZE: i64 = 256;

type ReadRow<T> = fn(&Row<'_>) -> rusqlite::Result<(i64, T)>;

struct Scan<'a, T> {
    conn: &'a Connection,
    sql: &'a str,
    read: ReadRow<T>,
    after: i64,
    page: VecDeque<T>,
    exhausted: bool,
}

impl<'a, T> Scan<'a, T> {
    fn new(conn: &'a Connection, sql: &'a str, read: ReadRow<T>) -> Self {
        Self {
            conn,
            sql,
            read,
            after: i64::MIN,
            page: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fill(&mut self) -> Result<()> {
        let after = self.after;
        let mut stmt = self.conn.prepare_cached(self.sql)?;
        let rows = stmt.query_map(params![after, PAGE_SIZE], self.read)?;

        let mut fetched = 0_i64;
        for row in rows {
            let (rowid, item) = row?;
            self.after = rowid;
            self.page.push_back(item);
            fetched += 1;
        }
        if fetched < PAGE_SIZE {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl<T> Iterator for Scan<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty()
            && !self.exhausted
            && let Err(err) = self.fill()
        {
            self.exhausted = true;
            return Some(Err(err));
        }
        self.page.pop_front().map(Ok)
    }
}

/// Lazy iterator over the keys of a table.
pub struct Keys<'a> {
    scan: Scan<'a, Key>,
}

impl<'a> Keys<'a> {
    pub(crate) fn new(conn: &'a Connection, sql: &'a str) -> Self {
        Self {
            scan: Scan::new(conn, sql, |row| Ok((row.get(0)?, row.get(1)?))),
        }
    }
}

impl Iterator for Keys<'_> {
    type Item = Result<Key>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scan.next()
    }
}

/// Lazy iterator over the `(key, value)` pairs of a table.
///
/// Each value is decoded as it is yielded.
pub struct Items<'a, V> {
    scan: Scan<'a, (Key, Value)>,
    _value: PhantomData<fn() -> V>,
}

impl<'a, V> Items<'a, V> {
    pub(crate) fn new(conn: &'a Connection, sql: &'a str) -> Self {
        Self {
            scan: Scan::new(conn, sql, |row| {
                Ok((row.get(0)?, (row.get(1)?, row.get(2)?)))
            }),
            _value: PhantomData,
        }
    }
}

impl<V: DeserializeOwned> Iterator for Items<'_, V> {
    type Item = Result<(Key, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, raw) = match self.scan.next()? {
            Ok(pair) => pair,
            Err(err) => return Some(Err(err)),
        };
        Some(decode_value(raw).map(|value| (key, value)))
    }
}
