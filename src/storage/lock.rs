//! Reentrant write scope.
//!
//! The outermost acquisition issues `BEGIN IMMEDIATE`, which claims the
//! database's write reservation up front so contention shows up at the
//! start of the scope instead of at some later statement. Nested
//! acquisitions on the same store only bump a counter; the matching
//! `COMMIT` runs when the outermost scope ends.

use crate::error::{Result, StorageError};
use rusqlite::Connection;
use std::cell::Cell;

/// Nesting depth of the write scope on one connection.
///
/// Zero means no transaction is open.
#[derive(Debug, Default)]
pub struct LockState {
    depth: Cell<usize>,
}

impl LockState {
    /// Creates an idle lock state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            depth: Cell::new(0),
        }
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Enters the write scope on `conn`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockContention`] if another connection holds
    /// the write reservation past the busy timeout. The depth is left
    /// unchanged on failure.
    pub fn acquire<'a>(&'a self, conn: &'a Connection) -> Result<WriteLock<'a>> {
        let depth = self.depth.get();
        if depth == 0 {
            conn.execute_batch("BEGIN IMMEDIATE")
                .map_err(StorageError::from)?;
            tracing::debug!("write scope opened");
        }
        self.depth.set(depth + 1);
        Ok(WriteLock {
            conn,
            state: self,
            released: false,
        })
    }

    /// Leaves one level of the write scope, committing at depth zero.
    fn release(&self, conn: &Connection) -> Result<()> {
        let depth = self.depth.get().saturating_sub(1);
        self.depth.set(depth);
        if depth > 0 {
            return Ok(());
        }

        if let Err(err) = conn.execute_batch("COMMIT") {
            // Leave the connection outside any transaction so depth zero
            // keeps meaning "no transaction open".
            if !conn.is_autocommit() {
                let _ = conn.execute_batch("ROLLBACK");
            }
            return Err(StorageError::from(err).into());
        }
        tracing::debug!("write scope committed");
        Ok(())
    }
}

/// Guard for one level of the write scope.
///
/// Dropping the guard releases it; use [`WriteLock::release`] to observe a
/// failing `COMMIT`.
#[must_use = "the write scope ends when the guard is dropped"]
#[derive(Debug)]
pub struct WriteLock<'a> {
    conn: &'a Connection,
    state: &'a LockState,
    released: bool,
}

impl WriteLock<'_> {
    /// Releases this level of the scope.
    ///
    /// # Errors
    ///
    /// Returns an error if this was the outermost level and `COMMIT` failed;
    /// the transaction has been rolled back in that case.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.state.release(self.conn)
    }

    /// Nesting depth including this guard.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.state.depth()
    }
}

impl Drop for WriteLock<'_> {
    fn drop(&mut self) {
        if !self.released
            && let Err(err) = self.state.release(self.conn)
        {
            tracing::warn!(error = %err, "commit failed while closing write scope");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outermost_scope_opens_and_commits() {
        let conn = Connection::open_in_memory().unwrap();
        let state = LockState::new();
        assert!(conn.is_autocommit());

        let guard = state.acquire(&conn).unwrap();
        assert_eq!(guard.depth(), 1);
        assert!(!conn.is_autocommit());

        guard.release().unwrap();
        assert_eq!(state.depth(), 0);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_nested_scope_commits_once() {
        let conn = Connection::open_in_memory().unwrap();
        let state = LockState::new();

        let outer = state.acquire(&conn).unwrap();
        {
            let inner = state.acquire(&conn).unwrap();
            assert_eq!(inner.depth(), 2);
        }
        // Inner drop must not have committed.
        assert_eq!(state.depth(), 1);
        assert!(!conn.is_autocommit());

        drop(outer);
        assert_eq!(state.depth(), 0);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_failed_begin_leaves_depth_unchanged() {
        let conn = Connection::open_in_memory().unwrap();
        let state = LockState::new();

        // An open transaction makes a second BEGIN fail.
        conn.execute_batch("BEGIN").unwrap();
        assert!(state.acquire(&conn).is_err());
        assert_eq!(state.depth(), 0);
        conn.execute_batch("ROLLBACK").unwrap();

        let guard = state.acquire(&conn).unwrap();
        assert_eq!(guard.depth(), 1);
    }
}
