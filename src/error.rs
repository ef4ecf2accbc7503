//! Error types for kv-rs operations.
//!
//! This module provides the error hierarchy using `thiserror` for the
//! storage mapping, its configuration, and the CLI front end.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type alias for kv-rs operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for kv-rs operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage-related errors (lookups, writes, locking).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// I/O errors (directory creation, stdout).
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration errors (bad table name, bad location).
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

impl Error {
    /// Returns true if this error reports an absent key.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::KeyNotFound { .. }))
    }

    /// Returns true if this error reports a write lock that could not be
    /// acquired within the configured timeout.
    #[must_use]
    pub const fn is_lock_contention(&self) -> bool {
        matches!(self, Self::Storage(StorageError::LockContention(_)))
    }

    /// Returns true if a stored value could not be decoded.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Decode(_)))
    }
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The key has no entry in the table.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// Display form of the missing key.
        key: String,
    },

    /// Another connection holds the write reservation on the database file.
    ///
    /// Carries the engine's message verbatim (`database is locked`).
    #[error("{0}")]
    LockContention(String),

    /// A stored value is not valid JSON for the requested type.
    #[error("cannot decode stored value: {0}")]
    Decode(String),

    /// A value could not be serialized to JSON.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Any other database error.
    #[error("database error: {0}")]
    Database(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::from(err))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                Self::LockContention(sqlite_message(&err))
            }
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extracts the engine's own message, falling back to the display form.
fn sqlite_message(err: &rusqlite::Error) -> String {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy_error() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        )
    }

    #[test]
    fn test_key_not_found_display() {
        let err = StorageError::KeyNotFound {
            key: "'missing'".to_string(),
        };
        assert_eq!(err.to_string(), "key not found: 'missing'");
    }

    #[test]
    fn test_lock_contention_keeps_engine_message() {
        let err = StorageError::from(busy_error());
        assert!(matches!(err, StorageError::LockContention(_)));
        assert_eq!(err.to_string(), "database is locked");
    }

    #[test]
    fn test_other_sqlite_errors_are_database_errors() {
        let err: StorageError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, StorageError::Database(_)));
    }

    #[test]
    fn test_error_predicates() {
        let err: Error = StorageError::KeyNotFound {
            key: "NULL".to_string(),
        }
        .into();
        assert!(err.is_not_found());
        assert!(!err.is_lock_contention());

        let err: Error = busy_error().into();
        assert!(err.is_lock_contention());
        assert!(!err.is_not_found());

        let err: Error = StorageError::Decode("bad".to_string()).into();
        assert!(err.is_decode());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_config() {
        let err = Error::Config {
            message: "bad table".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: bad table");
    }

    #[test]
    fn test_from_serde_json_error_to_storage_error() {
        let json_err: serde_json::Error = serde_json::from_str::<i32>("invalid").unwrap_err();
        let err: StorageError = json_err.into();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_command_error_display() {
        let err = CommandError::InvalidArgument("--timeout-ms".to_string());
        assert_eq!(err.to_string(), "invalid argument: --timeout-ms");
    }
}
