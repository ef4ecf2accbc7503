//! Construction options for a kv table.
//!
//! A store is bound to one (location, table) pair for its whole lifetime;
//! [`KvOptions`] carries that pair plus the lock-acquisition timeout.

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reserved location token for a process-local, non-persistent store.
pub const MEMORY_LOCATION: &str = ":memory:";

/// Table used when none is given.
pub const DEFAULT_TABLE: &str = "data";

/// How long a writer waits for the write reservation before giving up.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Prefix `SQLite` reserves for its own tables.
const RESERVED_TABLE_PREFIX: &str = "sqlite_";

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Private in-memory database, gone when the connection closes.
    Memory,

    /// Database file (or `file:` URI) on disk.
    File(PathBuf),
}

impl Location {
    /// Parses a location string; `:memory:` selects [`Location::Memory`].
    ///
    /// # Examples
    ///
    /// ```
    /// use kv_rs::storage::Location;
    ///
    /// assert_eq!(Location::parse(":memory:"), Location::Memory);
    /// assert!(matches!(Location::parse("kv.sqlite"), Location::File(_)));
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s == MEMORY_LOCATION {
            Self::Memory
        } else {
            Self::File(PathBuf::from(s))
        }
    }

    /// Returns the file path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Memory => None,
            Self::File(path) => Some(path),
        }
    }

    /// Returns true if data written here outlives the connection.
    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str(MEMORY_LOCATION),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<&str> for Location {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for Location {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        if path.as_os_str() == MEMORY_LOCATION {
            Self::Memory
        } else {
            Self::File(path.to_path_buf())
        }
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Self::from(path.as_path())
    }
}

impl From<&PathBuf> for Location {
    fn from(path: &PathBuf) -> Self {
        Self::from(path.as_path())
    }
}

/// Options for opening a [`SqliteKv`](crate::storage::SqliteKv).
///
/// # Examples
///
/// ```
/// use kv_rs::storage::{KvOptions, Location};
/// use std::time::Duration;
///
/// let options = KvOptions::new(Location::Memory)
///     .table("sessions")
///     .timeout(Duration::from_millis(100));
/// assert_eq!(options.table, "sessions");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvOptions {
    /// Database location.
    pub location: Location,

    /// Table (namespace) holding the entries.
    pub table: String,

    /// Maximum wait for the write reservation.
    pub timeout: Duration,
}

impl KvOptions {
    /// Creates options for `location` with the default table and timeout.
    #[must_use]
    pub fn new(location: impl Into<Location>) -> Self {
        Self {
            location: location.into(),
            table: DEFAULT_TABLE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates options for a private in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Location::Memory)
    }

    /// Selects the table.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Sets the lock-acquisition timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks the options before a connection is opened.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty table name or one using the
    /// prefix `SQLite` reserves for internal tables.
    pub fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(Error::Config {
                message: "table name must not be empty".to_string(),
            });
        }
        if self.table.contains('\0') {
            return Err(Error::Config {
                message: "table name must not contain NUL".to_string(),
            });
        }
        if self
            .table
            .to_ascii_lowercase()
            .starts_with(RESERVED_TABLE_PREFIX)
        {
            return Err(Error::Config {
                message: format!(
                    "table name {:?} uses the reserved prefix {RESERVED_TABLE_PREFIX:?}",
                    self.table
                ),
            });
        }
        Ok(())
    }
}

impl Default for KvOptions {
    fn default() -> Self {
        Self::in_memory()
    }
}
