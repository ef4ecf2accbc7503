//! Storage layer for kv-rs.
//!
//! Provides a persistent key-value mapping over a single `SQLite` table,
//! with a reentrant `BEGIN IMMEDIATE` write scope for atomic writes
//! across connections sharing a database file.

pub mod config;
pub mod iter;
pub mod lock;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use config::{DEFAULT_TABLE, DEFAULT_TIMEOUT, KvOptions, Location, MEMORY_LOCATION};
pub use iter::{Items, Keys};
pub use lock::WriteLock;
pub use sqlite::SqliteKv;
pub use traits::KeyValueStore;
