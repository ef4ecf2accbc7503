//! # kv-rs
//!
//! A dictionary-like interface on top of `SQLite`.
//!
//! Entries live in a single table of a database file, values are stored as
//! JSON, and several independent tables can share one file. A value written
//! by one process is visible to every other process opening the same file.
//!
//! ## Features
//!
//! - **Typed keys**: integer `13` and text `"13"` are different keys
//! - **JSON values**: anything `serde` can serialize
//! - **Write scope**: reentrant `BEGIN IMMEDIATE` transactions, with lock
//!   contention surfaced as an error
//! - **CLI**: `kv <db> [-t table] get|set|del|keys`
//!
//! ```
//! use kv_rs::{KeyValueStore, SqliteKv};
//!
//! let kv = SqliteKv::in_memory().unwrap();
//! kv.set(13, "a").unwrap();
//! assert_eq!(kv.get::<_, String>(13).unwrap(), "a");
//! assert_eq!(kv.try_get::<_, String>("13").unwrap(), None);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod cli;
pub mod core;
pub mod error;
pub mod storage;

// Re-export commonly used types at crate root
pub use error::{Error, Result, StorageError};

pub use core::Key;

pub use storage::{KeyValueStore, KvOptions, Location, SqliteKv, WriteLock};

pub use cli::{Cli, Commands, OutputFormat};
