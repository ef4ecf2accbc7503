//! Core domain types for kv-rs.
//!
//! Pure data types with no connection state: the typed key that addresses
//! an entry in a table.

pub mod key;

pub use key::Key;
