//! CLI layer for kv-rs.
//!
//! Provides the command-line interface using clap: `get`, `set`, `del`
//! and `keys` against one table of one database.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
