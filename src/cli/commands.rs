//! CLI command implementations.
//!
//! Each command opens the store, performs one operation, and returns the
//! text to print. An absent key comes back as a `KeyNotFound` error, which
//! the binary turns into exit status 1 with no output.

use crate::cli::output::{OutputFormat, format_keys, format_value};
use crate::cli::parser::{Cli, Commands};
use crate::core::Key;
use crate::error::Result;
use crate::storage::{KeyValueStore, SqliteKv};
use serde_json::Value;

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns `KeyNotFound` when `get` or `del` names an absent key, and any
/// other storage or configuration error as-is.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let kv = SqliteKv::open(cli.options()?)?;

    match &cli.command {
        Commands::Get { key } => cmd_get(&kv, key, format),
        Commands::Set { key, value } => cmd_set(&kv, key, value),
        Commands::Del { key } => cmd_del(&kv, key),
        Commands::Keys => cmd_keys(&kv, format),
    }
}

fn cmd_get(kv: &SqliteKv, key: &str, format: OutputFormat) -> Result<String> {
    let value: Value = kv.get(key)?;
    Ok(format_value(&value, format))
}

fn cmd_set(kv: &SqliteKv, key: &str, value: &str) -> Result<String> {
    kv.set(key, value)?;
    Ok(String::new())
}

fn cmd_del(kv: &SqliteKv, key: &str) -> Result<String> {
    kv.delete(key)?;
    Ok(String::new())
}

fn cmd_keys(kv: &SqliteKv, format: OutputFormat) -> Result<String> {
    let keys: Vec<Key> = kv.keys().collect::<Result<_>>()?;
    Ok(format_keys(&keys, format))
}
