//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use crate::error::{CommandError, Result};
use crate::storage::{DEFAULT_TABLE, KvOptions, Location};
use clap::{Parser, Subcommand};
use std::time::Duration;

/// Key-value store backed by `SQLite`.
#[derive(Parser, Debug)]
#[command(name = "kv")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database filename or URI (`:memory:` for a throwaway store).
    pub db: String,

    /// Table name.
    #[arg(short, long, env = "KV_TABLE", default_value = DEFAULT_TABLE)]
    pub table: String,

    /// How long to wait for the write lock, in milliseconds.
    #[arg(long, env = "KV_TIMEOUT_MS", default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Get the value for a key.
    Get {
        /// Key to look up.
        key: String,
    },

    /// Set a value for a key.
    ///
    /// The value is stored as a string, never parsed.
    Set {
        /// Key to write.
        key: String,

        /// Value to store.
        value: String,
    },

    /// Delete a key.
    #[command(name = "del", alias = "delete")]
    Del {
        /// Key to remove.
        key: String,
    },

    /// List every key in the table.
    Keys,
}

impl Cli {
    /// Builds store options from the parsed arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the table name is invalid or the timeout is zero.
    pub fn options(&self) -> Result<KvOptions> {
        if self.timeout_ms == 0 {
            return Err(CommandError::InvalidArgument(
                "--timeout-ms must be greater than zero".to_string(),
            )
            .into());
        }
        let options = KvOptions::new(Location::parse(&self.db))
            .table(self.table.clone())
            .timeout(Duration::from_millis(self.timeout_ms));
        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_get_with_table() {
        let cli = Cli::try_parse_from(["kv", "kv.sqlite", "-t", "other", "get", "foo"]).unwrap();
        assert_eq!(cli.db, "kv.sqlite");
        assert_eq!(cli.table, "other");
        assert_eq!(
            cli.command,
            Commands::Get {
                key: "foo".to_string()
            }
        );
    }

    #[test]
    fn test_parse_set() {
        let cli = Cli::try_parse_from(["kv", ":memory:", "set", "foo", "{\"a\": 1}"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Set {
                key: "foo".to_string(),
                value: "{\"a\": 1}".to_string()
            }
        );
    }

    #[test]
    fn test_parse_del_and_alias() {
        for name in ["del", "delete"] {
            let cli = Cli::try_parse_from(["kv", "db", name, "foo"]).unwrap();
            assert_eq!(
                cli.command,
                Commands::Del {
                    key: "foo".to_string()
                }
            );
        }
    }

    #[test]
    fn test_missing_command_is_rejected() {
        assert!(Cli::try_parse_from(["kv", "db"]).is_err());
    }

    #[test]
    fn test_options_from_args() {
        let cli =
            Cli::try_parse_from(["kv", ":memory:", "--timeout-ms", "250", "keys"]).unwrap();
        let options = cli.options().unwrap();
        assert_eq!(options.location, Location::Memory);
        assert_eq!(options.timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let cli = Cli::try_parse_from(["kv", ":memory:", "--timeout-ms", "0", "keys"]).unwrap();
        assert!(cli.options().is_err());
    }
}
