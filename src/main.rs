//! Binary entry point for kv-rs.
//!
//! Exit status: 0 on success, 1 when the key is absent (nothing printed),
//! 2 for any other failure.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::Parser;
use kv_rs::cli::output::{OutputFormat, format_error};
use kv_rs::cli::{Cli, execute};
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit status for an absent key.
const EXIT_NOT_FOUND: u8 = 1;

/// Exit status for every other failure.
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let format = OutputFormat::parse(&cli.format);

    match execute(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                // Handle broken pipe gracefully (e.g., when piped to `head`)
                if let Err(e) = write!(io::stdout(), "{output}")
                    && e.kind() != io::ErrorKind::BrokenPipe
                {
                    eprintln!("Error writing to stdout: {e}");
                    return ExitCode::from(EXIT_ERROR);
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) if e.is_not_found() => ExitCode::from(EXIT_NOT_FOUND),
        Err(e) => {
            let error_output = format_error(&e, format);
            match format {
                OutputFormat::Json => println!("{error_output}"),
                OutputFormat::Text => eprintln!("Error: {error_output}"),
            }
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Installs a stderr logger; `-v` forces debug, otherwise `RUST_LOG` or `warn`.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}
