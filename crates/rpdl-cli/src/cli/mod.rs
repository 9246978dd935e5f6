//! CLI for the sandboxed fetch worker.

mod commands;

use clap::{Args, Parser, Subcommand};
use rpdl_core::outcome::{EXIT_INVALID_REQUEST, EXIT_SUCCESS};
use std::path::PathBuf;

use commands::{run_fetch, run_profile};

/// Top-level CLI for the fetch worker.
#[derive(Debug, Parser)]
#[command(name = "rp-download")]
#[command(
    about = "Sandboxed single-resource HTTP fetch worker",
    long_about = "Applies the platform sandbox, fetches one resource and exits. \
                  The exit code reports the outcome."
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Sandbox this process, then fetch one URL.
    Fetch(FetchArgs),

    /// Print the sandbox profile this platform would apply.
    Profile,
}

#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    /// Absolute http:// or https:// URL.
    pub url: String,

    /// User agent string (default from config).
    #[arg(long, value_name = "UA")]
    pub user_agent: Option<String>,

    /// Size ceiling in bytes (default from config).
    #[arg(long, value_name = "BYTES")]
    pub max_size: Option<u64>,

    /// Write the payload here instead of stdout.
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Parses the process arguments and runs the command. Returns the exit code.
pub fn run_from_args() -> u8 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // --help and --version are not errors.
            return if err.use_stderr() {
                EXIT_INVALID_REQUEST
            } else {
                EXIT_SUCCESS
            };
        }
    };

    match cli.command {
        CliCommand::Fetch(args) => run_fetch(&args),
        CliCommand::Profile => run_profile(),
    }
}

#[cfg(test)]
mod tests;
