use std::{io, process::ExitCode};

use awscompat::cli::{Cli, exit_status};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    // Nothing reaches stdout unless the whole exchange succeeded
    match cli.execute().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("awscompat failed: {e:?}");
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Log to stderr; stdout carries the credential_process JSON
fn init_logging(verbose: u8) -> anyhow::Result<()> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG wins over -v
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        // The AWS CLI captures stderr of credential_process helpers verbatim
        .with_ansi(false)
        .with_target(verbose >= 2)
        .with_file(verbose >= 3)
        .with_line_number(verbose >= 3)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))
}
