//! guildbot entry point.

use std::process::ExitCode;

use clap::Parser;

use guildbot::lifecycle;
use guildbot::observability::{init_logging, LogOptions};
use guildbot::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&LogOptions {
        timestamps: cli.ts,
        ..LogOptions::default()
    });

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "guildbot starting");

    match lifecycle::run(&cli).await {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}
