mod cli;
mod commands;
mod prompt;
mod ui;

use clap::Parser;
use std::process::ExitCode;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    magma_core::init_logging(cli.verbose);
    if let Some(warning) = magma_core::elevation_warning() {
        eprintln!("{warning}");
    }

    match commands::run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
