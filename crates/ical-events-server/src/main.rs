//! ical-events server entry point.

use std::process::ExitCode;

use clap::Parser;

use ical_events_core::init_tracing;
use ical_events_server::cli::{Cli, Command};
use ical_events_server::{ServerResult, serve};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ServerResult<()> {
    let config = cli.load_config()?;

    match cli.command {
        Some(Command::CheckConfig) => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Some(Command::Serve) | None => {
            init_tracing(&config.logging.tracing_config(cli.debug)?)?;
            serve(config).await
        }
    }
}
