mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// `RUST_LOG` wins, then `-v`, then the configured level.
fn init_tracing(verbosity: u8, configured: &str) {
    let filter = match verbosity {
        0 => configured,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = commands::load_config(&cli.global)?;

    // Config commands skip validation.
    if let Command::Config(ref args) = cli.command {
        return commands::config_cmd::handle(args, &config);
    }

    init_tracing(cli.global.verbose, config.log_level()?);
    let adapter_config = config.to_adapter_config()?;

    tracing::debug!(command = ?cli.command, url = %adapter_config.url, "dispatching command");
    match cli.command {
        Command::Run => commands::run::handle(adapter_config).await,
        Command::Devices => commands::devices::handle(adapter_config).await,
        Command::Config(_) => Ok(()),
    }
}
