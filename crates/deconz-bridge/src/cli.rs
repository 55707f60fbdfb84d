//! Clap derive structures for the `deconz-bridge` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// deconz-bridge -- expose a deCONZ Zigbee hub as host devices
#[derive(Debug, Parser)]
#[command(
    name = "deconz-bridge",
    version,
    about = "Bridge a deCONZ-compatible Zigbee hub to a device/property host",
    long_about = "Discovers the lights and sensors of a deCONZ-compatible hub, keeps\n\
        their state in sync by polling and by the hub's push event stream,\n\
        and reports every change as one JSON object per line on stdout.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Hub URL (overrides the config file)
    #[arg(long, short = 'u', global = true)]
    pub url: Option<String>,

    /// Hub API key (overrides the config file)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Temperature unit: celsius or fahrenheit
    #[arg(long, global = true)]
    pub temperature_unit: Option<String>,

    /// Poll only; do not open the push event stream
    #[arg(long, global = true)]
    pub no_websocket: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge until interrupted, streaming notifications as JSON lines
    Run,

    /// Run one discovery pass and print the classified devices
    Devices,

    /// Inspect configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Print the effective configuration (API key masked)
    Show,
}
