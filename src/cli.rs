use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "thermolog")]
#[command(about = "Temperature logger with date-partitioned JSON streams", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the logging jobs until Ctrl+C or SIGTERM
    Run(RunArgs),
    /// Synchronize the clock once and print the local time
    Sync(ConfigArgs),
    /// Print the resolved configuration as TOML
    Config(ConfigArgs),
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// Configuration file (defaults to $THERMOLOG_CONFIG or config/thermolog.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Serve /health and /metrics on this address
    #[arg(long)]
    pub status_addr: Option<SocketAddr>,
}
