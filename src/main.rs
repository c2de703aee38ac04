mod cli;

use clap::Parser;
use cli::{Cli, Commands, ConfigArgs};
use std::process::ExitCode;
use thermolog::config::{Config, ConfigError};
use thermolog::node;
use thermolog::observability::init_tracing;
use tracing::error;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

fn load_config(args: &ConfigArgs) -> Result<Config, ConfigError> {
    match &args.config {
        Some(path) => {
            let _ = dotenvy::dotenv();
            Config::load_from_path(path.clone())
        }
        None => Config::load(),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, AnyError> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let mut config = load_config(&args.config)?;
            if args.status_addr.is_some() {
                config.status.bind_addr = args.status_addr;
            }
            node::run(config).await?;
        }
        Commands::Sync(args) => {
            let config = load_config(&args)?;
            match node::sync_once(config).await {
                Ok(now) => println!("{now}"),
                Err(e) => {
                    error!(error = %e, "Synchronization failed");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Config(args) => {
            let config = load_config(&args)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}
