//! pcapsync CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use pcapsync_client::cli::{Cli, Command, ConfigAction};
use pcapsync_client::config::ClientConfig;
use pcapsync_client::error::{ClientError, ClientResult};
use pcapsync_core::{TracingConfig, init_tracing};

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

async fn run(cli: Cli) -> ClientResult<()> {
    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let mut config = if let Some(ref path) = cli.config {
        ClientConfig::load_from(path).map_err(ClientError::Config)?
    } else {
        ClientConfig::load().map_err(ClientError::Config)?
    };
    cli.apply_overrides(&mut config);

    // Initialize tracing
    let mut tracing_config = if config.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
    };
    if let Some(format) = config.logging.format {
        tracing_config = tracing_config.with_format(format);
    }
    init_tracing(tracing_config).map_err(|e| ClientError::Config(e.to_string()))?;

    match cli.command {
        Command::Watch { dump } => pcapsync_client::commands::watch::run(&config, dump).await,
        Command::Decode { file, apply } => {
            pcapsync_client::commands::decode::run(file.as_deref(), apply)
        }
        Command::Config { action } => match action {
            ConfigAction::Dump => pcapsync_client::commands::config::dump(&config, &config_path),
            ConfigAction::Validate => pcapsync_client::commands::config::validate(&config),
            ConfigAction::Path => pcapsync_client::commands::config::path(&config_path),
        },
    }
}
