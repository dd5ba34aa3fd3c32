//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pcapsync_core::TracingOutputFormat;

use crate::config::ClientConfig;

/// pcapsync - mirror live capture server state
#[derive(Debug, Parser)]
#[command(name = "pcapsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "PCAPSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Websocket URL of the event channel (overrides config)
    #[arg(long, env = "PCAPSYNC_URL")]
    pub url: Option<String>,

    /// Log output format: pretty, compact or json
    #[arg(long)]
    pub log_format: Option<TracingOutputFormat>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut ClientConfig) {
        if self.debug {
            config.debug = true;
        }
        if let Some(ref url) = self.url {
            config.server.url = url.clone();
        }
        if let Some(format) = self.log_format {
            config.logging.format = Some(format);
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect and mirror live state until interrupted
    Watch {
        /// Print the mirrored state as JSON on exit
        #[arg(long)]
        dump: bool,
    },

    /// Classify recorded frames, one JSON document per line
    Decode {
        /// File to read; reads stdin when omitted
        file: Option<PathBuf>,

        /// Apply accepted frames to a mirror and print it at the end
        #[arg(long)]
        apply: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_watch_with_overrides() {
        let cli = Cli::try_parse_from([
            "pcapsync",
            "--url",
            "ws://10.0.0.5:8080/ws",
            "--log-format",
            "json",
            "-v",
            "watch",
            "--dump",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Watch { dump: true }));

        let mut config = ClientConfig::default();
        cli.apply_overrides(&mut config);
        assert!(config.debug);
        assert_eq!(config.server.url, "ws://10.0.0.5:8080/ws");
        assert_eq!(config.logging.format, Some(TracingOutputFormat::Json));
    }

    #[test]
    fn parses_decode_from_stdin() {
        let cli = Cli::try_parse_from(["pcapsync", "decode", "--apply"]).unwrap();
        match cli.command {
            Command::Decode { file, apply } => {
                assert!(file.is_none());
                assert!(apply);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_log_format() {
        let result = Cli::try_parse_from(["pcapsync", "--log-format", "xml", "watch"]);
        assert!(result.is_err());
    }

    #[test]
    fn no_overrides_keep_config() {
        let cli = Cli::try_parse_from(["pcapsync", "config", "path"]).unwrap();
        let mut config = ClientConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.server.url, ClientConfig::default().server.url);
        assert!(config.logging.format.is_none());
    }
}
