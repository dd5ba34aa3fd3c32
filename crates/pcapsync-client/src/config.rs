//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/pcapsync/config.toml` by default:
//!
//! ```toml
//! debug = false
//!
//! [server]
//! url = "ws://localhost:8080/ws"
//! connect_timeout = 10
//!
//! [reconnect]
//! initial_backoff_ms = 500
//! max_backoff_secs = 30
//! multiplier = 2.0
//! jitter = 0.1
//! max_consecutive_failures = 20
//!
//! [logging]
//! format = "json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use pcapsync_core::TracingOutputFormat;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::connection::{ConnectionConfig, ReconnectPolicy};
use crate::error::{ClientError, ClientResult};

/// Configuration for the pcapsync client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Server/connection settings.
    pub server: ServerSettings,

    /// Reconnect backoff settings.
    pub reconnect: ReconnectSettings,

    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Server/connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Websocket endpoint of the event channel.
    pub url: String,

    /// Connection timeout in seconds.
    pub connect_timeout: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ws".to_string(),
            connect_timeout: 10,
        }
    }
}

/// Reconnect backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub initial_backoff_ms: u64,
    pub max_backoff_secs: u64,
    pub multiplier: f64,
    /// Jitter as a fraction of the delay.
    pub jitter: f64,
    /// Give up after this many failed attempts in a row. Unset retries forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_consecutive_failures: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_secs: 30,
            multiplier: 2.0,
            jitter: 0.1,
            max_consecutive_failures: None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Output format; falls back to pretty output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<TracingOutputFormat>,
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pcapsync")
    }

    /// Parses and checks the server URL.
    pub fn server_url(&self) -> ClientResult<Url> {
        let url = Url::parse(&self.server.url).map_err(|e| {
            ClientError::Config(format!("invalid server url '{}': {}", self.server.url, e))
        })?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(ClientError::Config(format!(
                "server url must use ws:// or wss://, got '{other}://'"
            ))),
        }
    }

    /// Checks the whole configuration.
    pub fn validate(&self) -> ClientResult<()> {
        self.server_url()?;

        if self.server.connect_timeout == 0 {
            return Err(ClientError::Config(
                "server.connect_timeout must be greater than zero".to_string(),
            ));
        }

        let reconnect = &self.reconnect;
        if reconnect.initial_backoff_ms == 0 {
            return Err(ClientError::Config(
                "reconnect.initial_backoff_ms must be greater than zero".to_string(),
            ));
        }
        if Duration::from_millis(reconnect.initial_backoff_ms)
            > Duration::from_secs(reconnect.max_backoff_secs)
        {
            return Err(ClientError::Config(
                "reconnect.initial_backoff_ms exceeds reconnect.max_backoff_secs".to_string(),
            ));
        }
        if !reconnect.multiplier.is_finite() || reconnect.multiplier < 1.0 {
            return Err(ClientError::Config(format!(
                "reconnect.multiplier must be at least 1.0, got {}",
                reconnect.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&reconnect.jitter) {
            return Err(ClientError::Config(format!(
                "reconnect.jitter must be between 0.0 and 1.0, got {}",
                reconnect.jitter
            )));
        }
        if reconnect.max_consecutive_failures == Some(0) {
            return Err(ClientError::Config(
                "reconnect.max_consecutive_failures must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Builds the reconnect policy.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        let reconnect = &self.reconnect;
        let policy = ReconnectPolicy::default()
            .with_backoff(
                Duration::from_millis(reconnect.initial_backoff_ms),
                Duration::from_secs(reconnect.max_backoff_secs),
                reconnect.multiplier,
            )
            .with_jitter(reconnect.jitter);
        match reconnect.max_consecutive_failures {
            Some(max) => policy.with_max_failures(max),
            None => policy,
        }
    }

    /// Builds the connection settings after validating the configuration.
    pub fn connection_config(&self) -> ClientResult<ConnectionConfig> {
        self.validate()?;
        Ok(ConnectionConfig::new(self.server_url()?)
            .with_connect_timeout(Duration::from_secs(self.server.connect_timeout))
            .with_policy(self.reconnect_policy()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        config.validate().unwrap();
        assert_eq!(config.server_url().unwrap().scheme(), "ws");
        assert_eq!(config.reconnect_policy(), ReconnectPolicy::default());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
debug = true

[server]
url = "wss://pcap.example.com/ws"

[reconnect]
initial_backoff_ms = 100
max_consecutive_failures = 5

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = ClientConfig::load_from(file.path()).unwrap();
        assert!(config.debug);
        assert_eq!(config.server.url, "wss://pcap.example.com/ws");
        assert_eq!(config.server.connect_timeout, 10);
        assert_eq!(config.logging.format, Some(TracingOutputFormat::Json));

        let connection = config.connection_config().unwrap();
        assert_eq!(connection.policy.initial_backoff, Duration::from_millis(100));
        assert_eq!(connection.policy.max_backoff, Duration::from_secs(30));
        assert_eq!(connection.policy.max_consecutive_failures, Some(5));
    }

    #[test]
    fn load_from_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = ClientConfig::load_from(&dir.path().join("nope.toml"));
        assert!(result.unwrap_err().contains("failed to read config"));
    }

    #[test]
    fn load_from_invalid_toml_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nurl = ").unwrap();
        let result = ClientConfig::load_from(file.path());
        assert!(result.unwrap_err().contains("failed to parse config"));
    }

    #[test]
    fn rejects_http_url() {
        let mut config = ClientConfig::default();
        config.server.url = "http://localhost:8080/ws".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ws:// or wss://"));
    }

    #[test]
    fn rejects_unparseable_url() {
        let mut config = ClientConfig::default();
        config.server.url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));
    }

    #[test]
    fn rejects_bad_backoff() {
        let mut config = ClientConfig::default();
        config.reconnect.multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.reconnect.jitter = 1.5;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.reconnect.initial_backoff_ms = 60_000;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.reconnect.max_consecutive_failures = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_path_ends_with_config_toml() {
        let path = ClientConfig::default_path();
        assert!(path.ends_with("pcapsync/config.toml"));
    }
}
