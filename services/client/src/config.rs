//! Configuration for the HRV client
//!
//! Values come from defaults, an optional TOML file and `HRV_*` environment
//! overrides, in that order. Durations are stored as milliseconds so the
//! file format stays flat.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::{ClientError, Result};

/// Default websocket port of the unit
pub const DEFAULT_PORT: u16 = 3001;

/// How `send_command` confirms a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAck {
    /// Sleep for `command_grace_period_ms` after enqueueing
    #[default]
    GracePeriod,
    /// Return right after enqueueing; acknowledgements arrive via data handlers
    Immediate,
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Host name or IP address of the unit
    pub host: String,
    /// Websocket port of the unit
    pub port: u16,
    /// Handshake timeout for every connection attempt
    pub connect_timeout_ms: u64,
    /// Interval of the periodic data handler round
    pub update_interval_ms: u64,
    /// Interval between `PONG` keepalive lines
    pub keepalive_interval_ms: u64,
    /// Fixed delay between reconnection attempts after the first immediate one
    pub retry_backoff_ms: u64,
    /// Upper bound on consecutive reconnection attempts (unbounded if unset)
    pub max_retry_attempts: Option<u32>,
    /// Command confirmation behaviour
    pub command_ack: CommandAck,
    /// Grace period used by [`CommandAck::GracePeriod`]
    pub command_grace_period_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 15_000,
            update_interval_ms: 30_000,
            keepalive_interval_ms: 30_000,
            retry_backoff_ms: 15_000,
            max_retry_attempts: None,
            command_ack: CommandAck::GracePeriod,
            command_grace_period_ms: 500,
        }
    }
}

impl ClientConfig {
    /// Configuration for `host:port` with default timings
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file with environment variable overrides
    pub fn from_toml_with_env_overrides(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path).map_err(|e| {
            ClientError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_toml_str(&config_str)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| {
            ClientError::Configuration(format!("Failed to parse TOML configuration: {}", e))
        })
    }

    /// Apply `HRV_HOST` and `HRV_PORT` overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("HRV_HOST") {
            self.host = host;
        }

        if let Ok(port) = std::env::var("HRV_PORT") {
            self.port = port
                .parse()
                .map_err(|_| ClientError::Configuration(format!("Invalid HRV_PORT: {}", port)))?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ClientError::Configuration("Host cannot be empty".to_string()));
        }

        if self.port == 0 {
            return Err(ClientError::Configuration(
                "Port must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("update_interval_ms", self.update_interval_ms),
            ("keepalive_interval_ms", self.keepalive_interval_ms),
        ] {
            if value == 0 {
                return Err(ClientError::Configuration(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        self.url()?;
        Ok(())
    }

    /// Websocket URL of the unit
    pub fn url(&self) -> Result<Url> {
        let raw = format!("ws://{}:{}", self.host, self.port);
        let url = Url::parse(&raw).map_err(|e| ClientError::InvalidAddress(format!("{raw}: {e}")))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ClientError::InvalidAddress(raw));
        }
        Ok(url)
    }

    /// `host:port` for log lines and error messages
    pub fn address(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    /// Handshake timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Periodic dispatch interval
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Keepalive interval
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    /// Delay between reconnection attempts after the first
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Grace period after `send_command`
    pub fn command_grace_period(&self) -> Duration {
        Duration::from_millis(self.command_grace_period_ms)
    }

    /// Set the handshake timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the periodic dispatch interval
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the keepalive interval
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the reconnection backoff
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff_ms = backoff.as_millis() as u64;
        self
    }

    /// Bound the reconnection loop
    pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = Some(attempts);
        self
    }

    /// Choose how `send_command` confirms
    pub fn with_command_ack(mut self, ack: CommandAck) -> Self {
        self.command_ack = ack;
        self
    }

    /// Set the `send_command` grace period
    pub fn with_command_grace_period(mut self, grace: Duration) -> Self {
        self.command_grace_period_ms = grace.as_millis() as u64;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("10.0.0.5", 3001);
        assert_eq!(config.connect_timeout(), Duration::from_secs(15));
        assert_eq!(config.update_interval(), Duration::from_secs(30));
        assert_eq!(config.retry_backoff(), Duration::from_secs(15));
        assert_eq!(config.command_grace_period(), Duration::from_millis(500));
        assert_eq!(config.command_ack, CommandAck::GracePeriod);
        assert_eq!(config.max_retry_attempts, None);
        assert!(config.validate().is_ok());
        assert_eq!(config.url().unwrap().as_str(), "ws://10.0.0.5:3001/");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            host = "hrv.local"
            port = 3002
            update_interval_ms = 1000
            command_ack = "immediate"
            "#,
        )
        .unwrap();

        assert_eq!(config.host, "hrv.local");
        assert_eq!(config.port, 3002);
        assert_eq!(config.update_interval(), Duration::from_secs(1));
        assert_eq!(config.command_ack, CommandAck::Immediate);
        assert_eq!(config.keepalive_interval_ms, 30_000);
    }

    #[test]
    fn test_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"192.168.1.20\"\nmax_retry_attempts = 3").unwrap();

        let config = ClientConfig::from_toml_with_env_overrides(file.path()).unwrap();
        assert_eq!(config.max_retry_attempts, Some(3));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_invalid_toml() {
        let err = ClientConfig::from_toml_str("port = \"three\"").unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }

    #[test]
    fn test_validation() {
        assert!(ClientConfig::new("", 3001).validate().is_err());
        assert!(ClientConfig::new("localhost", 0).validate().is_err());
        assert!(ClientConfig::new("bad host", 3001).validate().is_err());

        let zero_interval = ClientConfig::new("localhost", 3001).with_update_interval(Duration::ZERO);
        assert!(zero_interval.validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::new("localhost", 3001)
            .with_connect_timeout(Duration::from_secs(3))
            .with_retry_backoff(Duration::from_millis(250))
            .with_max_retry_attempts(5)
            .with_command_ack(CommandAck::Immediate);
        assert_eq!(config.connect_timeout_ms, 3000);
        assert_eq!(config.retry_backoff_ms, 250);
        assert_eq!(config.max_retry_attempts, Some(5));
        assert_eq!(config.command_ack, CommandAck::Immediate);
    }
}
