//! Client settings loaded from YAML
//!
//! ```yaml
//! host: localhost
//! port: 3000
//! secure: false
//! namespace: /chat
//! heartbeat_interval_secs: 25
//! pong_timeout_secs: 60
//! reconnect:
//!   strategy: exponential   # fixed | exponential | never
//!   interval_ms: 1000
//!   max_interval_ms: 30000
//!   max_attempts: 20
//! events: [news, chat]
//! log_level: info
//! ```
//!
//! `SOCKIO_HOST` (from the environment or a `.env` file) overrides `host`.

use serde::{Deserialize, Serialize};
use sockio::states::HasUrl;
use sockio::{ClientBuilder, ExponentialBackoff, FixedDelay, NeverReconnect};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const HOST_ENV_VAR: &str = "SOCKIO_HOST";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Fixed,
    Exponential,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Fixed delay, or the first delay of the exponential strategy
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Ceiling of the exponential strategy
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// `None` retries forever
    #[serde(default)]
    pub max_attempts: Option<usize>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            interval_ms: default_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default)]
    pub pong_timeout_secs: Option<u64>,
    #[serde(default)]
    pub reconnect: ReconnectSettings,
    /// Application events the listener subscribes to
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    3000
}

fn default_heartbeat_interval_secs() -> u64 {
    25
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_max_interval_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ClientSettings {
    /// Load settings from a YAML file, apply `.env`/environment overrides and validate
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut settings: ClientSettings = serde_yaml::from_str(&yaml_content)?;

        // Don't fail if .env doesn't exist
        dotenv::dotenv().ok();
        if let Ok(host) = std::env::var(HOST_ENV_VAR) {
            settings.host = host;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Parse and validate settings without consulting the environment
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let settings: ClientSettings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::ValidationError("host must not be empty".to_string()));
        }

        if self.port == 0 {
            return Err(ConfigError::ValidationError("port must be greater than 0".to_string()));
        }

        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "heartbeat_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.pong_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "pong_timeout_secs must be greater than 0".to_string(),
            ));
        }

        let reconnect = &self.reconnect;
        if reconnect.strategy != StrategyKind::Never && reconnect.interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect.interval_ms must be greater than 0".to_string(),
            ));
        }

        if reconnect.strategy == StrategyKind::Exponential
            && reconnect.max_interval_ms < reconnect.interval_ms
        {
            return Err(ConfigError::ValidationError(
                "reconnect.max_interval_ms must be >= reconnect.interval_ms".to_string(),
            ));
        }

        Ok(())
    }

    /// Canonical socket.io websocket URL for the configured server
    pub fn url(&self) -> String {
        sockio::get_url(&self.host, self.port, self.secure)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn pong_timeout(&self) -> Option<Duration> {
        self.pong_timeout_secs.map(Duration::from_secs)
    }

    /// Client builder preconfigured from these settings
    pub fn client_builder(&self) -> ClientBuilder<HasUrl> {
        let mut builder = sockio::builder()
            .url(self.url())
            .heartbeat(self.heartbeat_interval());

        if let Some(namespace) = &self.namespace {
            builder = builder.namespace(namespace);
        }
        if let Some(timeout) = self.pong_timeout() {
            builder = builder.pong_timeout(timeout);
        }

        let reconnect = &self.reconnect;
        let interval = Duration::from_millis(reconnect.interval_ms);
        match reconnect.strategy {
            StrategyKind::Fixed => {
                builder.reconnect_strategy(FixedDelay::new(interval, reconnect.max_attempts))
            }
            StrategyKind::Exponential => builder.reconnect_strategy(ExponentialBackoff::new(
                interval,
                Duration::from_millis(reconnect.max_interval_ms),
                reconnect.max_attempts,
            )),
            StrategyKind::Never => builder.reconnect_strategy(NeverReconnect),
        }
    }

    /// Log the effective settings
    pub fn log(&self) {
        tracing::info!("Server: {}", self.url());
        tracing::info!("Namespace: {}", self.namespace.as_deref().unwrap_or("/"));
        tracing::info!("Heartbeat: {}s", self.heartbeat_interval_secs);
        if let Some(timeout) = self.pong_timeout_secs {
            tracing::info!("Pong timeout: {}s", timeout);
        }
        tracing::info!(
            "Reconnect: {:?} every {}ms (max attempts: {:?})",
            self.reconnect.strategy,
            self.reconnect.interval_ms,
            self.reconnect.max_attempts
        );
        tracing::info!("Events: {:?}", self.events);
    }
}
