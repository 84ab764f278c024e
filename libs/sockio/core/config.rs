use crate::traits::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Heartbeat period used until the server's handshake says otherwise
/// (engine.io's default `pingInterval`)
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Configuration for a Client
///
/// Built by the type-state builder; everything except the URL has a default.
pub struct ClientConfig {
    /// socket.io websocket endpoint (see `protocol::get_url`)
    pub(crate) url: String,

    /// Namespace to open right after every successful dial
    pub(crate) namespace: Option<String>,

    /// Heartbeat period before a handshake has been received
    pub(crate) heartbeat_interval: Duration,

    /// Declare the connection dead if a ping stays unanswered this long
    pub(crate) pong_timeout: Option<Duration>,

    /// Pacing of the reconnection supervisor
    pub(crate) reconnect_strategy: Box<dyn ReconnectionStrategy>,

    /// `true` while running; cleared by `Client::close` or by the owner of
    /// an externally supplied flag to stop reconnection
    pub(crate) shutdown_flag: Arc<AtomicBool>,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            pong_timeout: None,
            reconnect_strategy: Box::new(FixedDelay::default()),
            shutdown_flag: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn pong_timeout(&self) -> Option<Duration> {
        self.pong_timeout
    }

    pub fn reconnect_strategy(&self) -> &dyn ReconnectionStrategy {
        self.reconnect_strategy.as_ref()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(SocketError::Configuration("URL must not be empty".into()));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(SocketError::Configuration(
                "heartbeat interval must be greater than zero".into(),
            ));
        }
        if self.pong_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(SocketError::Configuration(
                "pong timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
