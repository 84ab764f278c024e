pub mod states;

use crate::core::channel::Channel;
use crate::core::client::Client;
use crate::core::config::ClientConfig;
use crate::core::dispatcher::Handler;
use crate::core::protocol;
use crate::core::websocket::WebSocketTransport;
use crate::traits::*;
use serde_json::Value;
use states::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for [`Client`]
///
/// The URL is required before `connect()` becomes available. Handlers added
/// here are registered before the first dial, so they see the first
/// `connected` event.
pub struct ClientBuilder<U: UrlState> {
    _state: TypeState<U>,
    url: Option<String>,
    namespace: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    handlers: Vec<(String, Handler)>,
    heartbeat_interval: Option<Duration>,
    pong_timeout: Option<Duration>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl ClientBuilder<NoUrl> {
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            url: None,
            namespace: None,
            transport: None,
            handlers: Vec::new(),
            heartbeat_interval: None,
            pong_timeout: None,
            reconnect_strategy: None,
            shutdown_flag: None,
        }
    }

    pub fn url(self, url: impl Into<String>) -> ClientBuilder<HasUrl> {
        ClientBuilder {
            _state: TypeState::new(),
            url: Some(url.into()),
            namespace: self.namespace,
            transport: self.transport,
            handlers: self.handlers,
            heartbeat_interval: self.heartbeat_interval,
            pong_timeout: self.pong_timeout,
            reconnect_strategy: self.reconnect_strategy,
            shutdown_flag: self.shutdown_flag,
        }
    }
}

impl Default for ClientBuilder<NoUrl> {
    fn default() -> Self {
        Self::new()
    }
}

// Optional configuration (available in any state)
impl<U: UrlState> ClientBuilder<U> {
    /// Namespace to open on every dial (`"chat"` and `"/chat"` are equivalent)
    pub fn namespace(mut self, namespace: impl AsRef<str>) -> Self {
        self.namespace = Some(protocol::normalize_namespace(namespace.as_ref()));
        self
    }

    /// Transport used for the first dial and every reconnection attempt
    ///
    /// Defaults to [`WebSocketTransport`].
    pub fn transport<T: Transport>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Register a handler before connecting
    pub fn on<F>(mut self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Channel, &Value) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers.push((event.into(), Arc::new(handler)));
        self
    }

    /// Heartbeat period used until the server handshake provides one
    pub fn heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Treat the connection as dead when a ping stays unanswered this long
    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = Some(timeout);
        self
    }

    pub fn reconnect_strategy<S: ReconnectionStrategy + 'static>(mut self, strategy: S) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Share a running flag with the caller
    ///
    /// The flag must be `true` when connecting. Storing `false` stops any
    /// further reconnection attempt; `Client::close` stores `false` as well.
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }
}

impl ClientBuilder<HasUrl> {
    /// Validate the configuration, dial and return the connected client
    pub async fn connect(self) -> Result<Client> {
        let url = self
            .url
            .ok_or_else(|| SocketError::Configuration("URL not set".into()))?;

        let mut config = ClientConfig::new(url);
        config.namespace = self.namespace;
        config.pong_timeout = self.pong_timeout;
        if let Some(interval) = self.heartbeat_interval {
            config.heartbeat_interval = interval;
        }
        if let Some(strategy) = self.reconnect_strategy {
            config.reconnect_strategy = strategy;
        }
        if let Some(flag) = self.shutdown_flag {
            config.shutdown_flag = flag;
        }

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(WebSocketTransport::new()));

        Client::connect(config, transport, self.handlers).await
    }
}
