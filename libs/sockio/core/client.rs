use crate::core::channel::{Channel, ChannelState, Generation, SupervisorState};
use crate::core::config::ClientConfig;
use crate::core::dispatcher::{Dispatcher, Handler, ON_CONNECTED, ON_DISCONNECTED, ON_ERROR};
use crate::core::heartbeat::heartbeat_task;
use crate::core::metrics::{AtomicMetrics, Metrics};
use crate::core::protocol::{self, Packet, SocketPacket, DEFAULT_NAMESPACE, PONG};
use crate::core::supervisor;
use crate::traits::*;
use serde_json::Value;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// State shared by the client handle, the per-generation tasks and the supervisor
pub(crate) struct ClientShared {
    pub(crate) config: ClientConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) channel: Channel,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) metrics: Arc<AtomicMetrics>,
}

impl ClientShared {
    /// Open a transport session and, if a namespace is configured, write the
    /// namespace-open frame on it
    ///
    /// A session whose namespace-open write fails is released and the whole
    /// attempt counts as failed.
    pub(crate) async fn dial(&self) -> Result<Connection> {
        let mut connection = self.transport.connect(self.config.url()).await?;

        if let Some(namespace) = self.config.namespace() {
            let open = protocol::encode_open(namespace);
            if let Err(e) = connection.write_message(open).await {
                warn!("Namespace open for '{}' failed: {}", namespace, e);
                connection.close().await;
                return Err(e);
            }
            self.metrics.increment_sent();
            debug!("Sent namespace open for '{}'", namespace);
        }

        Ok(connection)
    }

    /// Install `connection` as a new channel generation and run its tasks
    ///
    /// `connected` is dispatched before the tasks start, so it is the first
    /// event of every generation. It is skipped when a `close` overtook the
    /// start; the tasks are still spawned so they release the session and
    /// `close` can wait for them.
    pub(crate) async fn start(self: &Arc<Self>, connection: Connection) -> Result<u64> {
        let Generation {
            id,
            reader,
            writer,
            outbound_rx,
            close_rx,
        } = match self.channel.open(connection) {
            Ok(generation) => generation,
            Err(connection) => {
                debug!("Client shut down, releasing fresh connection");
                connection.close().await;
                return Err(SocketError::ChannelClosed);
            }
        };

        info!("Connected to {} (generation {})", self.config.url(), id);
        if self.channel.state() == ChannelState::Open {
            self.dispatcher.fire_connected(&self.channel);
        } else {
            debug!("Generation {} closed before it started", id);
        }

        self.channel.spawn_tasks(id, || {
            vec![
                tokio::spawn(inbound_loop(Arc::clone(self), id, reader, close_rx.clone())),
                tokio::spawn(outbound_loop(Arc::clone(self), id, writer, outbound_rx, close_rx.clone())),
                tokio::spawn(heartbeat_task(Arc::clone(self), id, close_rx)),
            ]
        });

        Ok(id)
    }

    /// A task of `generation` observed a dead connection
    ///
    /// Only the first report per generation dispatches `disconnected`.
    pub(crate) fn connection_lost(&self, generation: u64, reason: &str) {
        if self.channel.fail(generation, reason) {
            warn!("Disconnected: {}", reason);
            self.dispatcher.fire_disconnected(&self.channel, reason);
        } else {
            trace!("Ignoring '{}' for finished generation {}", reason, generation);
        }
    }

    /// Act on one decoded frame; `false` ends the inbound loop
    fn route(&self, generation: u64, packet: Packet) -> bool {
        match packet {
            Packet::Open(handshake) => {
                debug!(
                    "Handshake: sid={} pingInterval={}ms pingTimeout={}ms",
                    handshake.sid, handshake.ping_interval, handshake.ping_timeout
                );
                self.channel.record_handshake(generation, handshake);
            }
            Packet::Ping => {
                trace!("Server ping");
                if self.channel.send(PONG).is_err() {
                    return false;
                }
            }
            Packet::Pong => {
                trace!("Pong received");
                self.channel.liveness().record_pong_received();
            }
            Packet::Close => {
                self.connection_lost(generation, "server closed the connection");
                return false;
            }
            Packet::Upgrade | Packet::Noop => trace!("Ignoring upgrade/noop frame"),
            Packet::Message(packet) => return self.route_socket_packet(generation, packet),
        }
        true
    }

    fn route_socket_packet(&self, generation: u64, packet: SocketPacket) -> bool {
        match packet {
            SocketPacket::Event {
                namespace,
                name,
                payload,
            } => {
                if !self.is_own_namespace(&namespace) {
                    debug!("Dropping event '{}' for foreign namespace {}", name, namespace);
                    self.metrics.increment_dropped();
                } else if matches!(name.as_str(), ON_CONNECTED | ON_DISCONNECTED | ON_ERROR) {
                    warn!("Dropping inbound event with reserved name '{}'", name);
                    self.metrics.increment_dropped();
                } else {
                    self.dispatcher.dispatch(&self.channel, &name, &payload);
                }
            }
            SocketPacket::Error { namespace, payload } => {
                if self.is_own_namespace(&namespace) {
                    warn!("Server error on {}: {}", namespace, payload);
                    self.dispatcher.dispatch(&self.channel, ON_ERROR, &payload);
                }
            }
            SocketPacket::Disconnect { namespace } => {
                if self.is_own_namespace(&namespace) {
                    self.connection_lost(generation, "server disconnected the namespace");
                    return false;
                }
            }
            SocketPacket::Connect { namespace } => debug!("Namespace {} connected", namespace),
            SocketPacket::Ack { namespace, id } => {
                debug!("Ignoring ack {} on {}", id, namespace)
            }
        }
        true
    }

    fn is_own_namespace(&self, namespace: &str) -> bool {
        namespace == self.channel.namespace()
    }
}

/// Reader side of one generation
///
/// Exits on the close signal or on the first read failure; a failure is
/// reported once through `connection_lost` and never retried here.
pub(crate) async fn inbound_loop(
    shared: Arc<ClientShared>,
    generation: u64,
    mut reader: Box<dyn MessageReader>,
    mut close_rx: watch::Receiver<bool>,
) {
    debug!("Inbound loop started for generation {}", generation);

    loop {
        let frame = tokio::select! {
            biased;
            _ = close_rx.changed() => {
                debug!("Inbound loop received close signal");
                break;
            }
            frame = reader.read_message() => frame,
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                shared.connection_lost(generation, &e.to_string());
                break;
            }
        };
        shared.metrics.increment_received();

        let packet = match protocol::decode(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Dropping frame: {}", e);
                shared.metrics.increment_dropped();
                continue;
            }
        };

        if !shared.route(generation, packet) {
            break;
        }
    }

    debug!("Inbound loop exiting (generation {})", generation);
}

/// Writer side of one generation; the only task that writes to the session
///
/// Messages still queued when the close signal arrives are discarded.
pub(crate) async fn outbound_loop(
    shared: Arc<ClientShared>,
    generation: u64,
    mut writer: Box<dyn MessageWriter>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut close_rx: watch::Receiver<bool>,
) {
    debug!("Outbound loop started for generation {}", generation);

    loop {
        let message = tokio::select! {
            biased;
            _ = close_rx.changed() => {
                debug!("Outbound loop received close signal");
                break;
            }
            message = outbound_rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        trace!("Writing: {}", message);
        if let Err(e) = writer.write_message(message).await {
            shared.connection_lost(generation, &e.to_string());
            break;
        }
        shared.metrics.increment_sent();
    }

    if let Err(e) = writer.close().await {
        trace!("Writer close: {}", e);
    }
    debug!("Outbound loop exiting (generation {})", generation);
}

/// socket.io client handle
///
/// Created by [`connect`], [`connect_with_namespace`] or the builder.
/// Registrations made with [`Client::on`] live as long as the client and keep
/// firing across reconnects. Dropping the client stops it without waiting for
/// its tasks; call [`Client::close`] for an orderly shutdown.
pub struct Client {
    shared: Arc<ClientShared>,
}

impl Client {
    /// Dial, open the first generation and arm the reconnection supervisor
    ///
    /// `handlers` are registered before dialing so the first `connected` is
    /// delivered to them.
    pub(crate) async fn connect(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        handlers: Vec<(String, Handler)>,
    ) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(AtomicMetrics::new());
        let namespace = config.namespace().unwrap_or(DEFAULT_NAMESPACE).to_string();
        let channel = Channel::new(&namespace, Arc::clone(&config.shutdown_flag));
        let dispatcher = Dispatcher::new();
        for (event, handler) in handlers {
            dispatcher.register(event, handler);
        }

        let shared = Arc::new(ClientShared {
            config,
            transport,
            channel,
            dispatcher,
            metrics,
        });
        supervisor::install(&shared);

        info!("Connecting to {}", shared.config.url());
        let connection = shared.dial().await?;
        shared.start(connection).await?;

        Ok(Self { shared })
    }

    /// Register `handler` for `event`
    ///
    /// Besides application event names, `connected`, `disconnected` (payload:
    /// reason string) and `error` can be observed.
    pub fn on<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(&Channel, &Value) -> Result<()> + Send + Sync + 'static,
    {
        self.shared.dispatcher.on(event, handler);
    }

    /// Queue a raw frame; fails with `ChannelClosed` unless connected
    pub fn send(&self, message: impl Into<String>) -> Result<()> {
        self.shared.channel.send(message)
    }

    /// Queue an EVENT frame on the client's namespace
    pub fn emit(&self, event: &str, payload: &Value) -> Result<()> {
        self.shared.channel.emit(event, payload)
    }

    /// Graceful shutdown; safe to call more than once
    ///
    /// Stops reconnection for good, waits for the current generation's tasks
    /// and dispatches `disconnected` if the client was connected.
    pub async fn close(&self) {
        if self.shared.channel.close().await {
            self.shared
                .dispatcher
                .fire_disconnected(&self.shared.channel, "client closed");
        }
    }

    #[inline]
    pub fn state(&self) -> ChannelState {
        self.shared.channel.state()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Open
    }

    pub fn supervisor_state(&self) -> SupervisorState {
        self.shared.channel.supervisor_state()
    }

    pub fn metrics(&self) -> Metrics {
        self.shared.metrics.snapshot(self.state())
    }

    pub fn channel(&self) -> &Channel {
        &self.shared.channel
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// The flag checked before every reconnection attempt
    ///
    /// Storing `false` stops reconnection without closing the live connection.
    pub fn shutdown_flag(&self) -> &Arc<AtomicBool> {
        &self.shared.config.shutdown_flag
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.shared.config.url())
            .field("channel", &self.shared.channel)
            .finish()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shared.channel.abandon();
    }
}

/// Connect to `url` on the default namespace
pub async fn connect<T: Transport>(url: &str, transport: T) -> Result<Client> {
    Client::connect(ClientConfig::new(url), Arc::new(transport), Vec::new()).await
}

/// Connect to `url` and open `namespace` on every dial
pub async fn connect_with_namespace<T: Transport>(
    url: &str,
    namespace: &str,
    transport: T,
) -> Result<Client> {
    let mut config = ClientConfig::new(url);
    config.namespace = Some(protocol::normalize_namespace(namespace));
    Client::connect(config, Arc::new(transport), Vec::new()).await
}
