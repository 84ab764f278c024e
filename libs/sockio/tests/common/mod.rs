//! Common test utilities for sockio integration tests
//!
//! - `MockTransport`: in-memory endpoint whose reachability, sessions and
//!   written frames are controlled and observed by the test
//! - `MockSocketIoServer`: real websocket server speaking enough engine.io
//!   for the websocket transport
//! - `EventLog`: records dispatched events

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use sockio::{Channel, Connection, MessageReader, MessageWriter, Result, SocketError, Transport};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Route library logs to the test output when TEST_VERBOSE is set
///
/// `RUST_LOG` narrows or widens the filter (default `sockio=debug`). Safe to
/// call from every test; only the first call installs the subscriber.
pub fn init_test_tracing() {
    if std::env::var("TEST_VERBOSE").is_err() {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sockio=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ============================================================================
// In-memory transport
// ============================================================================

struct Session {
    inbound: mpsc::UnboundedSender<String>,
    alive: Arc<AtomicBool>,
}

#[derive(Default)]
struct EndpointState {
    unreachable: AtomicBool,
    reject_namespace_open: AtomicBool,
    dials: AtomicUsize,
    closed_writers: AtomicUsize,
    written: Mutex<Vec<String>>,
    sessions: Mutex<Vec<Session>>,
}

/// Transport to an in-memory endpoint
///
/// Clones share the endpoint, so a test keeps one handle and gives another
/// to the client.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<EndpointState>,
}

impl MockTransport {
    pub fn new() -> Self {
        init_test_tracing();
        Self::default()
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Make every namespace-open write (`40...`) fail
    pub fn reject_namespace_open(&self, reject: bool) {
        self.state.reject_namespace_open.store(reject, Ordering::SeqCst);
    }

    /// Drop every live session; readers see a reset and writers fail
    pub fn kill(&self) {
        for session in self.state.sessions.lock().drain(..) {
            session.alive.store(false, Ordering::SeqCst);
        }
    }

    /// Deliver `frame` to the most recent live session
    pub fn push_inbound(&self, frame: impl Into<String>) -> bool {
        let sessions = self.state.sessions.lock();
        match sessions
            .iter()
            .rev()
            .find(|session| session.alive.load(Ordering::SeqCst))
        {
            Some(session) => session.inbound.send(frame.into()).is_ok(),
            None => false,
        }
    }

    /// Every frame written by any session, in write order
    pub fn written(&self) -> Vec<String> {
        self.state.written.lock().clone()
    }

    /// Written frames without heartbeat traffic
    pub fn written_frames(&self) -> Vec<String> {
        self.written()
            .into_iter()
            .filter(|frame| frame != "2" && frame != "3")
            .collect()
    }

    pub fn dial_count(&self) -> usize {
        self.state.dials.load(Ordering::SeqCst)
    }

    pub fn closed_writers(&self) -> usize {
        self.state.closed_writers.load(Ordering::SeqCst)
    }

    pub fn live_sessions(&self) -> usize {
        self.state
            .sessions
            .lock()
            .iter()
            .filter(|session| session.alive.load(Ordering::SeqCst))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str) -> Result<Connection> {
        self.state.dials.fetch_add(1, Ordering::SeqCst);
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(SocketError::TransportConnect(format!("{url} unreachable")));
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));
        self.state.sessions.lock().push(Session {
            inbound: inbound_tx,
            alive: Arc::clone(&alive),
        });

        Ok(Connection::new(
            MockReader { inbound: inbound_rx },
            MockWriter {
                state: Arc::clone(&self.state),
                alive,
            },
        ))
    }
}

struct MockReader {
    inbound: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl MessageReader for MockReader {
    async fn read_message(&mut self) -> Result<String> {
        self.inbound
            .recv()
            .await
            .ok_or_else(|| SocketError::TransportIo("connection reset".into()))
    }
}

struct MockWriter {
    state: Arc<EndpointState>,
    alive: Arc<AtomicBool>,
}

#[async_trait]
impl MessageWriter for MockWriter {
    async fn write_message(&mut self, message: String) -> Result<()> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(SocketError::TransportIo("broken pipe".into()));
        }
        if message.starts_with("40") && self.state.reject_namespace_open.load(Ordering::SeqCst) {
            return Err(SocketError::TransportIo("namespace open rejected".into()));
        }
        self.state.written.lock().push(message);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.alive.store(false, Ordering::SeqCst);
        self.state.closed_writers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Event recording
// ============================================================================

/// Records `(event, payload)` pairs in dispatch order
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<(String, Value)>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that appends `event` to this log
    pub fn recorder(
        &self,
        event: &str,
    ) -> impl Fn(&Channel, &Value) -> Result<()> + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        let event = event.to_string();
        move |_, payload| {
            events.lock().push((event.clone(), payload.clone()));
            Ok(())
        }
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|(name, _)| name == event).count()
    }

    pub fn payloads(&self, event: &str) -> Vec<Value> {
        self.events
            .lock()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(|(name, _)| name.clone()).collect()
    }
}

// ============================================================================
// Websocket server
// ============================================================================

pub const HANDSHAKE: &str =
    r#"0{"sid":"test-sid","upgrades":[],"pingInterval":25000,"pingTimeout":5000}"#;

#[derive(Clone, Debug)]
enum ServerCommand {
    Push(String),
    Kill,
}

/// A minimal socket.io websocket server for testing
///
/// Sends the engine.io handshake and `40` on accept, answers `2` with `3`,
/// and records every other text frame it receives.
pub struct MockSocketIoServer {
    pub addr: SocketAddr,
    accepting: Arc<AtomicBool>,
    commands: broadcast::Sender<ServerCommand>,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
}

impl MockSocketIoServer {
    pub async fn start() -> Self {
        init_test_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepting = Arc::new(AtomicBool::new(true));
        let (commands, _) = broadcast::channel(64);
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        {
            let accepting = Arc::clone(&accepting);
            let commands = commands.clone();
            let received = Arc::clone(&received);
            let connections = Arc::clone(&connections);

            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    if !accepting.load(Ordering::SeqCst) {
                        drop(stream);
                        continue;
                    }
                    connections.fetch_add(1, Ordering::SeqCst);
                    let commands = commands.subscribe();
                    let received = Arc::clone(&received);
                    tokio::spawn(Self::handle_connection(stream, commands, received));
                }
            });
        }

        Self {
            addr,
            accepting,
            commands,
            received,
            connections,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        mut commands: broadcast::Receiver<ServerCommand>,
        received: Arc<Mutex<Vec<String>>>,
    ) {
        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };
        let (mut write, mut read) = ws_stream.split();

        for greeting in [HANDSHAKE, "40"] {
            if write.send(Message::Text(greeting.to_string())).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if text == "2" {
                                if write.send(Message::Text("3".to_string())).await.is_err() {
                                    break;
                                }
                            } else {
                                received.lock().push(text);
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                command = commands.recv() => {
                    match command {
                        Ok(ServerCommand::Push(frame)) => {
                            if write.send(Message::Text(frame)).await.is_err() {
                                break;
                            }
                        }
                        Ok(ServerCommand::Kill) | Err(_) => break,
                    }
                }
            }
        }
    }

    /// socket.io endpoint URL for this server
    pub fn url(&self) -> String {
        sockio::get_url("127.0.0.1", self.addr.port(), false)
    }

    /// Refuse (drop) new connections while `false`
    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    /// Send `frame` to every connected client
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.commands.send(ServerCommand::Push(frame.into()));
    }

    /// Drop every open connection without a close frame
    pub fn kill_connections(&self) {
        let _ = self.commands.send(ServerCommand::Kill);
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}
