//! # sockio
//!
//! Connection-lifecycle core of a socket.io (engine.io v3) realtime client.
//!
//! ## Features
//!
//! - **One logical channel**: sends are queued FIFO and written by a single task
//! - **Event dispatch**: named handlers, plus `connected`, `disconnected` and `error`
//! - **Heartbeat**: engine.io ping on the server's interval, optional pong timeout
//! - **Automatic reconnection**: pluggable strategy, namespace replayed on every dial
//! - **Pluggable transport**: tokio-tungstenite websocket by default

pub mod core;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use core::{
    builder, channel, client, config, dispatcher, metrics, protocol, websocket,
    builder::{states, ClientBuilder},
    channel::{Channel, ChannelState, SupervisorState},
    client::{connect, connect_with_namespace, Client},
    config::ClientConfig,
    dispatcher::{Dispatcher, Handler, ON_CONNECTED, ON_DISCONNECTED, ON_ERROR},
    metrics::{AtomicMetrics, Metrics},
    protocol::get_url,
    websocket::WebSocketTransport,
};
