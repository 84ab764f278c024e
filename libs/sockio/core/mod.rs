//! # sockio core
//!
//! Connection lifecycle of a socket.io client: one [`Channel`] per client,
//! replaced generation by generation, a [`Dispatcher`] that outlives every
//! generation, and the tasks that drive them.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sockio::core::protocol::get_url;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> sockio::Result<()> {
//!     let client = sockio::builder()
//!         .url(get_url("localhost", 3000, false))
//!         .namespace("/chat")
//!         .on("connected", |channel, _| channel.emit("join", &"lobby".into()))
//!         .on("message", |_, payload| {
//!             println!("message: {payload}");
//!             Ok(())
//!         })
//!         .heartbeat(Duration::from_secs(25))
//!         .connect()
//!         .await?;
//!
//!     client.emit("message", &"hello".into())?;
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod channel;
pub mod client;
pub mod config;
pub mod dispatcher;
pub(crate) mod heartbeat;
pub mod metrics;
pub mod pong_tracker;
pub mod protocol;
pub(crate) mod supervisor;
pub mod websocket;

// Re-export main types
pub use builder::{states, ClientBuilder};
pub use channel::{Channel, ChannelState, SupervisorState};
pub use client::{connect, connect_with_namespace, Client};
pub use config::{ClientConfig, DEFAULT_HEARTBEAT_INTERVAL};
pub use dispatcher::{Dispatcher, Handler, ON_CONNECTED, ON_DISCONNECTED, ON_ERROR};
pub use metrics::{AtomicMetrics, Metrics};
pub use pong_tracker::PongTracker;
pub use protocol::get_url;
pub use websocket::WebSocketTransport;

// Re-export traits for convenience
pub use crate::traits::*;

/// Start building a client
///
/// # Example
/// ```ignore
/// let client = sockio::builder()
///     .url("ws://localhost:3000/socket.io/?EIO=3&transport=websocket")
///     .on("news", |_, payload| {
///         println!("{payload}");
///         Ok(())
///     })
///     .connect()
///     .await?;
/// ```
pub fn builder() -> ClientBuilder<states::NoUrl> {
    ClientBuilder::new()
}
