//! # sockio traits
//!
//! Seams between the connection core and the outside world:
//!
//! - **Transport**: open a message-oriented session (`Connection`)
//! - **HeaderProvider**: upgrade-request headers for the websocket transport
//! - **ReconnectionStrategy**: pacing and cap of redial attempts
//! - **SocketError**: the error taxonomy shared by every module

pub mod error;
pub mod headers;
pub mod reconnect;
pub mod transport;

pub use error::{Result, SocketError};
pub use headers::{HeaderProvider, Headers, StaticHeaders};
pub use reconnect::{
    ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy,
    DEFAULT_RECONNECT_INTERVAL,
};
pub use transport::{Connection, MessageReader, MessageWriter, Transport};
