use thiserror::Error;

/// Main error type for sockio
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SocketError {
    /// Opening a transport connection failed (recoverable, drives retry)
    #[error("Transport connect error: {0}")]
    TransportConnect(String),

    /// Read or write failed on an established connection
    #[error("Transport I/O error: {0}")]
    TransportIo(String),

    /// Operation attempted on a channel that is not open
    #[error("Channel closed")]
    ChannelClosed,

    /// Inbound frame could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// An event handler returned an error or panicked
    #[error("Handler error for event '{event}': {reason}")]
    Handler { event: String, reason: String },

    /// The reconnection strategy gave up
    #[error("Reconnection failed after {attempts} attempts")]
    ReconnectionFailed { attempts: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SocketError {
    /// Errors that are expected to clear up by dialing again
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SocketError::TransportConnect(_) | SocketError::TransportIo(_) | SocketError::Decode(_)
        )
    }
}

/// Result type for sockio operations
pub type Result<T> = std::result::Result<T, SocketError>;
