//! Transport abstraction
//!
//! A transport opens a message-oriented connection to a URL. The connection
//! is handed to the channel as a pair of halves so that exactly one task reads
//! and exactly one task writes:
//!
//! ```text
//! Transport::connect(url) ──> Connection ──split──> MessageReader ──> Inbound Loop
//!                                               └──> MessageWriter ──> Outbound Loop
//! ```

use crate::traits::error::Result;
use async_trait::async_trait;

/// Receiving half of a connection
#[async_trait]
pub trait MessageReader: Send + 'static {
    /// Wait for the next whole text message
    ///
    /// Any error means the connection is unusable and is reported as a
    /// disconnect by the caller.
    async fn read_message(&mut self) -> Result<String>;
}

/// Sending half of a connection
#[async_trait]
pub trait MessageWriter: Send + 'static {
    /// Write one whole text message
    async fn write_message(&mut self, message: String) -> Result<()>;

    /// Release the underlying session
    ///
    /// Errors are ignored by callers, the session may already be gone.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One established transport session
pub struct Connection {
    reader: Box<dyn MessageReader>,
    writer: Box<dyn MessageWriter>,
}

impl Connection {
    pub fn new(reader: impl MessageReader, writer: impl MessageWriter) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Write directly on the session, before it is handed to a channel
    ///
    /// Used for the namespace-open handshake.
    pub async fn write_message(&mut self, message: String) -> Result<()> {
        self.writer.write_message(message).await
    }

    /// Release the session without ever opening a channel on it
    pub async fn close(mut self) {
        let _ = self.writer.close().await;
    }

    pub fn into_split(self) -> (Box<dyn MessageReader>, Box<dyn MessageWriter>) {
        (self.reader, self.writer)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Factory for connections
///
/// Called once at initial connect and once per reconnection attempt.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Connection>;
}
