//! Websocket transport built on tokio-tungstenite
//!
//! Text frames carry engine.io packets. Binary frames are skipped, and
//! websocket-level ping/pong is answered by tungstenite itself. A close frame
//! or the end of the stream is reported as an I/O error, which the inbound
//! loop turns into a disconnect.

use crate::traits::*;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{http, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct WebSocketTransport {
    headers: Option<Arc<dyn HeaderProvider>>,
    connect_timeout: Duration,
    receive_timeout: Duration,
    send_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self {
            headers: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Headers for the upgrade request, regenerated on every dial
    pub fn with_headers<H: HeaderProvider + 'static>(mut self, provider: H) -> Self {
        self.headers = Some(Arc::new(provider));
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Longest silence tolerated on a read before the connection counts as dead
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    async fn build_request(&self, url: &str) -> Result<http::Request<()>> {
        let mut request = url
            .into_client_request()
            .map_err(|e| SocketError::TransportConnect(format!("invalid URL {url}: {e}")))?;

        if let Some(ref provider) = self.headers {
            for (key, value) in provider.get_headers().await {
                match key.parse::<http::header::HeaderName>() {
                    Ok(name) => match value.parse::<http::header::HeaderValue>() {
                        Ok(value) => {
                            request.headers_mut().insert(name, value);
                        }
                        Err(_) => warn!("Invalid header value for key '{}': {}", key, value),
                    },
                    Err(_) => warn!("Invalid header name: {}", key),
                }
            }
            debug!("Connecting with custom headers");
        }

        Ok(request)
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("has_headers", &self.headers.is_some())
            .field("connect_timeout", &self.connect_timeout)
            .field("receive_timeout", &self.receive_timeout)
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<Connection> {
        let request = self.build_request(url).await?;

        let (stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| SocketError::TransportConnect(format!("timed out connecting to {url}")))?
            .map_err(|e| SocketError::TransportConnect(e.to_string()))?;
        debug!("Websocket connected to {}", url);

        let (sink, stream) = stream.split();
        Ok(Connection::new(
            WsReader {
                stream,
                timeout: self.receive_timeout,
            },
            WsWriter {
                sink,
                timeout: self.send_timeout,
            },
        ))
    }
}

struct WsReader {
    stream: SplitStream<WsStream>,
    timeout: Duration,
}

#[async_trait]
impl MessageReader for WsReader {
    async fn read_message(&mut self) -> Result<String> {
        loop {
            let next = tokio::time::timeout(self.timeout, self.stream.next())
                .await
                .map_err(|_| SocketError::TransportIo("receive timed out".into()))?;

            match next {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Binary(data))) => {
                    warn!("Skipping {} byte binary frame", data.len());
                }
                Some(Ok(Message::Close(frame))) => {
                    return Err(SocketError::TransportIo(format!(
                        "websocket closed by peer: {frame:?}"
                    )));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    trace!("Control frame");
                }
                Some(Err(e)) => return Err(SocketError::TransportIo(e.to_string())),
                None => return Err(SocketError::TransportIo("websocket stream ended".into())),
            }
        }
    }
}

struct WsWriter {
    sink: SplitSink<WsStream, Message>,
    timeout: Duration,
}

#[async_trait]
impl MessageWriter for WsWriter {
    async fn write_message(&mut self, message: String) -> Result<()> {
        tokio::time::timeout(self.timeout, self.sink.send(Message::Text(message)))
            .await
            .map_err(|_| SocketError::TransportIo("send timed out".into()))?
            .map_err(|e| SocketError::TransportIo(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.sink
            .close()
            .await
            .map_err(|e| SocketError::TransportIo(e.to_string()))
    }
}
