//! Wire envelope codec
//!
//! Frames are engine.io text packets. The first character is the engine.io
//! packet type; MESSAGE packets (`4`) carry a socket.io packet whose first
//! character is the socket.io packet type, followed by an optional namespace,
//! an optional ack id and a JSON body:
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,"pingTimeout":60000}   OPEN (handshake)
//! 2 / 3                                                    PING / PONG
//! 40/chat                                                  socket.io CONNECT
//! 42/chat,["message",{"text":"hi"}]                        socket.io EVENT
//! ```

use crate::traits::{Result, SocketError};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const WEBSOCKET_PROTOCOL: &str = "ws://";
pub const WEBSOCKET_SECURE_PROTOCOL: &str = "wss://";
/// Fixed query identifying engine.io protocol 3 over websocket
pub const SOCKETIO_PATH: &str = "/socket.io/?EIO=3&transport=websocket";

pub const PING: &str = "2";
pub const PONG: &str = "3";

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "/";

/// engine.io packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Open = 0,
    Close = 1,
    Ping = 2,
    Pong = 3,
    Message = 4,
    Upgrade = 5,
    Noop = 6,
}

impl MessageType {
    fn from_digit(digit: u8) -> Option<Self> {
        Some(match digit {
            b'0' => MessageType::Open,
            b'1' => MessageType::Close,
            b'2' => MessageType::Ping,
            b'3' => MessageType::Pong,
            b'4' => MessageType::Message,
            b'5' => MessageType::Upgrade,
            b'6' => MessageType::Noop,
            _ => return None,
        })
    }
}

/// socket.io packet types (inside an engine.io MESSAGE)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Connect = 0,
    Disconnect = 1,
    Event = 2,
    Ack = 3,
    Error = 4,
    BinaryEvent = 5,
    BinaryAck = 6,
}

impl PacketType {
    fn from_digit(digit: u8) -> Option<Self> {
        Some(match digit {
            b'0' => PacketType::Connect,
            b'1' => PacketType::Disconnect,
            b'2' => PacketType::Event,
            b'3' => PacketType::Ack,
            b'4' => PacketType::Error,
            b'5' => PacketType::BinaryEvent,
            b'6' => PacketType::BinaryAck,
            _ => return None,
        })
    }
}

/// Session parameters sent by the server in the OPEN packet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds
    pub ping_interval: u64,
    /// Milliseconds
    pub ping_timeout: u64,
}

impl Handshake {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout)
    }
}

/// Decoded engine.io packet
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

impl Packet {
    pub fn message_type(&self) -> MessageType {
        match self {
            Packet::Open(_) => MessageType::Open,
            Packet::Close => MessageType::Close,
            Packet::Ping => MessageType::Ping,
            Packet::Pong => MessageType::Pong,
            Packet::Message(_) => MessageType::Message,
            Packet::Upgrade => MessageType::Upgrade,
            Packet::Noop => MessageType::Noop,
        }
    }
}

/// Decoded socket.io packet
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { namespace: String },
    Disconnect { namespace: String },
    /// `payload` is `Null` without arguments, the argument itself for one,
    /// and an array for several
    Event {
        namespace: String,
        name: String,
        payload: Value,
    },
    Ack { namespace: String, id: u64 },
    Error { namespace: String, payload: Value },
}

/// Build the canonical websocket endpoint for a socket.io server
pub fn get_url(host: &str, port: u16, secure: bool) -> String {
    let prefix = if secure {
        WEBSOCKET_SECURE_PROTOCOL
    } else {
        WEBSOCKET_PROTOCOL
    };
    format!("{prefix}{host}:{port}{SOCKETIO_PATH}")
}

/// `"chat"` and `"/chat"` both become `"/chat"`; empty becomes `"/"`
pub fn normalize_namespace(namespace: &str) -> String {
    let trimmed = namespace.trim();
    if trimmed.is_empty() {
        DEFAULT_NAMESPACE.to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Namespace-open handshake frame
pub fn encode_open(namespace: &str) -> String {
    let namespace = normalize_namespace(namespace);
    if namespace == DEFAULT_NAMESPACE {
        format!("{}{}", MessageType::Message as u8, PacketType::Connect as u8)
    } else {
        format!(
            "{}{}{}",
            MessageType::Message as u8,
            PacketType::Connect as u8,
            namespace
        )
    }
}

/// EVENT frame carrying `payload` as the single argument
pub fn encode_event(namespace: &str, event: &str, payload: &Value) -> String {
    let body = if payload.is_null() {
        Value::Array(vec![Value::String(event.to_string())])
    } else {
        Value::Array(vec![Value::String(event.to_string()), payload.clone()])
    };

    let namespace = normalize_namespace(namespace);
    let prefix = if namespace == DEFAULT_NAMESPACE {
        String::new()
    } else {
        format!("{namespace},")
    };

    format!(
        "{}{}{}{}",
        MessageType::Message as u8,
        PacketType::Event as u8,
        prefix,
        body
    )
}

/// Decode one inbound frame
pub fn decode(frame: &str) -> Result<Packet> {
    let Some(&first) = frame.as_bytes().first() else {
        return Err(SocketError::Decode("empty frame".into()));
    };
    let message_type = MessageType::from_digit(first)
        .ok_or_else(|| SocketError::Decode(format!("unknown packet type in {frame:?}")))?;
    let rest = &frame[1..];

    Ok(match message_type {
        MessageType::Open => {
            let handshake: Handshake = serde_json::from_str(rest)
                .map_err(|e| SocketError::Decode(format!("bad handshake: {e}")))?;
            Packet::Open(handshake)
        }
        MessageType::Close => Packet::Close,
        MessageType::Ping => Packet::Ping,
        MessageType::Pong => Packet::Pong,
        MessageType::Message => Packet::Message(decode_socket_packet(rest)?),
        MessageType::Upgrade => Packet::Upgrade,
        MessageType::Noop => Packet::Noop,
    })
}

fn decode_socket_packet(body: &str) -> Result<SocketPacket> {
    let Some(&first) = body.as_bytes().first() else {
        return Err(SocketError::Decode("empty socket.io packet".into()));
    };
    let packet_type = PacketType::from_digit(first)
        .ok_or_else(|| SocketError::Decode(format!("unknown socket.io packet type in {body:?}")))?;
    let rest = &body[1..];

    let (namespace, rest) = split_namespace(rest);

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let (id, data) = rest.split_at(digits);
    let ack_id = if id.is_empty() {
        None
    } else {
        Some(
            id.parse::<u64>()
                .map_err(|e| SocketError::Decode(format!("bad ack id: {e}")))?,
        )
    };

    match packet_type {
        PacketType::Connect => Ok(SocketPacket::Connect { namespace }),
        PacketType::Disconnect => Ok(SocketPacket::Disconnect { namespace }),
        PacketType::Event => {
            let (name, payload) = decode_event_body(data)?;
            Ok(SocketPacket::Event {
                namespace,
                name,
                payload,
            })
        }
        PacketType::Ack => {
            let id = ack_id.ok_or_else(|| SocketError::Decode("ack without id".into()))?;
            Ok(SocketPacket::Ack { namespace, id })
        }
        PacketType::Error => {
            let payload = if data.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(data).unwrap_or_else(|_| Value::String(data.to_string()))
            };
            Ok(SocketPacket::Error { namespace, payload })
        }
        PacketType::BinaryEvent | PacketType::BinaryAck => {
            Err(SocketError::Decode("binary packets are not supported".into()))
        }
    }
}

fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return (DEFAULT_NAMESPACE.to_string(), rest);
    }
    match rest.find(',') {
        Some(idx) => (rest[..idx].to_string(), &rest[idx + 1..]),
        None => (rest.to_string(), ""),
    }
}

fn decode_event_body(data: &str) -> Result<(String, Value)> {
    let value: Value = serde_json::from_str(data)
        .map_err(|e| SocketError::Decode(format!("bad event body: {e}")))?;
    let Value::Array(mut items) = value else {
        return Err(SocketError::Decode("event body is not an array".into()));
    };
    if items.is_empty() {
        return Err(SocketError::Decode("event without name".into()));
    }
    let Value::String(name) = items.remove(0) else {
        return Err(SocketError::Decode("event name is not a string".into()));
    };

    let payload = match items.len() {
        0 => Value::Null,
        1 => items.remove(0),
        _ => Value::Array(items),
    };
    Ok((name, payload))
}
