//! Integration tests for connection lifecycle
//!
//! These tests drive a client over the in-memory transport: connect, send,
//! inbound dispatch and close.

mod common;

use common::{eventually, EventLog, MockTransport};
use serde_json::{json, Value};
use sockio::{ChannelState, FixedDelay, SocketError, ON_CONNECTED, ON_DISCONNECTED, ON_ERROR};
use std::time::Duration;

const URL: &str = "ws://localhost:3000/socket.io/?EIO=3&transport=websocket";
const WAIT: Duration = Duration::from_secs(2);

async fn connect_logged(transport: &MockTransport, log: &EventLog) -> sockio::Client {
    sockio::builder()
        .url(URL)
        .transport(transport.clone())
        .reconnect_strategy(FixedDelay::new(Duration::from_millis(50), None))
        .on(ON_CONNECTED, log.recorder(ON_CONNECTED))
        .on(ON_DISCONNECTED, log.recorder(ON_DISCONNECTED))
        .on(ON_ERROR, log.recorder(ON_ERROR))
        .connect()
        .await
        .expect("connect failed")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connect_fires_connected_once_and_delivers_send() {
    verbose_println!("Testing connect + send...");

    let transport = MockTransport::new();
    let log = EventLog::new();
    let client = connect_logged(&transport, &log).await;

    assert!(client.is_connected());
    assert_eq!(log.count(ON_CONNECTED), 1);
    assert_eq!(log.names().first().map(String::as_str), Some(ON_CONNECTED));

    client.send("ping-app").unwrap();
    assert!(eventually(WAIT, || !transport.written_frames().is_empty()).await);
    assert_eq!(transport.written_frames(), vec!["ping-app"]);

    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connect_helper_without_builder() {
    let transport = MockTransport::new();
    let client = sockio::connect(URL, transport.clone()).await.unwrap();

    assert_eq!(client.state(), ChannelState::Open);
    assert_eq!(client.channel().namespace(), "/");
    assert_eq!(transport.dial_count(), 1);
    // no namespace, so nothing is written on connect
    assert!(transport.written().is_empty());

    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sends_are_written_in_order() {
    verbose_println!("Testing FIFO delivery...");

    let transport = MockTransport::new();
    let client = sockio::connect(URL, transport.clone()).await.unwrap();

    let expected: Vec<String> = (0..200).map(|i| format!("msg-{i}")).collect();
    for message in &expected {
        client.send(message.clone()).unwrap();
    }

    assert!(eventually(WAIT, || transport.written_frames().len() == expected.len()).await);
    assert_eq!(transport.written_frames(), expected);
    assert_eq!(client.metrics().messages_sent, expected.len() as u64);

    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_senders_keep_their_own_order() {
    let transport = MockTransport::new();
    let client = std::sync::Arc::new(sockio::connect(URL, transport.clone()).await.unwrap());

    let mut tasks = Vec::new();
    for sender in 0..4 {
        let client = std::sync::Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            for i in 0..50 {
                client.send(format!("{sender}:{i}")).unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert!(eventually(WAIT, || transport.written_frames().len() == 200).await);
    let written = transport.written_frames();
    for sender in 0..4 {
        let prefix = format!("{sender}:");
        let sequence: Vec<u32> = written
            .iter()
            .filter_map(|frame| frame.strip_prefix(&prefix))
            .map(|i| i.parse().unwrap())
            .collect();
        assert_eq!(sequence, (0..50).collect::<Vec<_>>());
    }

    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_close_is_idempotent_and_rejects_sends() {
    verbose_println!("Testing close...");

    let transport = MockTransport::new();
    let log = EventLog::new();
    let client = connect_logged(&transport, &log).await;

    client.close().await;
    client.close().await;

    assert_eq!(client.state(), ChannelState::Closed);
    assert_eq!(log.count(ON_DISCONNECTED), 1);
    assert_eq!(log.payloads(ON_DISCONNECTED), vec![json!("client closed")]);
    assert_eq!(transport.closed_writers(), 1);

    for _ in 0..3 {
        assert_eq!(client.send("late"), Err(SocketError::ChannelClosed));
        assert_eq!(client.emit("late", &Value::Null), Err(SocketError::ChannelClosed));
    }

    // an intentional close never triggers reconnection
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(transport.dial_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_inbound_events_dispatch_in_wire_order() {
    verbose_println!("Testing inbound dispatch...");

    let transport = MockTransport::new();
    let log = EventLog::new();
    let client = connect_logged(&transport, &log).await;
    client.on("news", log.recorder("news"));
    client.on("news", log.recorder("news-second"));

    transport.push_inbound(r#"42["news",1]"#);
    transport.push_inbound(r#"42["news",{"title":"two"}]"#);
    transport.push_inbound(r#"42["news","a","b"]"#);

    assert!(eventually(WAIT, || log.count("news-second") == 3).await);
    assert_eq!(
        log.payloads("news"),
        vec![json!(1), json!({"title": "two"}), json!(["a", "b"])]
    );

    let names: Vec<String> = log
        .names()
        .into_iter()
        .filter(|name| name.starts_with("news"))
        .collect();
    assert_eq!(
        names,
        vec!["news", "news-second", "news", "news-second", "news", "news-second"]
    );

    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_and_reserved_frames_are_dropped() {
    let transport = MockTransport::new();
    let log = EventLog::new();
    let client = connect_logged(&transport, &log).await;
    client.on("after", log.recorder("after"));

    transport.push_inbound("x-not-a-packet");
    transport.push_inbound("42{not json");
    transport.push_inbound(r#"42["connected"]"#);
    transport.push_inbound(r#"42["disconnected","fake"]"#);
    transport.push_inbound(r#"42/other,["after"]"#);
    transport.push_inbound(r#"42["after"]"#);

    assert!(eventually(WAIT, || log.count("after") == 1).await);
    assert_eq!(log.count(ON_CONNECTED), 1);
    assert_eq!(log.count(ON_DISCONNECTED), 0);
    assert!(client.is_connected());

    let metrics = client.metrics();
    assert_eq!(metrics.messages_received, 6);
    assert_eq!(metrics.dropped_frames, 5);

    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_ping_is_answered_and_handshake_recorded() {
    let transport = MockTransport::new();
    let client = sockio::connect(URL, transport.clone()).await.unwrap();

    transport.push_inbound(common::HANDSHAKE);
    transport.push_inbound("2");

    assert!(eventually(WAIT, || transport.written().contains(&"3".to_string())).await);
    let handshake = client.channel().handshake().expect("handshake recorded");
    assert_eq!(handshake.sid, "test-sid");
    assert_eq!(handshake.ping_interval(), Duration::from_secs(25));

    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_handler_failure_surfaces_as_error_event() {
    let transport = MockTransport::new();
    let log = EventLog::new();
    let client = connect_logged(&transport, &log).await;

    client.on("boom", |_, _| Err(SocketError::Decode("cannot handle".into())));
    client.on("boom", |_, _| panic!("handler panicked"));
    client.on("boom", log.recorder("boom"));

    transport.push_inbound(r#"42["boom"]"#);

    assert!(eventually(WAIT, || log.count(ON_ERROR) == 2).await);
    assert_eq!(log.count("boom"), 1);
    assert!(client.is_connected());

    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_error_packet_dispatches_error() {
    let transport = MockTransport::new();
    let log = EventLog::new();
    let client = connect_logged(&transport, &log).await;

    transport.push_inbound(r#"44"Not authorized""#);

    assert!(eventually(WAIT, || log.count(ON_ERROR) == 1).await);
    assert_eq!(log.payloads(ON_ERROR), vec![json!("Not authorized")]);

    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_handler_can_reply_through_channel() {
    let transport = MockTransport::new();
    let client = sockio::connect(URL, transport.clone()).await.unwrap();
    client.on("question", |channel, payload| channel.emit("answer", payload));

    transport.push_inbound(r#"42["question",42]"#);

    assert!(eventually(WAIT, || !transport.written_frames().is_empty()).await);
    assert_eq!(transport.written_frames(), vec![r#"42["answer",42]"#]);

    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_endpoint_fails_connect() {
    let transport = MockTransport::new();
    transport.set_reachable(false);

    let result = sockio::connect(URL, transport.clone()).await;
    assert!(matches!(result, Err(SocketError::TransportConnect(_))));

    // no client, no supervisor
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.dial_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_namespace_open_is_written_first() {
    verbose_println!("Testing namespace variant...");

    let transport = MockTransport::new();
    let client = sockio::connect_with_namespace(URL, "chat", transport.clone())
        .await
        .unwrap();

    client.emit("join", &json!("lobby")).unwrap();
    assert!(eventually(WAIT, || transport.written().len() == 2).await);
    assert_eq!(transport.written(), vec!["40/chat", r#"42/chat,["join","lobby"]"#]);

    let log = EventLog::new();
    client.on("msg", log.recorder("msg"));
    transport.push_inbound(r#"42["msg","root namespace"]"#);
    transport.push_inbound(r#"42/chat,["msg","chat namespace"]"#);
    assert!(eventually(WAIT, || log.count("msg") == 1).await);
    assert_eq!(log.payloads("msg"), vec![json!("chat namespace")]);

    client.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_namespace_open_fails_connect() {
    let transport = MockTransport::new();
    transport.reject_namespace_open(true);

    let result = sockio::connect_with_namespace(URL, "/chat", transport.clone()).await;
    assert!(matches!(result, Err(SocketError::TransportIo(_))));
    // the rejected session was released
    assert_eq!(transport.closed_writers(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_drop_stops_the_client() {
    let transport = MockTransport::new();
    let client = sockio::connect(URL, transport.clone()).await.unwrap();
    let flag = std::sync::Arc::clone(client.shutdown_flag());

    drop(client);

    assert!(!flag.load(std::sync::atomic::Ordering::SeqCst));
    assert!(eventually(WAIT, || transport.closed_writers() == 1).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(transport.dial_count(), 1);
}

#[test]
fn test_log_capture_can_be_installed_repeatedly() {
    common::init_test_tracing();
    common::init_test_tracing();
    let _transport = MockTransport::new();
}
