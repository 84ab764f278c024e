//! Heartbeat for socket.io connections
//!
//! # Architecture
//!
//! One heartbeat task runs per channel generation:
//!
//! ```text
//! ┌─────────────────────┐
//! │  Heartbeat Task     │
//! │  (Tokio spawn)      │
//! │                     │
//! │  Every interval:    │
//! │  1. Wait for tick   │
//! │  2. Check pong age  │  (only with a pong timeout)
//! │  3. Queue PING  ────┼──> Channel::send ──> Outbound Loop ──> Transport
//! └─────────────────────┘
//! ```
//!
//! The interval is the server's `pingInterval` once the OPEN handshake has
//! been read, and the configured default before that. The task never reports
//! a disconnect for a closed channel; it just stops. With a pong timeout
//! configured, an unanswered PING older than the timeout is reported as a
//! lost connection through the same path as a read/write failure.

use crate::core::client::ClientShared;
use crate::core::protocol::PING;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

pub(crate) async fn heartbeat_task(
    shared: Arc<ClientShared>,
    generation: u64,
    mut close_rx: watch::Receiver<bool>,
) {
    let channel = &shared.channel;
    debug!(
        "Heartbeat task started for generation {} (default interval {:?})",
        generation,
        shared.config.heartbeat_interval()
    );

    loop {
        let interval = current_interval(&shared);

        // skip the immediate first tick; wait a full interval before each ping
        tokio::select! {
            biased;
            _ = close_rx.changed() => {
                debug!("Heartbeat task received close signal");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        if let Some(timeout) = shared.config.pong_timeout() {
            if channel.liveness().is_overdue(timeout) {
                warn!("No pong within {:?}, declaring connection dead", timeout);
                shared.connection_lost(generation, "pong timeout");
                break;
            }
        }

        match channel.send(PING) {
            Ok(()) => {
                channel.liveness().record_ping_sent();
                debug!("Heartbeat tick - ping queued");
            }
            Err(_) => {
                debug!("Channel closed, heartbeat task exiting");
                break;
            }
        }
    }

    debug!("Heartbeat task exiting");
}

fn current_interval(shared: &ClientShared) -> Duration {
    shared
        .channel
        .handshake()
        .map(|handshake| handshake.ping_interval())
        .filter(|interval| !interval.is_zero())
        .unwrap_or_else(|| shared.config.heartbeat_interval())
}
