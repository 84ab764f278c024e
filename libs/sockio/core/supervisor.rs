//! Reconnection supervisor
//!
//! Armed once per client as an internal `disconnected` handler. The first
//! `disconnected` of a live episode moves the channel from `Idle` to
//! `Retrying` and spawns [`run`]; any further `disconnected` while an episode
//! is active finds the supervisor busy and returns.
//!
//! ```text
//!  Idle ──disconnected──> Retrying ──dial+open ok──> Reconnected ──> Idle
//!                            │  ^
//!                            └──┘ dial failed / namespace open rejected
//! ```

use crate::core::channel::Channel;
use crate::core::client::ClientShared;
use crate::core::dispatcher::{ON_DISCONNECTED, ON_ERROR};
use crate::traits::SocketError;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Granularity at which a pending retry delay notices a shutdown
const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) fn install(shared: &Arc<ClientShared>) {
    let weak = Arc::downgrade(shared);
    shared.dispatcher.on(ON_DISCONNECTED, move |channel, _reason| {
        let Some(shared) = weak.upgrade() else {
            return Ok(());
        };
        match channel.begin_reconnect() {
            Some(stale) => {
                info!("Starting reconnection supervisor");
                tokio::spawn(run(shared, stale));
            }
            None => debug!("Supervisor already active or client shut down"),
        }
        Ok(())
    });
}

/// Retry loop of one reconnect episode
async fn run(shared: Arc<ClientShared>, mut stale: Vec<JoinHandle<()>>) {
    let channel = &shared.channel;
    let strategy = shared.config.reconnect_strategy();
    let mut attempt = 0;

    loop {
        // the previous generation's reader and writer must be gone before a new dial
        for task in stale.drain(..) {
            let _ = task.await;
        }

        let Some(delay) = strategy.next_delay(attempt) else {
            channel.end_reconnect();
            if attempt == 0 {
                info!("Reconnection disabled, staying disconnected");
            } else {
                let failure = SocketError::ReconnectionFailed { attempts: attempt };
                warn!("{}", failure);
                shared
                    .dispatcher
                    .dispatch(channel, ON_ERROR, &Value::String(failure.to_string()));
            }
            return;
        };

        if !sleep_while_running(channel, delay).await {
            debug!("Shutdown during reconnection delay");
            channel.end_reconnect();
            return;
        }

        attempt += 1;
        debug!("Reconnection attempt {} to {}", attempt, shared.config.url());

        let connection = match shared.dial().await {
            Ok(connection) => connection,
            Err(e) if e.is_recoverable() => {
                debug!("Reconnection attempt {} failed: {}", attempt, e);
                continue;
            }
            Err(e) => {
                warn!("Reconnection attempt {} failed, will retry: {}", attempt, e);
                continue;
            }
        };

        if shared.start(connection).await.is_err() {
            channel.end_reconnect();
            return;
        }

        channel.mark_reconnected();
        shared.metrics.increment_reconnects();
        info!("Reconnected after {} attempt(s)", attempt);

        match channel.finish_reconnect() {
            None => return,
            Some(tasks) => {
                warn!("Connection lost again before reconnection settled, retrying");
                stale = tasks;
                attempt = 0;
            }
        }
    }
}

/// Sleep for `delay`, waking every 100ms to check the shutdown flag
///
/// Returns `false` if the client was shut down meanwhile.
async fn sleep_while_running(channel: &Channel, delay: Duration) -> bool {
    let mut elapsed = Duration::ZERO;

    while elapsed < delay {
        if !channel.is_running() {
            return false;
        }
        let sleep_time = std::cmp::min(SHUTDOWN_CHECK_INTERVAL, delay - elapsed);
        tokio::time::sleep(sleep_time).await;
        elapsed += sleep_time;
    }

    channel.is_running()
}
