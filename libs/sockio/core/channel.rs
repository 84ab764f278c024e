//! Channel: the client's handle to one live connection generation
//!
//! # Architecture
//!
//! ```text
//!                   ┌──────────── Channel (Mutex<Inner>) ────────────┐
//!  send()/emit() ──>│ state │ generation │ outbound_tx │ close_tx    │
//!                   │ supervisor │ tasks                             │
//!                   └───────┬───────────────────┬───────────────────┘
//!                           │ mpsc (FIFO)       │ watch (close signal)
//!                           v                   v
//!                    Outbound Loop      Inbound Loop / Heartbeat
//! ```
//!
//! Every `open` starts a new generation with a fresh queue and close signal.
//! A transport failure reported through [`Channel::fail`] only affects the
//! generation it was observed on, so a late error from an old task can never
//! tear down a newer connection.

use crate::core::pong_tracker::PongTracker;
use crate::core::protocol::{self, Handshake};
use crate::traits::{Connection, MessageReader, MessageWriter, Result, SocketError};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Open/closed state of the current generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Open,
    Closing,
    Closed,
}

/// Reconnection supervisor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Retrying,
    Reconnected,
}

/// Everything the loops of one generation need, handed out by [`Channel::open`]
pub struct Generation {
    pub id: u64,
    pub reader: Box<dyn MessageReader>,
    pub writer: Box<dyn MessageWriter>,
    pub outbound_rx: mpsc::UnboundedReceiver<String>,
    pub close_rx: watch::Receiver<bool>,
}

struct Inner {
    state: ChannelState,
    generation: u64,
    outbound_tx: Option<mpsc::UnboundedSender<String>>,
    close_tx: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
    /// Set by `open`, cleared once the generation's tasks are attached
    starting: bool,
    supervisor: SupervisorState,
    handshake: Option<Handshake>,
}

impl Inner {
    /// Broadcast the close signal and discard the queue of the current generation
    fn stop_generation(&mut self) {
        if let Some(close_tx) = self.close_tx.take() {
            close_tx.send_replace(true);
        }
        self.outbound_tx = None;
    }
}

pub struct Channel {
    inner: Mutex<Inner>,
    namespace: String,
    /// `true` while the client is running; cleared for good by `close`
    shutdown_flag: Arc<AtomicBool>,
    started: Notify,
    liveness: PongTracker,
}

impl Channel {
    pub fn new(namespace: &str, shutdown_flag: Arc<AtomicBool>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ChannelState::Closed,
                generation: 0,
                outbound_tx: None,
                close_tx: None,
                tasks: Vec::new(),
                starting: false,
                supervisor: SupervisorState::Idle,
                handshake: None,
            }),
            namespace: protocol::normalize_namespace(namespace),
            shutdown_flag,
            started: Notify::new(),
            liveness: PongTracker::new(),
        }
    }

    /// Install a freshly established connection as a new generation
    ///
    /// Once the client has been shut down the connection is refused and
    /// handed back so the caller can release it. Every successful `open` must
    /// be followed by [`Channel::spawn_tasks`] for the same generation; `close`
    /// waits for it.
    pub fn open(&self, connection: Connection) -> std::result::Result<Generation, Connection> {
        let mut inner = self.inner.lock();
        if !self.is_running() {
            return Err(connection);
        }

        inner.stop_generation();
        inner.generation += 1;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = watch::channel(false);
        inner.outbound_tx = Some(outbound_tx);
        inner.close_tx = Some(close_tx);
        inner.state = ChannelState::Open;
        inner.starting = true;
        inner.handshake = None;
        self.liveness.reset();

        let (reader, writer) = connection.into_split();
        debug!("Channel generation {} open", inner.generation);

        Ok(Generation {
            id: inner.generation,
            reader,
            writer,
            outbound_rx,
            close_rx,
        })
    }

    /// Spawn the tasks of `generation` and record their handles
    ///
    /// `spawn` runs under the channel lock, so a task can neither fail nor be
    /// missed by `close` before its handle is recorded. Ends the start phase
    /// begun by `open`.
    pub(crate) fn spawn_tasks<F>(&self, generation: u64, spawn: F)
    where
        F: FnOnce() -> Vec<JoinHandle<()>>,
    {
        let mut inner = self.inner.lock();
        let handles = spawn();
        if inner.generation == generation {
            inner.tasks.extend(handles);
            inner.starting = false;
        }
        // an older generation's tasks already saw their close signal; let them finish detached
        drop(inner);
        self.started.notify_waiters();
    }

    /// Queue a raw frame for the outbound loop
    pub fn send(&self, message: impl Into<String>) -> Result<()> {
        let inner = self.inner.lock();
        if inner.state != ChannelState::Open {
            return Err(SocketError::ChannelClosed);
        }
        inner
            .outbound_tx
            .as_ref()
            .ok_or(SocketError::ChannelClosed)?
            .send(message.into())
            .map_err(|_| SocketError::ChannelClosed)
    }

    /// Queue an EVENT frame on this channel's namespace
    pub fn emit(&self, event: &str, payload: &Value) -> Result<()> {
        self.send(protocol::encode_event(&self.namespace, event, payload))
    }

    /// Report a transport-detected failure on `generation`
    ///
    /// Returns `true` to exactly one caller per generation, and only while
    /// that generation is still open. That caller owns the `disconnected`
    /// dispatch.
    pub(crate) fn fail(&self, generation: u64, reason: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state != ChannelState::Open {
            return false;
        }
        info!("Channel generation {} lost: {}", generation, reason);
        inner.state = ChannelState::Closed;
        inner.stop_generation();
        true
    }

    /// Graceful shutdown of the current generation and of the client
    ///
    /// Waits for a generation that is still starting to get its tasks, then
    /// for the inbound, outbound and heartbeat tasks to exit; the writer is
    /// released by the outbound task on its way out. Returns `true` if the
    /// channel was open, i.e. if a `disconnected` event is owed.
    ///
    /// Must not be awaited from inside an event handler (the handler runs on
    /// one of the tasks being awaited, or on the start being waited for);
    /// spawn it instead.
    pub async fn close(&self) -> bool {
        let was_open = {
            let mut inner = self.inner.lock();
            self.shutdown_flag.store(false, Ordering::Release);
            let was_open = inner.state == ChannelState::Open;
            if was_open {
                inner.state = ChannelState::Closing;
            }
            inner.stop_generation();
            was_open
        };

        let tasks = loop {
            let started = self.started.notified();
            {
                let mut inner = self.inner.lock();
                if !inner.starting {
                    break std::mem::take(&mut inner.tasks);
                }
            }
            debug!("Close waiting for a starting generation");
            started.await;
        };

        for task in tasks {
            let _ = task.await;
        }

        self.inner.lock().state = ChannelState::Closed;
        if was_open {
            info!("Channel closed");
        }
        was_open
    }

    /// Enter `Retrying` unless a supervisor is already active or the client is shut down
    ///
    /// This is the start of a reconnect episode: the stale generation is
    /// discarded and its task handles are returned so the supervisor can wait
    /// for them before dialing again.
    pub(crate) fn begin_reconnect(&self) -> Option<Vec<JoinHandle<()>>> {
        let mut inner = self.inner.lock();
        if inner.supervisor != SupervisorState::Idle || !self.is_running() {
            return None;
        }
        inner.supervisor = SupervisorState::Retrying;
        inner.state = ChannelState::Closed;
        inner.stop_generation();
        inner.handshake = None;
        Some(std::mem::take(&mut inner.tasks))
    }

    pub(crate) fn mark_reconnected(&self) {
        self.inner.lock().supervisor = SupervisorState::Reconnected;
    }

    pub(crate) fn end_reconnect(&self) {
        self.inner.lock().supervisor = SupervisorState::Idle;
    }

    /// Leave `Reconnected` after a successful attempt
    ///
    /// A generation that died before this call had its `disconnected` swallowed
    /// by the guard in [`Channel::begin_reconnect`]; in that case the episode
    /// continues in `Retrying` and the stale task handles are returned.
    pub(crate) fn finish_reconnect(&self) -> Option<Vec<JoinHandle<()>>> {
        let mut inner = self.inner.lock();
        if inner.state != ChannelState::Open && self.is_running() {
            inner.supervisor = SupervisorState::Retrying;
            inner.stop_generation();
            inner.handshake = None;
            return Some(std::mem::take(&mut inner.tasks));
        }
        inner.supervisor = SupervisorState::Idle;
        None
    }

    /// Synchronous teardown for drop paths: stop the client without waiting for tasks
    pub(crate) fn abandon(&self) {
        let mut inner = self.inner.lock();
        self.shutdown_flag.store(false, Ordering::Release);
        inner.state = ChannelState::Closed;
        inner.stop_generation();
        inner.tasks.clear();
        inner.starting = false;
        drop(inner);
        self.started.notify_waiters();
    }

    pub(crate) fn record_handshake(&self, generation: u64, handshake: Handshake) {
        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.handshake = Some(handshake);
        }
    }

    /// Handshake received on the current generation, if any
    pub fn handshake(&self) -> Option<Handshake> {
        self.inner.lock().handshake.clone()
    }

    pub fn state(&self) -> ChannelState {
        self.inner.lock().state
    }

    pub fn supervisor_state(&self) -> SupervisorState {
        self.inner.lock().supervisor
    }

    /// Number of the current generation (0 before the first open)
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.shutdown_flag.load(Ordering::Acquire)
    }

    pub(crate) fn liveness(&self) -> &PongTracker {
        &self.liveness
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Channel")
            .field("namespace", &self.namespace)
            .field("state", &inner.state)
            .field("generation", &inner.generation)
            .field("supervisor", &inner.supervisor)
            .finish()
    }
}
