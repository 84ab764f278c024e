//! Heartbeat acknowledgement tracking
//!
//! The heartbeat records every PING it queues and the inbound loop records
//! every PONG it reads. When a pong timeout is configured, a PING left
//! unanswered for longer than the timeout marks the generation as dead.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Marks {
    /// Oldest PING not yet answered by a PONG
    outstanding_ping: Option<Instant>,
    last_pong: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct PongTracker {
    marks: Mutex<Marks>,
}

impl PongTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A PING was queued; only the first unanswered one starts the clock
    pub fn record_ping_sent(&self) {
        let mut marks = self.marks.lock();
        if marks.outstanding_ping.is_none() {
            marks.outstanding_ping = Some(Instant::now());
        }
    }

    pub fn record_pong_received(&self) {
        let mut marks = self.marks.lock();
        marks.outstanding_ping = None;
        marks.last_pong = Some(Instant::now());
    }

    /// `true` if a PING has waited longer than `timeout` for its PONG
    pub fn is_overdue(&self, timeout: Duration) -> bool {
        self.marks
            .lock()
            .outstanding_ping
            .is_some_and(|sent| sent.elapsed() > timeout)
    }

    pub fn time_since_last_pong(&self) -> Option<Duration> {
        self.marks.lock().last_pong.map(|at| at.elapsed())
    }

    /// Forget everything; called when a new generation opens
    pub fn reset(&self) {
        *self.marks.lock() = Marks::default();
    }
}
