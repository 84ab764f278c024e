//! Event name → handler registry
//!
//! Lifecycle events (`connected`, `disconnected`, `error`) go through the same
//! table as application events. The dispatcher is created once per client and
//! outlives every channel generation, which is what keeps registrations alive
//! across reconnects.

use crate::core::channel::Channel;
use crate::traits::{Result, SocketError};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, trace};

pub const ON_CONNECTED: &str = "connected";
pub const ON_DISCONNECTED: &str = "disconnected";
pub const ON_ERROR: &str = "error";

/// Event callback
///
/// Runs on the task that observed the event (inbound loop for wire events),
/// so it should return quickly. The channel argument can be used to reply.
pub type Handler = Arc<dyn Fn(&Channel, &Value) -> Result<()> + Send + Sync>;

#[derive(Default)]
pub struct Dispatcher {
    handlers: RwLock<HashMap<String, Vec<Handler>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`; duplicates are kept and all fire
    pub fn on<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(&Channel, &Value) -> Result<()> + Send + Sync + 'static,
    {
        self.register(event, Arc::new(handler));
    }

    pub fn register(&self, event: impl Into<String>, handler: Handler) {
        self.handlers
            .write()
            .entry(event.into())
            .or_default()
            .push(handler);
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.read().get(event).map_or(0, Vec::len)
    }

    /// Invoke every handler of `event` in registration order
    ///
    /// A failing or panicking handler does not stop the ones after it; each
    /// failure is reported through the `error` event afterwards. Returns the
    /// number of handlers invoked.
    pub fn dispatch(&self, channel: &Channel, event: &str, payload: &Value) -> usize {
        // snapshot so handlers may register more handlers without deadlocking
        let handlers: Vec<Handler> = match self.handlers.read().get(event) {
            Some(list) => list.clone(),
            None => {
                trace!("No handler for event '{}'", event);
                return 0;
            }
        };

        let mut failures = Vec::new();
        for handler in &handlers {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(channel, payload)));
            let reason = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            let failure = SocketError::Handler {
                event: event.to_string(),
                reason,
            };
            error!("{}", failure);
            failures.push(failure);
        }

        if event != ON_ERROR {
            for failure in failures {
                self.dispatch(channel, ON_ERROR, &Value::String(failure.to_string()));
            }
        }

        handlers.len()
    }

    pub fn fire_connected(&self, channel: &Channel) {
        self.dispatch(channel, ON_CONNECTED, &Value::Null);
    }

    pub fn fire_disconnected(&self, channel: &Channel, reason: &str) {
        self.dispatch(channel, ON_DISCONNECTED, &Value::String(reason.to_string()));
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
