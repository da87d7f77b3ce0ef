//! Event pump.
//!
//! Delivers queued inbound calls to subscribers registered by method
//! name. Two delivery modes are available:
//!
//! - **Manual** (default): [`EventPump::drain`] dispatches everything
//!   queued so far and returns the drained calls. Call it once per tick
//!   of the host application's loop.
//! - **Continuous**: [`EventPump::pump_async`] spawns a task that drains
//!   as soon as calls arrive, until the connection closes or the returned
//!   [`PumpHandle`] is cancelled.
//!
//! # Example
//!
//! ```ignore
//! pump.on("giveInput", |call| println!("input: {}", call.params()));
//!
//! loop {
//!     game.tick();
//!     for call in pump.drain() {
//!         // Calls are also returned for manual dispatch
//!     }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::transport::{Call, Connection};

// ============================================================================
// Types
// ============================================================================

/// Subscriber callback.
///
/// Invoked synchronously during [`EventPump::drain`] for each call whose
/// method name it was registered under.
pub type Handler = Arc<dyn Fn(&Call) + Send + Sync>;

/// Handlers by method name, in registration order.
type Subscribers = FxHashMap<String, Vec<Handler>>;

// ============================================================================
// EventPump
// ============================================================================

/// Dispatches inbound calls to subscribers.
///
/// Cloning yields another handle to the same subscriber table and mode.
#[derive(Clone)]
pub struct EventPump {
    /// Source of inbound calls.
    connection: Connection,
    /// Registered handlers.
    subscribers: Arc<RwLock<Subscribers>>,
    /// `true` while drained calls are returned to the caller.
    manual: Arc<AtomicBool>,
}

impl EventPump {
    /// Creates a pump in manual mode.
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            subscribers: Arc::new(RwLock::new(Subscribers::default())),
            manual: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Registers a handler for a method name.
    ///
    /// Handlers for the same method run in registration order.
    pub fn on<F>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(&Call) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .entry(method.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Removes all handlers for a method name, returning how many there were.
    pub fn off(&self, method: &str) -> usize {
        self.subscribers
            .write()
            .remove(method)
            .map_or(0, |handlers| handlers.len())
    }

    /// Returns the number of handlers registered for a method name.
    #[inline]
    #[must_use]
    pub fn handler_count(&self, method: &str) -> usize {
        self.subscribers.read().get(method).map_or(0, Vec::len)
    }

    /// Returns `true` in manual mode.
    #[inline]
    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.manual.load(Ordering::Acquire)
    }

    /// Dispatches every queued call and returns them.
    ///
    /// Each call replaces the previous batch. In continuous mode calls are
    /// dispatched but not retained, so the returned batch is empty.
    pub fn drain(&self) -> Vec<Call> {
        let retain = self.is_manual();
        let mut batch = Vec::new();

        while let Some(call) = self.connection.get_packet() {
            self.emit(&call);

            if retain {
                batch.push(call);
            }
        }

        if !batch.is_empty() {
            trace!(count = batch.len(), "Drained calls");
        }
        batch
    }

    /// Starts continuous delivery on a background task.
    ///
    /// The task stops by itself once the connection closes and the queue
    /// is empty. Cancel an active pump before calling this again.
    pub fn pump_async(&self) -> PumpHandle {
        self.manual.store(false, Ordering::Release);

        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let pump = self.clone();

        let task = self.connection.spawn(async move {
            let mut detached = false;

            loop {
                tokio::select! {
                    biased;

                    cancelled = &mut cancel_rx, if !detached => {
                        if cancelled.is_ok() {
                            debug!("Pump cancelled");
                            break;
                        }
                        // Handle dropped without cancelling: keep pumping
                        detached = true;
                    }

                    available = pump.connection.has_packet() => {
                        if !available {
                            debug!("Connection closed, pump stopped");
                            break;
                        }
                        pump.drain();
                    }
                }
            }
        });

        PumpHandle {
            cancel_tx,
            task,
            manual: Arc::clone(&self.manual),
        }
    }

    /// Invokes the handlers registered for the call's method.
    fn emit(&self, call: &Call) {
        // Snapshot so handlers may register or remove subscribers
        let handlers = self
            .subscribers
            .read()
            .get(call.name())
            .cloned()
            .unwrap_or_default();

        for handler in &handlers {
            handler(call);
        }
    }
}

// ============================================================================
// PumpHandle
// ============================================================================

/// Handle to a continuous pump task.
///
/// Dropping the handle leaves the pump running.
#[derive(Debug)]
pub struct PumpHandle {
    cancel_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    manual: Arc<AtomicBool>,
}

impl PumpHandle {
    /// Stops the pump and restores manual mode.
    pub async fn cancel(self) {
        let _ = self.cancel_tx.send(());
        let _ = self.task.await;
        self.manual.store(true, Ordering::Release);
    }

    /// Waits for the pump to stop on its own (connection closed).
    pub async fn join(self) {
        let _ = self.task.await;
    }

    /// Returns `true` if the pump task has finished.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
