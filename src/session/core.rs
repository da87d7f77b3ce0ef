//! Session facade.
//!
//! Composes a [`Connection`] with an [`EventPump`] and the conveniences
//! the domain layer builds on: the server clock, interaction capture and
//! control cooldowns.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};
use tracing::debug;

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::transport::{Call, Connection, ConnectionOptions};

use super::pump::{EventPump, PumpHandle};

// ============================================================================
// Session
// ============================================================================

/// State container for one interactive session.
///
/// Inbound calls are delivered through the pump, either synchronously via
/// [`pump`](Self::pump) or asynchronously via [`pump_async`](Self::pump_async).
///
/// # Example
///
/// ```ignore
/// let session = Session::connect(&options).await?;
/// session.sync_time().await?;
///
/// session.on("giveInput", |call| {
///     println!("{}", call.params());
/// });
/// let pump = session.pump_async();
/// ```
#[derive(Clone)]
pub struct Session {
    /// Underlying transport.
    connection: Connection,
    /// Event delivery.
    pump: EventPump,
    /// Server clock minus local clock, in milliseconds.
    time_offset: Arc<AtomicI64>,
}

impl Session {
    /// Connects and completes the handshake.
    ///
    /// # Errors
    ///
    /// See [`Connection::connect`].
    pub async fn connect(options: &ConnectionOptions) -> Result<Self> {
        let connection = Connection::connect(options).await?;
        Ok(Self::new(connection))
    }

    /// Wraps an open connection.
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        let pump = EventPump::new(connection.clone());

        Self {
            connection,
            pump,
            time_offset: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Returns the underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns the event pump.
    #[inline]
    #[must_use]
    pub fn event_pump(&self) -> &EventPump {
        &self.pump
    }

    /// Registers a handler for inbound calls of a method.
    pub fn on<F>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(&Call) + Send + Sync + 'static,
    {
        self.pump.on(method, handler);
    }

    /// Removes all handlers for a method.
    pub fn off(&self, method: &str) -> usize {
        self.pump.off(method)
    }

    /// Dispatches queued calls and returns them. See [`EventPump::drain`].
    pub fn pump(&self) -> Vec<Call> {
        self.pump.drain()
    }

    /// Starts continuous delivery. See [`EventPump::pump_async`].
    pub fn pump_async(&self) -> PumpHandle {
        self.pump.pump_async()
    }

    // ========================================================================
    // Clock
    // ========================================================================

    /// Synchronizes with the server clock.
    ///
    /// Stores and returns the offset (server minus local) in milliseconds.
    /// The offset is only updated by calling this again.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the reply has no numeric `time`
    /// - Call errors from [`Connection::call`]
    pub async fn sync_time(&self) -> Result<i64> {
        let reply = self.connection.call("getTime", json!({})).await?;
        let server_ms = reply
            .get("time")
            .and_then(Value::as_f64)
            .ok_or_else(|| Error::protocol(format!("getTime reply has no numeric time: {reply}")))?;

        let offset = server_ms as i64 - local_millis();
        self.time_offset.store(offset, Ordering::Release);

        debug!(offset_ms = offset, "Server clock synchronized");
        Ok(offset)
    }

    /// Returns the cached clock offset in milliseconds.
    #[inline]
    #[must_use]
    pub fn time_offset(&self) -> i64 {
        self.time_offset.load(Ordering::Acquire)
    }

    /// Returns the server clock as a UTC unix timestamp in milliseconds.
    #[inline]
    #[must_use]
    pub fn server_time(&self) -> i64 {
        local_millis() + self.time_offset()
    }

    // ========================================================================
    // Interactions
    // ========================================================================

    /// Captures a cost-bearing interaction.
    ///
    /// # Errors
    ///
    /// Call errors from [`Connection::call`].
    pub async fn capture(&self, transaction_id: &str) -> Result<Value> {
        self.connection
            .call("capture", json!({ "transactionID": transaction_id }))
            .await
    }

    /// Puts controls on cooldown for `duration`, measured on the server clock.
    ///
    /// # Errors
    ///
    /// Call errors from [`Connection::call`].
    pub async fn cooldown(
        &self,
        scene_id: &str,
        control_ids: &[&str],
        duration: Duration,
    ) -> Result<Value> {
        let expires_at = self.server_time() + duration.as_millis() as i64;
        let params = cooldown_params(scene_id, control_ids, expires_at);

        self.connection.call("updateControls", params).await
    }

    // ========================================================================
    // Transport Passthroughs
    // ========================================================================

    /// Negotiates a wire codec. See [`Connection::set_compression`].
    ///
    /// # Errors
    ///
    /// Call errors from [`Connection::call`].
    pub async fn set_compression<C>(&self, codec: C) -> Result<bool>
    where
        C: Codec + 'static,
    {
        self.connection.set_compression(codec).await
    }

    /// Closes the session. See [`Connection::close`].
    pub async fn close(&self) {
        self.connection.close().await;
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Local wall clock as a unix timestamp in milliseconds.
fn local_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

/// Builds `updateControls` params setting a cooldown on each control.
fn cooldown_params(scene_id: &str, control_ids: &[&str], expires_at: i64) -> Value {
    let controls: Vec<Value> = control_ids
        .iter()
        .map(|id| json!({ "controlID": id, "cooldown": expires_at }))
        .collect();

    json!({ "sceneID": scene_id, "controls": controls })
}

// ============================================================================
// Tests
// ============================================================================
