//! Inbound method calls.
//!
//! A [`Call`] wraps a method frame received from the remote side and
//! keeps a weak handle to its connection so the consumer can reply.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Weak;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::CallId;
use crate::protocol::MethodFrame;

use super::Connection;
use super::connection::Inner;

// ============================================================================
// Call
// ============================================================================

/// A method call received from the interactive service.
///
/// Calls are handed out by the event pump. Replying is optional for
/// notifications and required for calls that carry an id.
#[derive(Clone)]
pub struct Call {
    /// Connection the call arrived on.
    connection: Weak<Inner>,
    /// The received frame.
    frame: MethodFrame,
}

impl Call {
    /// Wraps an inbound frame.
    pub(crate) fn new(connection: Weak<Inner>, frame: MethodFrame) -> Self {
        Self { connection, frame }
    }

    /// Returns the name of the method being called.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.frame.method
    }

    /// Returns the parameters of the method being called.
    #[inline]
    #[must_use]
    pub fn params(&self) -> &Value {
        &self.frame.params
    }

    /// Returns the call id, if the remote side expects a reply.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<CallId> {
        self.frame.id
    }

    /// Returns `true` if the remote side expects a reply.
    #[inline]
    #[must_use]
    pub fn expects_reply(&self) -> bool {
        self.frame.id.is_some() && !self.frame.discard
    }

    /// Consumes the call, returning the underlying frame.
    #[inline]
    #[must_use]
    pub fn into_frame(self) -> MethodFrame {
        self.frame
    }

    /// Submits a successful reply.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the call has no id
    /// - [`Error::ConnectionClosed`] if the connection is gone
    pub fn reply(&self, result: Value) -> Result<()> {
        self.respond(Ok(result))
    }

    /// Submits an error reply.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the call has no id
    /// - [`Error::ConnectionClosed`] if the connection is gone
    pub fn reply_error(&self, error: Value) -> Result<()> {
        self.respond(Err(error))
    }

    fn respond(&self, outcome: std::result::Result<Value, Value>) -> Result<()> {
        let id = self.frame.id.ok_or_else(|| {
            Error::protocol(format!("Call {} has no id to reply to", self.frame.method))
        })?;

        let inner = self.connection.upgrade().ok_or(Error::ConnectionClosed)?;
        Connection::from_inner(inner).reply(id, outcome)
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.frame.id)
            .field("method", &self.frame.method)
            .field("params", &self.frame.params)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
