//! Method and reply frames.
//!
//! Defines the logical message format exchanged with the interactive
//! service, independent of the wire codec.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::identifiers::CallId;

// ============================================================================
// Constants
// ============================================================================

/// Method name of the notification that completes the handshake.
pub const HELLO_METHOD: &str = "hello";

// ============================================================================
// Frame
// ============================================================================

/// A single logical message.
///
/// # Format
///
/// ```json
/// { "type": "method", "id": 3, "method": "giveInput", "params": { ... } }
/// { "type": "reply", "id": 3, "result": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// A method call or notification.
    Method(MethodFrame),
    /// A reply to a previously sent method.
    Reply(ReplyFrame),
}

impl Frame {
    /// Returns `true` if this is the `hello` handshake notification.
    #[inline]
    #[must_use]
    pub fn is_hello(&self) -> bool {
        matches!(self, Self::Method(method) if method.method == HELLO_METHOD)
    }
}

impl From<MethodFrame> for Frame {
    #[inline]
    fn from(method: MethodFrame) -> Self {
        Self::Method(method)
    }
}

impl From<ReplyFrame> for Frame {
    #[inline]
    fn from(reply: ReplyFrame) -> Self {
        Self::Reply(reply)
    }
}

// ============================================================================
// MethodFrame
// ============================================================================

/// A method call.
///
/// `id` is set when a reply is expected and omitted for discarded calls
/// and notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodFrame {
    /// Correlation id, absent when no reply is expected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CallId>,

    /// Method name.
    pub method: String,

    /// Method parameters.
    #[serde(default)]
    pub params: Value,

    /// Asks the receiver not to reply.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub discard: bool,
}

impl MethodFrame {
    /// Creates a notification with no id.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: None,
            method: method.into(),
            params,
            discard: false,
        }
    }

    /// Creates a call expecting a reply under `id`.
    #[inline]
    #[must_use]
    pub fn call(id: CallId, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: Some(id),
            ..Self::new(method, params)
        }
    }

    /// Creates a fire-and-forget call.
    #[inline]
    #[must_use]
    pub fn discarded(method: impl Into<String>, params: Value) -> Self {
        Self {
            discard: true,
            ..Self::new(method, params)
        }
    }
}

// ============================================================================
// ReplyFrame
// ============================================================================

/// A reply to a method call.
///
/// Exactly one of `result` and `error` is set on replies built by this
/// crate. Inbound replies carrying an `error` are treated as failures
/// even if a `result` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyFrame {
    /// Matches the method frame's `id`.
    pub id: CallId,

    /// Result data (if success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error payload (if error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ReplyFrame {
    /// Creates a successful reply.
    #[inline]
    #[must_use]
    pub fn ok(id: CallId, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error reply.
    #[inline]
    #[must_use]
    pub fn err(id: CallId, error: Value) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Creates a reply from an outcome.
    #[inline]
    #[must_use]
    pub fn from_outcome(id: CallId, outcome: std::result::Result<Value, Value>) -> Self {
        match outcome {
            Ok(result) => Self::ok(id, result),
            Err(error) => Self::err(id, error),
        }
    }

    /// Returns `true` if this reply carries an error.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result value, returning error if the reply was an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] carrying the server's error payload.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::rpc(self.id, error)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

// ============================================================================
// Packet Parsing
// ============================================================================

/// Parses one decoded message into frames.
///
/// A message is either a single frame object or an array of frames
/// (a batch). Malformed members of a batch are logged and skipped so the
/// rest of the batch is still delivered.
///
/// # Errors
///
/// - [`Error::Json`] if the text is not JSON
/// - [`Error::Protocol`] if a single-object message is not a frame
pub fn parse_frames(text: &str) -> Result<Vec<Frame>> {
    let value: Value = serde_json::from_str(text)?;

    match value {
        Value::Array(items) => {
            let mut frames = Vec::with_capacity(items.len());
            for item in items {
                match serde_json::from_value::<Frame>(item) {
                    Ok(frame) => frames.push(frame),
                    Err(e) => warn!(error = %e, "Dropping malformed frame in batch"),
                }
            }
            Ok(frames)
        }
        other => serde_json::from_value::<Frame>(other)
            .map(|frame| vec![frame])
            .map_err(|e| Error::protocol(format!("Malformed frame: {e}"))),
    }
}

// ============================================================================
// Tests
// ============================================================================
