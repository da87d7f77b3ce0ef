//! Error types for the interactive RPC transport.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use interactive_rpc::{Connection, Result};
//!
//! async fn example(connection: &Connection) -> Result<()> {
//!     let scenes = connection.call("getScenes", serde_json::json!({})).await?;
//!     println!("{scenes}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`], [`Error::Codec`] |
//! | Call | [`Error::RequestTimeout`], [`Error::Rpc`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::CallId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Only call-scoped outcomes (timeouts, server errors) and setup failures
/// reach callers. Decode failures on the socket are recovered internally.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connection options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the WebSocket connection cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Timed out waiting for the `hello` handshake.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// WebSocket connection closed.
    ///
    /// Returned when the session is closed before or during an operation.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected payload.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Wire codec failed to encode or decode a payload.
    #[error("Codec error ({codec}): {message}")]
    Codec {
        /// Name of the codec that failed.
        codec: String,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Call Errors
    // ========================================================================
    /// Call reply not received in time.
    #[error("Call {call_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The call ID that timed out.
        call_id: CallId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The remote side answered a call with an error payload.
    #[error("Call {call_id} failed: {error}")]
    Rpc {
        /// The call ID the error replies to.
        call_id: CallId,
        /// Error payload provided by the server.
        error: Value,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    #[inline]
    pub fn codec(codec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Codec {
            codec: codec.into(),
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(call_id: CallId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            call_id,
            timeout_ms,
        }
    }

    /// Creates an RPC application error.
    #[inline]
    pub fn rpc(call_id: CallId, error: Value) -> Self {
        Self::Rpc { call_id, error }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the server answered with an error payload.
    #[inline]
    #[must_use]
    pub fn is_rpc_error(&self) -> bool {
        matches!(self, Self::Rpc { .. })
    }

    /// Returns the server error payload, if this is an RPC error.
    #[inline]
    #[must_use]
    pub fn rpc_payload(&self) -> Option<&Value> {
        match self {
            Self::Rpc { error, .. } => Some(error),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
