//! Wire codecs.
//!
//! A codec turns the JSON text of a frame into the payload placed on the
//! WebSocket, and back. The session starts on [`TextCodec`] and may
//! negotiate a compressed codec through `setCompression`.
//!
//! # Fallback
//!
//! [`TextCodec`] is the mandatory fallback: it never fails on valid UTF-8
//! JSON. When the active codec fails, the session switches back to it
//! and asks the remote side to do the same.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `text` | Uncompressed text frames |
//! | `gzip` | Gzip-compressed binary frames |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// Gzip-compressed binary frames.
pub mod gzip;

/// Uncompressed text frames.
pub mod text;

// ============================================================================
// Re-exports
// ============================================================================

pub use gzip::GzipCodec;
pub use text::TextCodec;

// ============================================================================
// WirePayload
// ============================================================================

/// An encoded frame, ready to be wrapped in a WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WirePayload {
    /// Sent as a text message.
    Text(String),
    /// Sent as a binary message.
    Binary(Vec<u8>),
}

impl WirePayload {
    /// Returns the payload length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Encodes and decodes frame bodies for the wire.
///
/// Implementations must be stateless with respect to individual frames:
/// each message is encoded and decoded on its own.
pub trait Codec: Send + Sync + fmt::Debug {
    /// Scheme name exchanged in `setCompression`.
    fn name(&self) -> &str;

    /// Encodes the JSON text of a frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`](crate::Error::Codec) if encoding fails.
    fn encode(&self, text: &str) -> Result<WirePayload>;

    /// Decodes a binary message back into JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`](crate::Error::Codec) on malformed input.
    fn decode(&self, data: &[u8]) -> Result<String>;

    /// Returns `true` if this is the uncompressed fallback codec.
    ///
    /// Only [`TextCodec`] answers `true`, whatever name a custom codec
    /// reports.
    #[inline]
    fn is_fallback(&self) -> bool {
        false
    }
}

// ============================================================================
// Tests
// ============================================================================
