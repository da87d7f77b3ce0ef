//! Interactive RPC - Bidirectional JSON-RPC sessions over WebSocket.
//!
//! This library provides the client side of an interactive session: a
//! persistent WebSocket to a realtime service over which both ends call
//! methods on each other and reply to them.
//!
//! # Architecture
//!
//! The session is layered:
//!
//! - **Transport**: [`Connection`] owns the socket, correlates replies with
//!   outbound calls and queues inbound calls
//! - **Codec**: frames travel as plain text or gzip, negotiated at runtime
//!   with automatic fallback to plain text
//! - **Session**: [`Session`] adds event delivery through the
//!   [`EventPump`] plus the server clock and domain calls
//!
//! Key design principles:
//!
//! - One receive loop per connection owns the socket
//! - Replies never reach the pump; method calls always do
//! - Nothing blocks the receive loop, including codec renegotiation
//!
//! # Quick Start
//!
//! ```no_run
//! use interactive_rpc::{ConnectionOptions, Result, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let options = ConnectionOptions::new()
//!         .address("wss://interactive.example.com/gameClient")
//!         .authorization("Bearer abc123")
//!         .project_version_id(1234);
//!
//!     let session = Session::connect(&options).await?;
//!     session.sync_time().await?;
//!
//!     session.on("giveInput", |call| {
//!         println!("input: {}", call.params());
//!     });
//!
//!     let pump = session.pump_async();
//!     pump.join().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`codec`] | Wire codecs: [`TextCodec`], [`GzipCodec`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Frame types and parsing |
//! | [`session`] | [`Session`] and [`EventPump`] |
//! | [`transport`] | WebSocket connection and receive loop |

// ============================================================================
// Modules
// ============================================================================

/// Wire codecs.
///
/// Frames are JSON text; a codec decides how that text is carried.
pub mod codec;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Frame types for the session protocol.
pub mod protocol;

/// Session facade and event pump.
pub mod session;

/// WebSocket transport layer.
///
/// Handles the handshake, call correlation and the receive queue.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Codec types
pub use codec::{Codec, GzipCodec, TextCodec, WirePayload};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::CallId;

// Protocol types
pub use protocol::{Frame, MethodFrame, ReplyFrame};

// Session types
pub use session::{EventPump, Handler, PumpHandle, Session};

// Transport types
pub use transport::{Call, Connection, ConnectionOptions, ConnectionState};
