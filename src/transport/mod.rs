//! WebSocket session transport.
//!
//! This module owns the socket to the interactive service and provides
//! call/reply correlation, the receive queue and the event source for
//! the pump.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Session (Rust) │                              │  Interactive    │
//! │                 │         WebSocket            │  service        │
//! │  Connection     │◄────────────────────────────►│                 │
//! │  → receive loop │     text / gzip frames       │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::connect` - Open the WebSocket with auth headers
//!    (or `Connection::with_socket` for an existing socket)
//! 2. Handshake - Queue frames until the `hello` notification
//! 3. Receive loop - Resolve replies, queue inbound calls
//! 4. `Connection::close` - Close the socket, wake waiters, fail pending calls
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `call` | Inbound call wrapper with reply helpers |
//! | `connection` | WebSocket connection and receive loop |
//! | `inbox` | Receive queue and single waiter slot |
//! | `options` | Connection configuration |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound call wrapper.
pub mod call;

/// WebSocket connection and receive loop.
pub mod connection;

/// Receive queue and waiter slot.
mod inbox;

/// Connection configuration.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use call::Call;
pub use connection::{Connection, ConnectionState};
pub use options::{ConnectionOptions, DEFAULT_CALL_TIMEOUT, DEFAULT_PROTOCOL_VERSION};
