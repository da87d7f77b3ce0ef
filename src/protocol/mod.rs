//! WebSocket protocol message types.
//!
//! # Protocol Overview
//!
//! | Frame | Direction | Purpose |
//! |-------|-----------|---------|
//! | `method` with `id` | Both | Call expecting a reply |
//! | `method` without `id` | Both | Notification or discarded call |
//! | `reply` | Both | Result or error for a call id |
//!
//! A WebSocket message carries one frame or a JSON array of frames.
//! The remote side opens every session with a `hello` notification.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Frame types and packet parsing |

// ============================================================================
// Submodules
// ============================================================================

/// Frame types and packet parsing.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{Frame, HELLO_METHOD, MethodFrame, ReplyFrame, parse_frames};
