//! Session facade and event delivery.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`Session`]: connection + pump + clock |
//! | `pump` | [`EventPump`]: manual and continuous delivery |

// ============================================================================
// Submodules
// ============================================================================

/// Session facade.
pub mod core;

/// Event pump.
pub mod pump;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::Session;
pub use self::pump::{EventPump, Handler, PumpHandle};
