//! Robot control link over UDP.
//!
//! robolink drives the datagram protocol spoken between a robot controller
//! and its operator console: heartbeat liveness, gamepad state, reliable
//! commands, and telemetry, plus the engine that keeps a robot safe when
//! the link degrades.
//!
//! # Crate Structure
//!
//! - [`wire`]: byte-exact frame codecs for the control protocol
//! - [`transport`]: UDP channel with peer discovery plumbing
//! - [`tasks`]: task registry with deferred, safe task switching (behind
//!   the `engine` feature)
//! - [`engine`]: link manager with its receive, retransmit, and driver
//!   loops (behind the `engine` feature)

/// Re-export wire types.
pub mod wire {
    pub use robolink_wire::*;
}

/// Re-export transport types.
pub mod transport {
    pub use robolink_transport::*;
}

/// Re-export task registry types (requires `engine` feature).
#[cfg(feature = "engine")]
pub mod tasks {
    pub use robolink_tasks::*;
}

/// Re-export engine types (requires `engine` feature).
#[cfg(feature = "engine")]
pub mod engine {
    pub use robolink_engine::*;
}
