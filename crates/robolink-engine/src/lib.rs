//! Control-link engine.
//!
//! A [`LinkManager`] coordinates one control link over a datagram
//! [`Channel`](robolink_transport::Channel). It owns three worker loops
//! (receive, retransmit, and the control loop driver), tracks the link's
//! [`LinkState`], and gates the user's [`ControlLoop`] on heartbeat
//! freshness so a robot without an operator never moves.
//!
//! The operator console side of a link reuses the same wire and transport
//! layers together with [`DiscoveryAnnouncer`] to find robots.

mod cancel;
mod commands;
mod config;
mod control;
mod discovery;
mod error;
mod manager;
mod state;
mod sticky;
mod sync;

#[cfg(test)]
mod support;

pub use cancel::CancelToken;
pub use config::LinkConfig;
pub use control::ControlLoop;
pub use discovery::DiscoveryAnnouncer;
pub use error::{EngineError, LoopError, Result};
pub use manager::{
    LinkManager, RESTART_TASK_FINISHED_TAG, RESTART_TASK_TAG, SYSTEM_TELEMETRY_TAG,
};
pub use state::{LinkState, StateMonitor};
pub use sticky::StickyError;
pub use sync::SyncParticipant;
