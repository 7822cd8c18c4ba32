use robolink_transport::TransportError;
use robolink_wire::WireError;

/// Error type control loops report from their fallible hooks.
pub type LoopError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the link engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Wire codec failure.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// The control loop's `init` hook failed; the engine is in emergency
    /// stop.
    #[error("control loop failed to initialize: {0}")]
    ControlLoopInit(LoopError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
