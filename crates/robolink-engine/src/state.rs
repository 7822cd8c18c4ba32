use std::fmt;

/// Lifecycle of the link engine.
///
/// Transitions are driven by [`LinkManager`](crate::LinkManager): starting a
/// control loop passes through `Init` into `Running`, stopping one lands in
/// `Stopped`, and failures divert to `EmergencyStop`. A stale heartbeat moves
/// the engine to `DroppedConnection` until the peer returns and a restart is
/// requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    /// No control loop has ever been started.
    NotStarted,
    /// A control loop is initializing.
    Init,
    /// The control loop is being driven.
    Running,
    /// The control loop was stopped in an orderly fashion.
    Stopped,
    /// A control loop raised an error or failed to initialize.
    EmergencyStop,
    /// The peer's heartbeats went stale.
    DroppedConnection,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::NotStarted => "not-started",
            LinkState::Init => "init",
            LinkState::Running => "running",
            LinkState::Stopped => "stopped",
            LinkState::EmergencyStop => "emergency-stop",
            LinkState::DroppedConnection => "dropped-connection",
        };
        f.write_str(name)
    }
}

/// Observer of [`LinkState`] transitions.
///
/// The manager holds a single slot; registering a monitor replaces any
/// previous one. Callbacks run on the thread performing the transition with
/// no engine locks held.
pub trait StateMonitor: Send + Sync {
    fn on_state_change(&self, state: LinkState);
}
