use std::sync::Arc;

/// One schedulable control task.
///
/// Lifecycle: `start` once on activation, `loop_once` repeatedly while
/// active, `stop` once on deactivation. The registry serializes every call,
/// so implementations need no internal locking of their own state.
pub trait Task: Send {
    fn start(&mut self);
    fn loop_once(&mut self);
    fn stop(&mut self);
}

/// Constructs a fresh task per activation.
pub type TaskFactory = Box<dyn Fn() -> Box<dyn Task> + Send + Sync>;

/// Action the built-in stop task applies every iteration to hold actuators
/// in a safe state.
pub type SafeStateFn = Arc<dyn Fn() + Send + Sync>;

/// Task active when nothing else is.
pub(crate) struct StopTask {
    safe_state: SafeStateFn,
}

impl StopTask {
    pub(crate) fn new(safe_state: SafeStateFn) -> Self {
        Self { safe_state }
    }
}

impl Task for StopTask {
    fn start(&mut self) {}

    fn loop_once(&mut self) {
        (self.safe_state)();
    }

    fn stop(&mut self) {}
}
