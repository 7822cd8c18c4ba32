use std::sync::Arc;

use tracing::warn;

use robolink_tasks::TaskRegistry;
use robolink_wire::Command;

use crate::error::LoopError;
use crate::manager::LinkManager;

/// User-supplied control loop driven by the [`LinkManager`].
///
/// Hooks take `&self`; implementations keep their mutable state behind
/// interior mutability because `handle_command` arrives on the receive
/// thread while `loop_once` runs on the driver thread.
///
/// Returning an error from `loop_once` puts the engine into emergency stop.
/// Errors from the other hooks are logged and contained.
pub trait ControlLoop: Send + Sync {
    /// Called once before the driver starts. The manager handle is for
    /// sending telemetry and commands back to the peer.
    fn init(&self, manager: &LinkManager) -> Result<(), LoopError>;

    /// One driven iteration.
    fn loop_once(&self) -> Result<(), LoopError>;

    /// Called while stopping, after the driver has wound down.
    fn teardown(&self) -> Result<(), LoopError>;

    /// A freshly arrived, deduplicated command from the peer.
    fn handle_command(&self, command: &Command) -> Result<(), LoopError>;

    /// The registry this loop drives task swaps through, if it has one.
    fn task_registry(&self) -> Option<Arc<TaskRegistry>>;
}

/// The manager's control loop slot.
///
/// `Empty` stands in whenever no user loop is installed so the receive and
/// driver threads never need a null check: its hooks accept and discard
/// everything.
pub(crate) enum ActiveLoop {
    Empty,
    User(Box<dyn ControlLoop>),
}

impl ActiveLoop {
    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, ActiveLoop::Empty)
    }

    pub(crate) fn init(&self, manager: &LinkManager) -> Result<(), LoopError> {
        match self {
            ActiveLoop::Empty => Ok(()),
            ActiveLoop::User(inner) => inner.init(manager),
        }
    }

    pub(crate) fn loop_once(&self) -> Result<(), LoopError> {
        match self {
            ActiveLoop::Empty => Ok(()),
            ActiveLoop::User(inner) => inner.loop_once(),
        }
    }

    pub(crate) fn teardown(&self) -> Result<(), LoopError> {
        match self {
            ActiveLoop::Empty => Ok(()),
            ActiveLoop::User(inner) => inner.teardown(),
        }
    }

    pub(crate) fn handle_command(&self, command: &Command) -> Result<(), LoopError> {
        match self {
            ActiveLoop::Empty => {
                warn!(command = %command.name(), "dropping command, no active control loop");
                Ok(())
            }
            ActiveLoop::User(inner) => inner.handle_command(command),
        }
    }

    pub(crate) fn task_registry(&self) -> Option<Arc<TaskRegistry>> {
        match self {
            ActiveLoop::Empty => None,
            ActiveLoop::User(inner) => inner.task_registry(),
        }
    }
}
