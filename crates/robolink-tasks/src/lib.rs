//! Named control-task registry with deferred swap semantics.
//!
//! Tasks are registered by name, either as factories (fresh construction
//! per activation) or as instances (reused across activations). Exactly one
//! entry is active at a time; switching is requested from any thread but
//! only performed at the start of the next driven iteration. A built-in
//! safe-state entry is always present and becomes active whenever a switch
//! cannot be honored.

pub mod error;
pub mod registry;
pub mod task;

pub use error::{Result, TaskError};
pub use registry::{TaskRegistry, DEFAULT_TASK_NAME};
pub use task::{SafeStateFn, Task, TaskFactory};
