use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::{Result, TaskError};
use crate::task::{SafeStateFn, StopTask, Task, TaskFactory};

/// Name of the built-in safe-state entry. Reserved; registering over it
/// fails like any other duplicate.
pub const DEFAULT_TASK_NAME: &str = "stop";

struct Inner {
    factories: HashMap<String, TaskFactory>,
    instances: HashMap<String, Box<dyn Task>>,
    active: Box<dyn Task>,
    active_name: String,
    /// Whether `active` was taken out of `instances` and must be returned
    /// there on swap-away.
    active_from_instance: bool,
    pending_name: Option<String>,
    safe_state: SafeStateFn,
}

/// Named registry of control tasks with exactly one active entry.
///
/// A switch request only records the target; the swap itself happens at the
/// start of the next [`run_active_iteration`](TaskRegistry::run_active_iteration),
/// so task lifecycle calls always run on the context that drives iterations.
pub struct TaskRegistry {
    inner: Mutex<Inner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::with_safe_state(Arc::new(|| {}))
    }

    /// `safe_state` runs on every iteration of the default entry, holding
    /// actuators in a safe state while no user task is active.
    pub fn with_safe_state(safe_state: SafeStateFn) -> Self {
        let mut factories: HashMap<String, TaskFactory> = HashMap::new();
        let default_state = safe_state.clone();
        factories.insert(
            DEFAULT_TASK_NAME.to_string(),
            Box::new(move || Box::new(StopTask::new(default_state.clone()))),
        );

        // The default entry starts active with the swap flag pending, so the
        // first iteration runs the full stop/start cycle.
        let inner = Inner {
            factories,
            instances: HashMap::new(),
            active: Box::new(StopTask::new(safe_state.clone())),
            active_name: DEFAULT_TASK_NAME.to_string(),
            active_from_instance: false,
            pending_name: Some(DEFAULT_TASK_NAME.to_string()),
            safe_state,
        };
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Register a factory entry; each activation constructs a fresh task.
    pub fn register<F>(&self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn() -> Box<dyn Task> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut inner = self.lock();
        if name_taken(&inner, &name) {
            return Err(TaskError::DuplicateName(name));
        }
        debug!(task = %name, "registered task factory");
        inner.factories.insert(name, Box::new(factory));
        Ok(())
    }

    /// Register a ready-made task; the same instance is reused across
    /// activations.
    pub fn register_instance(&self, name: impl Into<String>, task: Box<dyn Task>) -> Result<()> {
        let name = name.into();
        let mut inner = self.lock();
        if name_taken(&inner, &name) {
            return Err(TaskError::DuplicateName(name));
        }
        debug!(task = %name, "registered task instance");
        inner.instances.insert(name, task);
        Ok(())
    }

    /// Record the entry to activate on the next iteration.
    ///
    /// Never validates the name and never swaps inline; an unknown name is
    /// resolved (and reverted to the default) when the swap runs.
    pub fn request_switch(&self, name: impl Into<String>) {
        let name = name.into();
        debug!(task = %name, "task switch requested");
        self.lock().pending_name = Some(name);
    }

    /// Run one iteration of the active task, performing a pending swap
    /// first.
    pub fn run_active_iteration(&self) {
        let mut inner = self.lock();
        if let Some(name) = inner.pending_name.take() {
            perform_swap(&mut inner, name);
        }
        inner.active.loop_once();
    }

    pub fn active_name(&self) -> String {
        self.lock().active_name.clone()
    }

    /// Sorted names of every registered entry, the active one included.
    pub fn task_names(&self) -> Vec<String> {
        let inner = self.lock();
        let mut names: Vec<String> = inner
            .factories
            .keys()
            .chain(inner.instances.keys())
            .cloned()
            .collect();
        if inner.active_from_instance {
            names.push(inner.active_name.clone());
        }
        names.sort();
        names
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn name_taken(inner: &Inner, name: &str) -> bool {
    inner.factories.contains_key(name)
        || inner.instances.contains_key(name)
        || (inner.active_from_instance && inner.active_name == name)
}

fn perform_swap(inner: &mut Inner, name: String) {
    debug!(from = %inner.active_name, to = %name, "swapping active task");
    inner.active.stop();

    // Re-activating the checked-out instance restarts it in place.
    if inner.active_from_instance && inner.active_name == name {
        inner.active.start();
        return;
    }

    let (mut next, next_name, from_instance): (Box<dyn Task>, String, bool) =
        if let Some(task) = inner.instances.remove(&name) {
            (task, name, true)
        } else if let Some(factory) = inner.factories.get(&name) {
            (factory(), name, false)
        } else {
            warn!(task = %name, "unknown task requested, reverting to safe default");
            (
                Box::new(StopTask::new(inner.safe_state.clone())),
                DEFAULT_TASK_NAME.to_string(),
                false,
            )
        };

    next.start();
    let prev = std::mem::replace(&mut inner.active, next);
    let prev_name = std::mem::replace(&mut inner.active_name, next_name);
    if inner.active_from_instance {
        inner.instances.insert(prev_name, prev);
    }
    inner.active_from_instance = from_instance;
}
