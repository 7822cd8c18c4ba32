//! Minimal robot side of a control link.
//!
//! Run with:
//!   cargo run --example minimal-robot
//!
//! In another terminal:
//!   cargo run --features cli -- console 127.0.0.1:20900 \
//!     --command switch-task --extra blink

use std::sync::Arc;
use std::time::Duration;

use robolink::engine::{ControlLoop, LinkConfig, LinkManager, LoopError};
use robolink::tasks::{Task, TaskRegistry};
use robolink::transport::{ChannelConfig, UdpChannel};
use robolink::wire::Command;

struct BlinkTask {
    on: bool,
}

impl Task for BlinkTask {
    fn start(&mut self) {
        eprintln!("blink task started");
    }

    fn loop_once(&mut self) {
        self.on = !self.on;
    }

    fn stop(&mut self) {
        eprintln!("blink task stopped");
    }
}

struct DemoLoop {
    registry: Arc<TaskRegistry>,
}

impl ControlLoop for DemoLoop {
    fn init(&self, _manager: &LinkManager) -> Result<(), LoopError> {
        eprintln!("control loop ready, tasks: {:?}", self.registry.task_names());
        Ok(())
    }

    fn loop_once(&self) -> Result<(), LoopError> {
        self.registry.run_active_iteration();
        Ok(())
    }

    fn teardown(&self) -> Result<(), LoopError> {
        Ok(())
    }

    fn handle_command(&self, command: &Command) -> Result<(), LoopError> {
        if command.name() == "switch-task" {
            self.registry.request_switch(command.extra());
        }
        Ok(())
    }

    fn task_registry(&self) -> Option<Arc<TaskRegistry>> {
        Some(Arc::clone(&self.registry))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let channel = UdpChannel::bind(ChannelConfig {
        port: 20900,
        ..ChannelConfig::default()
    })?;
    eprintln!("robot listening on {:?}", channel.local_addr());

    let manager = LinkManager::new(Arc::new(channel), LinkConfig::default());

    let registry = Arc::new(TaskRegistry::new());
    registry.register("blink", || Box::new(BlinkTask { on: false }) as Box<dyn Task>)?;

    manager.start(Box::new(DemoLoop { registry }))?;

    // Runs for a minute, then shuts the link down.
    std::thread::sleep(Duration::from_secs(60));
    manager.shutdown();
    Ok(())
}
