use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use robolink_engine::{
    ControlLoop, LinkConfig, LinkManager, LoopError, RESTART_TASK_FINISHED_TAG,
};
use robolink_tasks::{Task, TaskRegistry, DEFAULT_TASK_NAME};
use robolink_transport::{ChannelConfig, UdpChannel};
use robolink_wire::Command as WireCommand;

use crate::cmd::RunArgs;
use crate::exit::{engine_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: RunArgs, _format: OutputFormat) -> CliResult<i32> {
    let channel = UdpChannel::bind(ChannelConfig {
        port: args.port,
        peer_hint: args.peer_hint,
        ..ChannelConfig::default()
    })
    .map_err(|err| transport_error("bind failed", err))?;

    if let Some(addr) = channel.local_addr() {
        info!(%addr, console_port = args.console_port, "robot link listening");
    }

    let manager = LinkManager::new(
        Arc::new(channel),
        LinkConfig {
            peer_port: args.console_port,
            ..LinkConfig::default()
        },
    );

    let registry = Arc::new(TaskRegistry::with_safe_state(Arc::new(|| {
        debug!("actuators held in a safe state");
    })));
    register_demo_tasks(&registry, &manager)?;

    manager
        .start(Box::new(RegistryLoop::new(Arc::clone(&registry))))
        .map_err(|err| engine_error("start failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    info!("shutting down");
    manager.shutdown();
    Ok(SUCCESS)
}

fn register_demo_tasks(registry: &Arc<TaskRegistry>, manager: &LinkManager) -> CliResult<()> {
    registry
        .register("idle", || Box::new(IdleTask) as Box<dyn Task>)
        .map_err(|err| CliError::new(INTERNAL, format!("task registration failed: {err}")))?;

    let handle = manager.clone();
    registry
        .register("telemetry-demo", move || {
            Box::new(UptimeTask::new(handle.clone())) as Box<dyn Task>
        })
        .map_err(|err| CliError::new(INTERNAL, format!("task registration failed: {err}")))?;

    Ok(())
}

/// Control loop that delegates every iteration to a task registry and maps
/// inbound commands onto task swaps.
struct RegistryLoop {
    registry: Arc<TaskRegistry>,
    manager: Mutex<Option<LinkManager>>,
}

impl RegistryLoop {
    fn new(registry: Arc<TaskRegistry>) -> Self {
        Self {
            registry,
            manager: Mutex::new(None),
        }
    }
}

impl ControlLoop for RegistryLoop {
    fn init(&self, manager: &LinkManager) -> Result<(), LoopError> {
        *self
            .manager
            .lock()
            .unwrap_or_else(|err| err.into_inner()) = Some(manager.clone());
        info!(tasks = ?self.registry.task_names(), "control loop ready");
        Ok(())
    }

    fn loop_once(&self) -> Result<(), LoopError> {
        self.registry.run_active_iteration();
        Ok(())
    }

    fn teardown(&self) -> Result<(), LoopError> {
        self.registry.request_switch(DEFAULT_TASK_NAME);
        Ok(())
    }

    fn handle_command(&self, command: &WireCommand) -> Result<(), LoopError> {
        match command.name() {
            "switch-task" => {
                info!(task = %command.extra(), "switching task");
                self.registry.request_switch(command.extra());
            }
            "restart" | RESTART_TASK_FINISHED_TAG => {
                let handle = self
                    .manager
                    .lock()
                    .unwrap_or_else(|err| err.into_inner())
                    .clone();
                if let Some(manager) = handle {
                    manager.restart();
                }
            }
            "status" => {
                let handle = self
                    .manager
                    .lock()
                    .unwrap_or_else(|err| err.into_inner())
                    .clone();
                if let Some(manager) = handle {
                    manager.build_and_send_telemetry("STATUS", &self.registry.active_name());
                }
            }
            other => warn!(command = %other, "unhandled command"),
        }
        Ok(())
    }

    fn task_registry(&self) -> Option<Arc<TaskRegistry>> {
        Some(Arc::clone(&self.registry))
    }
}

/// Placeholder task that does nothing each iteration.
struct IdleTask;

impl Task for IdleTask {
    fn start(&mut self) {
        debug!("idle task started");
    }

    fn loop_once(&mut self) {}

    fn stop(&mut self) {
        debug!("idle task stopped");
    }
}

/// Reports link uptime over telemetry about once a second.
struct UptimeTask {
    manager: LinkManager,
    started: Option<Instant>,
    iterations: u64,
}

impl UptimeTask {
    fn new(manager: LinkManager) -> Self {
        Self {
            manager,
            started: None,
            iterations: 0,
        }
    }
}

impl Task for UptimeTask {
    fn start(&mut self) {
        self.started = Some(Instant::now());
        self.iterations = 0;
    }

    fn loop_once(&mut self) {
        self.iterations += 1;
        if self.iterations % 1000 != 0 {
            return;
        }
        if let Some(started) = self.started {
            let mut telemetry = robolink_wire::Telemetry::new();
            telemetry.set_tag("UPTIME");
            telemetry.add_number("seconds", started.elapsed().as_secs_f32());
            self.manager.send_telemetry(&mut telemetry);
        }
    }

    fn stop(&mut self) {
        self.started = None;
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
