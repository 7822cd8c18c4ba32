use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use robolink_tasks::DEFAULT_TASK_NAME;
use robolink_transport::{Channel, Datagram};
use robolink_wire::{
    frame_kind, Command, GamepadState, Heartbeat, MsgKind, PeerDiscovery, PeerType, Telemetry,
};

use crate::cancel::CancelToken;
use crate::commands::RecentCommands;
use crate::config::LinkConfig;
use crate::control::{ActiveLoop, ControlLoop};
use crate::error::{EngineError, Result};
use crate::state::{LinkState, StateMonitor};
use crate::sticky::StickyError;
use crate::sync::{ParticipantSet, SyncParticipant};

/// Telemetry tag for engine error reports.
pub const SYSTEM_TELEMETRY_TAG: &str = "SYSTEM_TELEMETRY";
/// Telemetry tag announcing that the engine is waiting for a task restart.
/// The single data entry carries the interrupted task's name.
pub const RESTART_TASK_TAG: &str = "RESTART_TASK";
/// Telemetry tag the peer sends once a requested restart has completed.
pub const RESTART_TASK_FINISHED_TAG: &str = "RESTART_TASK_FINISHED";

/// Coordinator for one control link.
///
/// A manager owns three worker loops over a shared [`Channel`]:
///
/// - the *receive loop* demultiplexes inbound datagrams: heartbeats are
///   echoed to the sender, gamepad state is stored, peer discovery connects
///   the channel, and commands are acknowledged, deduplicated, and handed to
///   the active control loop;
/// - the *retransmit loop* periodically resends queued commands until the
///   peer acknowledges them or the attempt ceiling is hit;
/// - the *driver loop* runs the active control loop's iterations, throttled
///   to a minimum period and gated on heartbeat freshness.
///
/// Handles are cheap to clone and share one engine.
#[derive(Clone)]
pub struct LinkManager {
    core: Arc<LinkCore>,
}

struct LinkCore {
    channel: Arc<dyn Channel>,
    config: LinkConfig,
    state: Mutex<LinkState>,
    monitor: Mutex<Option<Arc<dyn StateMonitor>>>,
    sticky: StickyError,
    active: Mutex<Arc<ActiveLoop>>,
    gamepads: Mutex<[GamepadState; 2]>,
    last_heartbeat: Mutex<Heartbeat>,
    heartbeat_seen: Mutex<Option<Instant>>,
    peer: Mutex<Option<IpAddr>>,
    send_cache: Mutex<Vec<Command>>,
    participants: ParticipantSet,
    waiting_for_restart: AtomicBool,
    last_active_task: Mutex<String>,
    shutdown_recv: AtomicBool,
    driver_cancel: Mutex<Option<CancelToken>>,
    resend: Mutex<Option<(CancelToken, JoinHandle<()>)>>,
    recv_handle: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl LinkManager {
    /// Create a manager over `channel`. No threads run until
    /// [`start`](LinkManager::start).
    pub fn new(channel: Arc<dyn Channel>, config: LinkConfig) -> Self {
        let core = LinkCore {
            channel,
            config,
            state: Mutex::new(LinkState::NotStarted),
            monitor: Mutex::new(None),
            sticky: StickyError::new(),
            active: Mutex::new(Arc::new(ActiveLoop::Empty)),
            gamepads: Mutex::new([GamepadState::unassociated(), GamepadState::unassociated()]),
            last_heartbeat: Mutex::new(Heartbeat::empty()),
            heartbeat_seen: Mutex::new(None),
            peer: Mutex::new(None),
            send_cache: Mutex::new(Vec::new()),
            participants: ParticipantSet::new(),
            waiting_for_restart: AtomicBool::new(false),
            last_active_task: Mutex::new(String::new()),
            shutdown_recv: AtomicBool::new(false),
            driver_cancel: Mutex::new(None),
            resend: Mutex::new(None),
            recv_handle: Mutex::new(None),
        };
        Self { core: Arc::new(core) }
    }

    /// Launch the receive and retransmit loops, then install and start
    /// `control_loop`.
    pub fn start(&self, control_loop: Box<dyn ControlLoop>) -> Result<()> {
        info!("link manager starting");
        self.core.shutdown_recv.store(false, Ordering::Release);
        self.spawn_resend_loop();
        self.spawn_recv_loop();
        self.set_control_loop(control_loop)
    }

    /// Replace the active control loop. The previous loop is stopped and
    /// torn down first.
    pub fn set_control_loop(&self, control_loop: Box<dyn ControlLoop>) -> Result<()> {
        self.stop_control_loop();
        *lock(&self.core.active) = Arc::new(ActiveLoop::User(control_loop));
        self.start_control_loop()
    }

    /// Stop everything: close the channel, wind down the worker loops, and
    /// tear down the active control loop.
    pub fn shutdown(&self) {
        info!("link manager shutting down");
        self.core.channel.close();
        if let Some((cancel, handle)) = lock(&self.core.resend).take() {
            cancel.cancel();
            let _ = handle.join();
        }
        self.core.shutdown_recv.store(true, Ordering::Release);
        if let Some(handle) = lock(&self.core.recv_handle).take() {
            let _ = handle.join();
        }
        self.stop_control_loop();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LinkState {
        *lock(&self.core.state)
    }

    /// Install `monitor` as the single state observer, replacing any
    /// previous one.
    pub fn set_monitor(&self, monitor: Arc<dyn StateMonitor>) {
        *lock(&self.core.monitor) = Some(monitor);
    }

    /// Latest state of the pad claimed by `user` (1 or 2).
    pub fn gamepad(&self, user: u8) -> Option<GamepadState> {
        if !(1..=2).contains(&user) {
            return None;
        }
        Some(lock(&self.core.gamepads)[usize::from(user - 1)].clone())
    }

    /// Most recent heartbeat received from the peer.
    pub fn last_heartbeat(&self) -> Heartbeat {
        lock(&self.core.last_heartbeat).clone()
    }

    /// Queue `command` for delivery. It is retransmitted every resend
    /// interval until the peer acknowledges it or the attempt ceiling is
    /// reached. Queueing an already queued command is a no-op.
    pub fn send_command(&self, command: Command) {
        let mut cache = lock(&self.core.send_cache);
        if !cache.contains(&command) {
            cache.push(command);
        }
    }

    /// Send `telemetry` to the peer. The payload is cleared afterwards so
    /// the value can be reused, keeping its tag.
    pub fn send_telemetry(&self, telemetry: &mut Telemetry) {
        self.core.send_telemetry(telemetry);
    }

    /// Send a one-entry telemetry frame whose tag and data key are both
    /// `tag`.
    pub fn build_and_send_telemetry(&self, tag: &str, message: &str) {
        self.core.build_and_send_telemetry(tag, message);
    }

    /// Handle to the shared first-error latch.
    pub fn sticky_error(&self) -> StickyError {
        self.core.sticky.clone()
    }

    /// Whether a dropped connection left the engine waiting for a restart.
    pub fn is_waiting_for_restart(&self) -> bool {
        self.core.waiting_for_restart.load(Ordering::Acquire)
    }

    /// Name of the task that was active when the connection dropped.
    pub fn last_active_task(&self) -> String {
        lock(&self.core.last_active_task).clone()
    }

    /// Resume after a dropped connection: clear the restart latch and the
    /// sticky error and declare the engine running again.
    pub fn restart(&self) {
        self.core.waiting_for_restart.store(false, Ordering::Release);
        self.core.sticky.clear();
        debug!(task = %self.last_active_task(), "restarting after dropped connection");
        self.core.change_state(LinkState::Running);
    }

    pub fn register_sync_participant(&self, participant: Arc<dyn SyncParticipant>) {
        self.core.participants.register(participant);
    }

    pub fn unregister_sync_participant(&self, participant: &Arc<dyn SyncParticipant>) {
        self.core.participants.unregister(participant);
    }

    fn spawn_recv_loop(&self) {
        let core = Arc::clone(&self.core);
        let spawned = thread::Builder::new()
            .name("robolink-recv".into())
            .spawn(move || recv_loop(core));
        match spawned {
            Ok(handle) => *lock(&self.core.recv_handle) = Some(handle),
            Err(e) => error!(error = %e, "failed to spawn receive loop"),
        }
    }

    fn spawn_resend_loop(&self) {
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let core = Arc::clone(&self.core);
        let spawned = thread::Builder::new()
            .name("robolink-resend".into())
            .spawn(move || resend_loop(core, worker_cancel));
        match spawned {
            Ok(handle) => *lock(&self.core.resend) = Some((cancel, handle)),
            Err(e) => error!(error = %e, "failed to spawn retransmit loop"),
        }
    }

    fn start_control_loop(&self) -> Result<()> {
        let core = &self.core;
        core.change_state(LinkState::Init);
        let active = core.active();
        if let Err(e) = active.init(self) {
            warn!(error = %e, "control loop failed to initialize");
            core.change_state(LinkState::EmergencyStop);
            if let Some(message) = core.sticky.get() {
                core.build_and_send_telemetry(SYSTEM_TELEMETRY_TAG, &message);
            }
            return Err(EngineError::ControlLoopInit(e));
        }
        for participant in core.participants.snapshot() {
            participant.begin_background_work();
        }
        *lock(&core.heartbeat_seen) = None;
        core.change_state(LinkState::Running);

        let cancel = CancelToken::new();
        *lock(&core.driver_cancel) = Some(cancel.clone());
        let worker = Arc::clone(core);
        let spawned = thread::Builder::new()
            .name("robolink-driver".into())
            .spawn(move || driver_loop(worker, cancel));
        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn control loop driver");
        }
        Ok(())
    }

    fn stop_control_loop(&self) {
        let core = &self.core;
        if let Some(cancel) = lock(&core.driver_cancel).take() {
            cancel.cancel();
        }
        // Let an in-flight iteration finish before tearing down under it.
        thread::sleep(core.config.shutdown_grace);
        core.change_state(LinkState::Stopped);
        let active = core.active();
        if let Err(e) = active.teardown() {
            warn!(error = %e, "control loop teardown failed");
            if let Some(message) = core.sticky.get() {
                core.build_and_send_telemetry(SYSTEM_TELEMETRY_TAG, &message);
            }
        }
        *lock(&core.active) = Arc::new(ActiveLoop::Empty);
        core.participants.clear();
    }
}

impl LinkCore {
    fn active(&self) -> Arc<ActiveLoop> {
        Arc::clone(&lock(&self.active))
    }

    fn change_state(&self, state: LinkState) {
        *lock(&self.state) = state;
        debug!(%state, "link state changed");
        // Taken out of the lock so the callback can call back into us.
        let monitor = lock(&self.monitor).clone();
        if let Some(monitor) = monitor {
            monitor.on_state_change(state);
        }
    }

    fn send_telemetry(&self, telemetry: &mut Telemetry) {
        match telemetry.encode() {
            Ok(frame) => self.channel.send(&frame),
            Err(e) => warn!(error = %e, "failed to encode telemetry"),
        }
        telemetry.clear_data();
    }

    fn build_and_send_telemetry(&self, tag: &str, message: &str) {
        let mut telemetry = Telemetry::new();
        telemetry.set_tag(tag);
        telemetry.add_data(tag, message);
        self.send_telemetry(&mut telemetry);
    }

    /// The peer's heartbeats went stale. Remember what was running, flag
    /// the engine as waiting for a restart, and swap in the safe default
    /// task.
    fn handle_dropped_connection(&self) {
        *lock(&self.peer) = None;
        let registry = self.active().task_registry();
        let active_name = registry
            .as_ref()
            .map(|r| r.active_name())
            .unwrap_or_default();
        if !self.waiting_for_restart.swap(true, Ordering::AcqRel) {
            *lock(&self.last_active_task) = active_name.clone();
        }
        warn!(task = %active_name, "connection to the peer lost");
        self.change_state(LinkState::DroppedConnection);
        if active_name != DEFAULT_TASK_NAME {
            self.sticky
                .set_if_empty(format!("Lost connection while running task: {active_name}"));
        }
        if let Some(registry) = registry {
            registry.request_switch(DEFAULT_TASK_NAME);
        }
    }

    fn process_gamepad(&self, datagram: &Datagram) {
        let pad = match GamepadState::decode(&datagram.data) {
            Ok(pad) => pad,
            Err(e) => {
                warn!(error = %e, "malformed gamepad frame");
                return;
            }
        };
        if !(1..=2).contains(&pad.user) {
            warn!(user = pad.user, "gamepad frame claims an invalid user slot");
            return;
        }
        let slot = usize::from(pad.user - 1);
        let mut pads = lock(&self.gamepads);
        pads[slot] = pad;
        // One physical device can only back one slot.
        if pads[0].id == pads[1].id {
            debug!(id = pads[0].id, "both slots claim one device, resetting the other");
            pads[1 - slot] = GamepadState::unassociated();
        }
    }

    fn process_heartbeat(&self, datagram: &Datagram) {
        // Echoed before decoding; the peer times the round trip.
        self.channel.send_to(&datagram.data, datagram.addr);
        *lock(&self.heartbeat_seen) = Some(Instant::now());
        match Heartbeat::decode(&datagram.data) {
            Ok(heartbeat) => *lock(&self.last_heartbeat) = heartbeat,
            Err(e) => warn!(error = %e, "malformed heartbeat frame"),
        }
    }

    fn process_peer_discovery(&self, datagram: &Datagram) {
        if Some(datagram.addr.ip()) == *lock(&self.peer) {
            return;
        }
        // Without a control loop we are not ready to accept a peer.
        if self.active().is_empty() {
            return;
        }

        info!(peer = %datagram.addr, "peer discovered");
        *lock(&self.peer) = Some(datagram.addr.ip());
        let target = SocketAddr::new(datagram.addr.ip(), self.config.peer_port);
        if let Err(e) = self.channel.connect(target) {
            error!(error = %e, "unable to connect to the peer");
        }
        match PeerDiscovery::new(PeerType::Peer).encode() {
            Ok(frame) => {
                if self.channel.peer_addr().is_none() {
                    self.channel.send_to(&frame, target);
                } else {
                    self.channel.send(&frame);
                }
            }
            Err(e) => warn!(error = %e, "failed to encode peer discovery reply"),
        }
    }

    fn process_command(&self, datagram: &Datagram, recent: &mut RecentCommands) {
        let mut command = match Command::decode(&datagram.data) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "malformed command frame");
                return;
            }
        };

        // The peer acknowledging one of ours.
        if command.is_acknowledged() {
            lock(&self.send_cache).retain(|queued| queued != &command);
            return;
        }

        command.acknowledge();
        match command.encode() {
            Ok(frame) => self.channel.send(&frame),
            Err(e) => warn!(error = %e, "failed to encode command acknowledgement"),
        }

        if recent.contains(&command) {
            return;
        }
        recent.insert(command.clone());

        debug!(command = %command.name(), "command received");
        if let Err(e) = self.active().handle_command(&command) {
            error!(command = %command.name(), error = %e, "command handler failed");
        }
    }
}

/// Demultiplexes inbound datagrams until the channel closes or shutdown is
/// requested.
fn recv_loop(core: Arc<LinkCore>) {
    debug!("receive loop started");
    let mut recent = RecentCommands::new();
    loop {
        let datagram = core.channel.recv();
        if core.shutdown_recv.load(Ordering::Acquire) || core.channel.is_closed() {
            break;
        }
        let Some(datagram) = datagram else {
            thread::yield_now();
            continue;
        };

        if let Some(message) = core.sticky.get() {
            core.build_and_send_telemetry(SYSTEM_TELEMETRY_TAG, &message);
        }
        if core.waiting_for_restart.load(Ordering::Acquire) {
            let last = lock(&core.last_active_task).clone();
            error!(task = %last, "cannot continue, waiting for a task restart");
            core.build_and_send_telemetry(RESTART_TASK_TAG, &last);
        }

        match frame_kind(&datagram.data) {
            Some(MsgKind::Gamepad) => core.process_gamepad(&datagram),
            Some(MsgKind::Heartbeat) => core.process_heartbeat(&datagram),
            Some(MsgKind::PeerDiscovery) => core.process_peer_discovery(&datagram),
            Some(MsgKind::Command) => core.process_command(&datagram, &mut recent),
            Some(MsgKind::Empty) | Some(MsgKind::Telemetry) | None => {}
        }
    }
    debug!("receive loop exited");
}

/// Sweeps the outbound command cache every resend interval.
fn resend_loop(core: Arc<LinkCore>, cancel: CancelToken) {
    debug!("command retransmit loop started");
    while !cancel.is_cancelled() {
        {
            let mut cache = lock(&core.send_cache);
            cache.retain_mut(|command| {
                if command.attempts() > core.config.max_command_attempts {
                    warn!(
                        command = %command.name(),
                        attempts = command.attempts(),
                        "giving up on unacknowledged command"
                    );
                    return false;
                }
                if command.is_acknowledged() {
                    debug!(command = %command.name(), "command acknowledged");
                    return false;
                }
                match command.encode() {
                    Ok(frame) => core.channel.send(&frame),
                    Err(e) => warn!(command = %command.name(), error = %e, "failed to encode command"),
                }
                true
            });
        }
        thread::sleep(core.config.resend_interval);
    }
    debug!("command retransmit loop exited");
}

/// Runs the active control loop's iterations until cancelled or the loop
/// raises an error.
fn driver_loop(core: Arc<LinkCore>, cancel: CancelToken) {
    debug!("control loop driver started");
    let mut last_iteration = Instant::now();
    'driver: while !cancel.is_cancelled() {
        while last_iteration.elapsed() < core.config.min_loop_interval {
            thread::sleep(core.config.throttle_resolution);
            if cancel.is_cancelled() {
                break 'driver;
            }
        }
        last_iteration = Instant::now();

        if let Some(message) = core.sticky.get() {
            core.build_and_send_telemetry(SYSTEM_TELEMETRY_TAG, &message);
        }

        let heartbeat_age = lock(&core.heartbeat_seen).map(|seen| seen.elapsed());
        match heartbeat_age {
            // No peer has ever spoken; idle until one does.
            None => {
                thread::sleep(core.config.heartbeat_wait);
                continue;
            }
            Some(age) if age > core.config.staleness_threshold => {
                core.handle_dropped_connection();
            }
            Some(_) => {}
        }

        for participant in core.participants.snapshot() {
            participant.block_until_ready();
        }
        let result = core.active().loop_once();
        for participant in core.participants.snapshot() {
            participant.begin_background_work();
        }

        if let Err(e) = result {
            error!(error = %e, "control loop iteration failed");
            core.sticky
                .set_if_empty(format!("Control loop raised an error: {e}"));
            if let Some(message) = core.sticky.get() {
                core.build_and_send_telemetry(SYSTEM_TELEMETRY_TAG, &message);
            }
            core.change_state(LinkState::EmergencyStop);
            break;
        }
    }
    debug!("control loop driver exited");
}
