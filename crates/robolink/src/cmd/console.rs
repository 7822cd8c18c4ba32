use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use robolink_engine::DiscoveryAnnouncer;
use robolink_transport::{Channel, ChannelConfig, UdpChannel};
use robolink_wire::{frame_kind, Command, Heartbeat, MsgKind, Telemetry};

use crate::cmd::ConsoleArgs;
use crate::exit::{io_error, transport_error, wire_error, CliError, CliResult, SUCCESS};
use crate::output::{print_command_ack, print_telemetry, OutputFormat};

const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ConsoleArgs, format: OutputFormat) -> CliResult<i32> {
    let channel = Arc::new(
        UdpChannel::bind(ChannelConfig {
            port: args.bind_port,
            peer_hint: Some(args.robot.ip()),
            ..ChannelConfig::default()
        })
        .map_err(|err| transport_error("bind failed", err))?,
    );
    channel
        .connect(args.robot)
        .map_err(|err| transport_error("connect failed", err))?;
    info!(robot = %args.robot, "console link up, announcing presence");

    let mut pending = match &args.command {
        Some(name) => Some(
            Command::new(name.clone(), args.extra.clone())
                .map_err(|err| wire_error("invalid command", err))?,
        ),
        None => None,
    };

    let mut announcer = DiscoveryAnnouncer::new(Arc::clone(&channel) as Arc<dyn Channel>);
    announcer.start(args.robot);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), Arc::clone(&channel))?;

    // Sequence number to send time, so echoes yield a round trip.
    let outstanding: Arc<Mutex<HashMap<u16, Instant>>> = Arc::new(Mutex::new(HashMap::new()));
    let heartbeats = spawn_heartbeats(
        Arc::clone(&channel),
        running.clone(),
        Arc::clone(&outstanding),
    )?;

    let mut printed = 0usize;
    let mut discovered = false;
    let mut command_sent_at: Option<Instant> = None;

    while running.load(Ordering::SeqCst) {
        let Some(datagram) = channel.recv() else {
            if channel.is_closed() {
                break;
            }
            continue;
        };

        match frame_kind(&datagram.data) {
            Some(MsgKind::Telemetry) => match Telemetry::decode(&datagram.data) {
                Ok(telemetry) => {
                    print_telemetry(&telemetry, datagram.addr, format);
                    printed = printed.saturating_add(1);
                    if let Some(count) = args.count {
                        if printed >= count {
                            break;
                        }
                    }
                }
                Err(err) => warn!(error = %err, "discarding malformed telemetry"),
            },
            Some(MsgKind::Heartbeat) => match Heartbeat::decode(&datagram.data) {
                Ok(echo) => {
                    let sent = outstanding
                        .lock()
                        .unwrap_or_else(|err| err.into_inner())
                        .remove(&echo.sequence_number());
                    if let Some(at) = sent {
                        debug!(
                            seq = echo.sequence_number(),
                            rtt_ms = at.elapsed().as_secs_f64() * 1000.0,
                            "heartbeat echoed"
                        );
                    }
                }
                Err(err) => warn!(error = %err, "discarding malformed heartbeat"),
            },
            Some(MsgKind::Command) => match Command::decode(&datagram.data) {
                Ok(inbound) => {
                    if inbound.is_acknowledged() {
                        if pending.as_ref() == Some(&inbound) {
                            let round_trip =
                                command_sent_at.map(|at| at.elapsed().as_secs_f64() * 1000.0);
                            print_command_ack(inbound.name(), inbound.extra(), round_trip, format);
                            pending = None;
                        }
                    } else {
                        let mut ack = inbound.clone();
                        ack.acknowledge();
                        match ack.encode() {
                            Ok(frame) => channel.send(&frame),
                            Err(err) => warn!(error = %err, "failed to encode acknowledgement"),
                        }
                        info!(
                            command = %inbound.name(),
                            extra = %inbound.extra(),
                            "command from robot"
                        );
                    }
                }
                Err(err) => warn!(error = %err, "discarding malformed command"),
            },
            Some(MsgKind::PeerDiscovery) => {
                if !discovered {
                    discovered = true;
                    info!(robot = %datagram.addr, "robot answered discovery");
                    if let Some(command) = pending.as_mut() {
                        match command.encode() {
                            Ok(frame) => {
                                command_sent_at = Some(Instant::now());
                                channel.send(&frame);
                            }
                            Err(err) => warn!(error = %err, "failed to encode command"),
                        }
                    }
                }
            }
            Some(MsgKind::Empty) | Some(MsgKind::Gamepad) | None => {}
        }
    }

    running.store(false, Ordering::SeqCst);
    announcer.stop();
    channel.close();
    let _ = heartbeats.join();
    Ok(SUCCESS)
}

fn spawn_heartbeats(
    channel: Arc<UdpChannel>,
    running: Arc<AtomicBool>,
    outstanding: Arc<Mutex<HashMap<u16, Instant>>>,
) -> CliResult<JoinHandle<()>> {
    thread::Builder::new()
        .name("robolink-heartbeat".into())
        .spawn(move || {
            while running.load(Ordering::SeqCst) {
                let heartbeat = Heartbeat::new();
                match heartbeat.encode() {
                    Ok(frame) => {
                        outstanding
                            .lock()
                            .unwrap_or_else(|err| err.into_inner())
                            .insert(heartbeat.sequence_number(), Instant::now());
                        channel.send(&frame);
                    }
                    Err(err) => warn!(error = %err, "failed to encode heartbeat"),
                }
                thread::sleep(HEARTBEAT_INTERVAL);
            }
        })
        .map_err(|err| io_error("heartbeat thread spawn failed", err))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>, channel: Arc<UdpChannel>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        channel.close();
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
