use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use robolink_transport::{Channel, ChannelConfig, UdpChannel};
use robolink_wire::{frame_kind, Command, MsgKind, PeerDiscovery, PeerType};

use crate::cmd::SendArgs;
use crate::exit::{
    io_error, transport_error, wire_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE,
};
use crate::output::{print_command_ack, OutputFormat};

const PUMP_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;

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

    let command = Command::new(args.name.clone(), args.extra.clone())
        .map_err(|err| wire_error("invalid command", err))?;
    let probe = command.clone();

    let discovered = Arc::new(AtomicBool::new(false));
    let done = Arc::new(AtomicBool::new(false));
    let sent_at: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));

    spawn_pump(
        Arc::clone(&channel),
        command,
        discovered.clone(),
        done.clone(),
        Arc::clone(&sent_at),
    )?;
    spawn_deadline(Arc::clone(&channel), done.clone(), timeout)?;

    loop {
        let Some(datagram) = channel.recv() else {
            if channel.is_closed() {
                break;
            }
            continue;
        };

        match frame_kind(&datagram.data) {
            Some(MsgKind::PeerDiscovery) => {
                if !discovered.swap(true, Ordering::SeqCst) {
                    debug!(robot = %datagram.addr, "robot answered discovery");
                }
            }
            Some(MsgKind::Command) => match Command::decode(&datagram.data) {
                Ok(inbound) => {
                    if inbound.is_acknowledged() && inbound == probe {
                        done.store(true, Ordering::SeqCst);
                        let round_trip = sent_at
                            .lock()
                            .unwrap_or_else(|err| err.into_inner())
                            .map(|at| at.elapsed().as_secs_f64() * 1000.0);
                        print_command_ack(inbound.name(), inbound.extra(), round_trip, format);
                        channel.close();
                        return Ok(SUCCESS);
                    }
                }
                Err(err) => warn!(error = %err, "discarding malformed command"),
            },
            _ => {}
        }
    }

    Err(CliError::new(
        TIMEOUT,
        format!(
            "no acknowledgement from {} within {}",
            args.robot, args.timeout
        ),
    ))
}

/// Announces until the robot answers, then retransmits the command until the
/// acknowledgement lands or the deadline closes the channel.
fn spawn_pump(
    channel: Arc<UdpChannel>,
    mut command: Command,
    discovered: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    sent_at: Arc<Mutex<Option<Instant>>>,
) -> CliResult<()> {
    thread::Builder::new()
        .name("robolink-send-pump".into())
        .spawn(move || {
            while !done.load(Ordering::SeqCst) && !channel.is_closed() {
                if discovered.load(Ordering::SeqCst) {
                    match command.encode() {
                        Ok(frame) => {
                            let mut at = sent_at.lock().unwrap_or_else(|err| err.into_inner());
                            at.get_or_insert_with(Instant::now);
                            drop(at);
                            channel.send(&frame);
                        }
                        Err(err) => warn!(error = %err, "failed to encode command"),
                    }
                } else {
                    match PeerDiscovery::new(PeerType::Peer).encode() {
                        Ok(frame) => channel.send(&frame),
                        Err(err) => warn!(error = %err, "failed to encode peer discovery frame"),
                    }
                }
                thread::sleep(PUMP_INTERVAL);
            }
        })
        .map_err(|err| io_error("send pump spawn failed", err))?;
    Ok(())
}

fn spawn_deadline(
    channel: Arc<UdpChannel>,
    done: Arc<AtomicBool>,
    timeout: Duration,
) -> CliResult<()> {
    thread::Builder::new()
        .name("robolink-send-deadline".into())
        .spawn(move || {
            thread::sleep(timeout);
            if !done.load(Ordering::SeqCst) {
                channel.close();
            }
        })
        .map_err(|err| io_error("deadline timer spawn failed", err))?;
    Ok(())
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("bad").is_err());
    }
}
