//! Operator console side of a link: discover a robot, keep the link alive
//! with heartbeats, and print whatever telemetry it sends.
//!
//! Run with:
//!   cargo run --example console-link -- 127.0.0.1:20900

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use robolink::engine::DiscoveryAnnouncer;
use robolink::transport::{Channel, ChannelConfig, UdpChannel, LINK_PORT};
use robolink::wire::{frame_kind, Heartbeat, MsgKind, Telemetry};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let robot: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:20884".to_string())
        .parse()?;

    // The robot connects back to the link port, so bind it.
    let channel = Arc::new(UdpChannel::bind(ChannelConfig {
        port: LINK_PORT,
        peer_hint: Some(robot.ip()),
        ..ChannelConfig::default()
    })?);
    channel.connect(robot)?;
    eprintln!("console bound to {:?}", channel.local_addr());

    let mut announcer = DiscoveryAnnouncer::new(Arc::clone(&channel) as Arc<dyn Channel>);
    announcer.start(robot);

    // Heartbeats gate the robot's control loop; without them it never runs.
    let beat_channel = Arc::clone(&channel);
    std::thread::spawn(move || loop {
        match Heartbeat::new().encode() {
            Ok(frame) => beat_channel.send(&frame),
            Err(e) => eprintln!("heartbeat encode failed: {e}"),
        }
        std::thread::sleep(Duration::from_millis(100));
    });

    loop {
        let Some(datagram) = channel.recv() else {
            if channel.is_closed() {
                break;
            }
            continue;
        };
        match frame_kind(&datagram.data) {
            Some(MsgKind::Telemetry) => {
                if let Ok(telemetry) = Telemetry::decode(&datagram.data) {
                    eprintln!(
                        "[{}] {:?} {:?}",
                        telemetry.tag(),
                        telemetry.data_strings(),
                        telemetry.data_numbers()
                    );
                }
            }
            Some(MsgKind::PeerDiscovery) => eprintln!("robot answered from {}", datagram.addr),
            _ => {}
        }
    }

    announcer.stop();
    Ok(())
}
