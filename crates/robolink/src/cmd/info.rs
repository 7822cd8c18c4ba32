use serde::Serialize;

use robolink_engine::LinkConfig;
use robolink_transport::{LINK_PORT, TTL};
use robolink_wire::{command, gamepad, heartbeat, peer_discovery, telemetry};
use robolink_wire::{HEADER_LEN, MAX_PACKET_SIZE};

use crate::cmd::InfoArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct FrameKindInfo {
    id: u8,
    name: &'static str,
}

#[derive(Serialize)]
struct ProtocolInfo {
    schema_id: &'static str,
    link_port: u16,
    ttl: u32,
    header_len: usize,
    max_packet_size: usize,
    frame_kinds: Vec<FrameKindInfo>,
    max_command_string_len: usize,
    max_telemetry_entries: usize,
    heartbeat_sequence_wrap: u16,
    gamepad_version: u8,
    peer_discovery_version: u8,
    staleness_threshold_ms: u64,
    resend_interval_ms: u64,
    max_command_attempts: u8,
}

pub fn run(_args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let defaults = LinkConfig::default();
    let out = ProtocolInfo {
        schema_id: "https://schemas.openfield-robotics.dev/robolink/cli/v1/protocol-info.schema.json",
        link_port: LINK_PORT,
        ttl: TTL,
        header_len: HEADER_LEN,
        max_packet_size: MAX_PACKET_SIZE,
        frame_kinds: frame_kinds(),
        max_command_string_len: command::MAX_STRING_LEN,
        max_telemetry_entries: telemetry::MAX_DATA_ENTRIES,
        heartbeat_sequence_wrap: heartbeat::MAX_SEQUENCE_NUMBER,
        gamepad_version: gamepad::VERSION,
        peer_discovery_version: peer_discovery::VERSION,
        staleness_threshold_ms: defaults.staleness_threshold.as_millis() as u64,
        resend_interval_ms: defaults.resend_interval.as_millis() as u64,
        max_command_attempts: defaults.max_command_attempts,
    };

    print_info(&out, format);
    Ok(SUCCESS)
}

fn frame_kinds() -> Vec<FrameKindInfo> {
    vec![
        FrameKindInfo { id: 0, name: "empty" },
        FrameKindInfo { id: 1, name: "heartbeat" },
        FrameKindInfo { id: 2, name: "gamepad" },
        FrameKindInfo { id: 3, name: "peer-discovery" },
        FrameKindInfo { id: 4, name: "command" },
        FrameKindInfo { id: 5, name: "telemetry" },
    ]
}

fn print_info(out: &ProtocolInfo, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Protocol:");
            println!("  Link port:            {}", out.link_port);
            println!("  Packet TTL:           {}", out.ttl);
            println!("  Header length:        {} bytes", out.header_len);
            println!("  Max packet size:      {} bytes", out.max_packet_size);
            let kinds = out
                .frame_kinds
                .iter()
                .map(|k| format!("{} ({})", k.name, k.id))
                .collect::<Vec<_>>()
                .join(", ");
            println!("  Frame kinds:          {kinds}");
            println!("  Max command string:   {} bytes", out.max_command_string_len);
            println!("  Max telemetry keys:   {}", out.max_telemetry_entries);
            println!("  Heartbeat wraps at:   {}", out.heartbeat_sequence_wrap);
            println!(
                "  Versioned payloads:   gamepad v{}, peer discovery v{}",
                out.gamepad_version, out.peer_discovery_version
            );
            println!("Link defaults:");
            println!("  Staleness threshold:  {}ms", out.staleness_threshold_ms);
            println!("  Resend interval:      {}ms", out.resend_interval_ms);
            println!("  Max command attempts: {}", out.max_command_attempts);
        }
        OutputFormat::Raw => {
            println!("{}", out.link_port);
        }
    }
}
