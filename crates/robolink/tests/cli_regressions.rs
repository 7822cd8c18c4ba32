#![cfg(all(unix, feature = "cli"))]

use std::net::UdpSocket;
use std::process::{Command, Output, Stdio};

fn robolink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_robolink"))
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("robolink binary should run")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).expect("stdout should be one JSON document")
}

/// Two ports that are free and guaranteed distinct.
fn two_free_udp_ports() -> (u16, u16) {
    let a = UdpSocket::bind("127.0.0.1:0").expect("ephemeral bind should succeed");
    let b = UdpSocket::bind("127.0.0.1:0").expect("ephemeral bind should succeed");
    let first = a.local_addr().expect("bound socket has an address").port();
    let second = b.local_addr().expect("bound socket has an address").port();
    (first, second)
}

#[test]
fn version_prints_name_and_version() {
    let output = robolink(&["version"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("robolink "), "unexpected stdout: {stdout}");
}

#[test]
fn info_json_reports_protocol_constants() {
    let output = robolink(&["--format", "json", "info"]);
    assert_eq!(output.status.code(), Some(0));
    let value = stdout_json(&output);
    assert_eq!(value["link_port"], 20884);
    assert_eq!(value["max_packet_size"], 4098);
    assert_eq!(value["frame_kinds"].as_array().map(Vec::len), Some(6));
}

#[test]
fn doctor_json_reports_overall_status() {
    let output = robolink(&["--format", "json", "doctor"]);
    let code = output.status.code();
    assert!(
        code == Some(0) || code == Some(30),
        "unexpected exit code: {code:?}"
    );
    let value = stdout_json(&output);
    assert!(value["overall"].is_string());
    assert!(!value["checks"].as_array().expect("checks array").is_empty());
}

#[test]
fn envinfo_json_carries_the_package_version() {
    let output = robolink(&["--format", "json", "envinfo"]);
    assert_eq!(output.status.code(), Some(0));
    let value = stdout_json(&output);
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    let output = robolink(&["frobnicate"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn send_times_out_when_nobody_answers() {
    // Held open and never read, so announcements disappear into it.
    let dead = UdpSocket::bind("127.0.0.1:0").expect("ephemeral bind should succeed");
    let port = dead.local_addr().expect("bound socket has an address").port();

    let output = robolink(&[
        "--log-level",
        "error",
        "send",
        &format!("127.0.0.1:{port}"),
        "ping",
        "--bind-port",
        "0",
        "--timeout",
        "300ms",
    ]);
    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn robot_acknowledges_a_command_end_to_end() {
    let (robot_port, console_port) = two_free_udp_ports();

    let mut robot = Command::new(env!("CARGO_BIN_EXE_robolink"))
        .args([
            "--log-level",
            "error",
            "run",
            "--port",
            &robot_port.to_string(),
            "--console-port",
            &console_port.to_string(),
            "--peer-hint",
            "127.0.0.1",
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("robot should start");

    let output = robolink(&[
        "--format",
        "json",
        "--log-level",
        "error",
        "send",
        &format!("127.0.0.1:{robot_port}"),
        "status",
        "--bind-port",
        &console_port.to_string(),
        "--timeout",
        "10s",
    ]);

    let _ = robot.kill();
    let _ = robot.wait();

    assert_eq!(
        output.status.code(),
        Some(0),
        "send failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let value = stdout_json(&output);
    assert_eq!(value["name"], "status");
    assert_eq!(value["acknowledged"], true);
}
