use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use serde::Serialize;

use robolink_transport::{determine_bind_address, LINK_PORT};

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    schema_id: &'static str,
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(_args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let checks = vec![
        udp_socket_check(),
        link_port_check(),
        bind_route_check(),
        compiled_features_check(),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let overall = if has_fail { "fail" } else { "pass" };

    let output = DoctorOutput {
        schema_id: "https://schemas.openfield-robotics.dev/robolink/cli/v1/doctor-report.schema.json",
        checks,
        overall,
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn udp_socket_check() -> CheckResult {
    match UdpSocket::bind(("127.0.0.1", 0)) {
        Ok(socket) => {
            let port = socket.local_addr().map(|a| a.port()).unwrap_or(0);
            CheckResult {
                name: "udp_socket".to_string(),
                status: CheckStatus::Pass,
                detail: format!("ephemeral bind succeeded on port {port}"),
            }
        }
        Err(err) => CheckResult {
            name: "udp_socket".to_string(),
            status: CheckStatus::Fail,
            detail: format!("ephemeral UDP bind failed: {err}"),
        },
    }
}

fn link_port_check() -> CheckResult {
    match UdpSocket::bind(("0.0.0.0", LINK_PORT)) {
        Ok(_) => CheckResult {
            name: "link_port".to_string(),
            status: CheckStatus::Pass,
            detail: format!("port {LINK_PORT} is free"),
        },
        Err(err) if err.kind() == io::ErrorKind::AddrInUse => CheckResult {
            name: "link_port".to_string(),
            status: CheckStatus::Warn,
            detail: format!("port {LINK_PORT} is busy, a robot or console may already be running"),
        },
        Err(err) => CheckResult {
            name: "link_port".to_string(),
            status: CheckStatus::Fail,
            detail: format!("bind to port {LINK_PORT} failed: {err}"),
        },
    }
}

fn bind_route_check() -> CheckResult {
    // Documentation range address; the probe consults the routing table
    // without sending anything.
    let probe = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 1));
    let local = determine_bind_address(probe);
    let detail = if local.is_loopback() {
        format!("no routed interface, would bind {local}")
    } else {
        format!("routed interface {local}")
    };
    CheckResult {
        name: "bind_route".to_string(),
        status: CheckStatus::Info,
        detail,
    }
}

fn compiled_features_check() -> CheckResult {
    let mut features = Vec::new();
    if cfg!(feature = "engine") {
        features.push("engine");
    }
    if cfg!(feature = "cli") {
        features.push("cli");
    }

    CheckResult {
        name: "compiled_features".to_string(),
        status: CheckStatus::Info,
        detail: features.join(", "),
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("robolink doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<20} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doctor_output_has_overall_status() {
        let checks = vec![CheckResult {
            name: "x".to_string(),
            status: CheckStatus::Pass,
            detail: "ok".to_string(),
        }];
        let output = DoctorOutput {
            schema_id: "x",
            checks,
            overall: "pass",
        };
        let json = serde_json::to_string(&output).expect("doctor output should serialize");
        assert!(json.contains("\"overall\":\"pass\""));
    }

    #[test]
    fn udp_socket_check_passes_locally() {
        let check = udp_socket_check();
        assert!(matches!(check.status, CheckStatus::Pass));
    }
}
