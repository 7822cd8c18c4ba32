use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::net::SocketAddr;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use robolink_wire::Telemetry;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct TelemetryOutput<'a> {
    schema_id: &'a str,
    tag: &'a str,
    timestamp: i64,
    from: String,
    data: BTreeMap<&'a str, &'a str>,
    numbers: BTreeMap<&'a str, f32>,
}

pub fn print_telemetry(telemetry: &Telemetry, from: SocketAddr, format: OutputFormat) {
    // Maps come off the wire unordered; sort for stable output.
    let data: BTreeMap<&str, &str> = telemetry
        .data_strings()
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let numbers: BTreeMap<&str, f32> = telemetry
        .data_numbers()
        .iter()
        .map(|(k, v)| (k.as_str(), *v))
        .collect();

    match format {
        OutputFormat::Json => {
            let out = TelemetryOutput {
                schema_id:
                    "https://schemas.openfield-robotics.dev/robolink/cli/v1/telemetry.schema.json",
                tag: telemetry.tag(),
                timestamp: telemetry.timestamp(),
                from: from.to_string(),
                data,
                numbers,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TAG", "KEY", "VALUE"]);
            for (key, value) in &data {
                table.add_row(vec![telemetry.tag(), key, value]);
            }
            for (key, value) in &numbers {
                table.add_row(vec![
                    telemetry.tag().to_string(),
                    (*key).to_string(),
                    value.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let entries: Vec<String> = data
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .chain(numbers.iter().map(|(k, v)| format!("{k}={v}")))
                .collect();
            println!(
                "telemetry tag={} from={} {}",
                telemetry.tag(),
                from,
                entries.join(" ")
            );
        }
        OutputFormat::Raw => {
            for (key, value) in &data {
                println!("{key}={value}");
            }
            for (key, value) in &numbers {
                println!("{key}={value}");
            }
        }
    }
}

#[derive(Serialize)]
struct CommandOutput<'a> {
    schema_id: &'a str,
    name: &'a str,
    extra: &'a str,
    acknowledged: bool,
    round_trip_ms: Option<f64>,
}

pub fn print_command_ack(
    name: &str,
    extra: &str,
    round_trip_ms: Option<f64>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = CommandOutput {
                schema_id:
                    "https://schemas.openfield-robotics.dev/robolink/cli/v1/command-ack.schema.json",
                name,
                extra,
                acknowledged: true,
                round_trip_ms,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => match round_trip_ms {
            Some(ms) => println!("acknowledged: {name} ({ms:.1}ms)"),
            None => println!("acknowledged: {name}"),
        },
        OutputFormat::Raw => {
            println!("{name}");
        }
    }
}
