use std::net::{IpAddr, SocketAddr};

use clap::{Args, Subcommand};

use robolink_transport::LINK_PORT;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod console;
pub mod doctor;
pub mod envinfo;
pub mod info;
pub mod run;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the robot side of a control link.
    Run(RunArgs),
    /// Act as an operator console: discover a robot, keep it alive, print
    /// its telemetry.
    Console(ConsoleArgs),
    /// Send one command to a robot and wait for the acknowledgement.
    Send(SendArgs),
    /// Show protocol constants and defaults.
    Info(InfoArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Console(args) => console::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// UDP port to listen on.
    #[arg(long, env = "ROBOLINK_PORT", default_value_t = LINK_PORT)]
    pub port: u16,
    /// Port the operator console listens on, for the connect-back after
    /// discovery.
    #[arg(long, default_value_t = LINK_PORT)]
    pub console_port: u16,
    /// Expected console address, used to pick the bind interface.
    #[arg(long, value_name = "IP")]
    pub peer_hint: Option<IpAddr>,
}

#[derive(Args, Debug)]
pub struct ConsoleArgs {
    /// Robot address to link with.
    pub robot: SocketAddr,
    /// UDP port to bind locally. The robot connects back to this port.
    #[arg(long, default_value_t = LINK_PORT)]
    pub bind_port: u16,
    /// Send one command once the link is up.
    #[arg(long, value_name = "NAME")]
    pub command: Option<String>,
    /// Payload for --command.
    #[arg(long, default_value = "", requires = "command")]
    pub extra: String,
    /// Exit after printing N telemetry frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Robot address.
    pub robot: SocketAddr,
    /// Command name.
    pub name: String,
    /// Command payload.
    #[arg(long, default_value = "")]
    pub extra: String,
    /// UDP port to bind locally. The robot acknowledges to this port.
    #[arg(long, default_value_t = LINK_PORT)]
    pub bind_port: u16,
    /// Overall deadline for discovery plus acknowledgement (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug, Default)]
pub struct InfoArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}
