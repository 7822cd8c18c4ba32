//! Byte-exact codecs for the robolink control protocol.
//!
//! Every message is framed with:
//! - A 1-byte kind tag ([`MsgKind`])
//! - A 2-byte big-endian payload length
//!
//! Unknown tags decode as [`MsgKind::Empty`] rather than failing, so a
//! newer peer never breaks an older one. Versioned kinds (gamepad,
//! peer discovery) carry their own version byte and grow additively.

pub mod command;
pub mod error;
pub mod frame;
pub mod gamepad;
pub mod heartbeat;
pub mod peer_discovery;
pub mod telemetry;

mod clock;

pub use command::Command;
pub use error::{Result, WireError};
pub use frame::{frame_kind, MsgKind, HEADER_LEN, MAX_PACKET_SIZE};
pub use gamepad::GamepadState;
pub use heartbeat::Heartbeat;
pub use peer_discovery::{PeerDiscovery, PeerType};
pub use telemetry::Telemetry;
