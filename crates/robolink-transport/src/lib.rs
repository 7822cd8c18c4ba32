//! UDP datagram channel for the robolink control protocol.
//!
//! The link runs over plain datagrams: no connection handshake, no
//! retransmission here (the engine layers its own acknowledgment on top).
//! This crate provides:
//! - The [`Channel`] trait the engine is written against
//! - [`UdpChannel`], the real socket implementation
//! - Bind-address selection that prefers a routed interface over loopback

pub mod bind;
pub mod channel;
pub mod error;
pub mod udp;

pub use bind::determine_bind_address;
pub use channel::{Channel, Datagram};
pub use error::{Result, TransportError};
pub use udp::{ChannelConfig, UdpChannel, LINK_PORT, TTL};
