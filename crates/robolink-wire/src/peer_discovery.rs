use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::error::Result;
use crate::frame::{self, MsgKind, HEADER_LEN};

/// Current peer-discovery format version.
pub const VERSION: u8 = 1;

/// Declared payload size. Only the version and peer-type bytes are
/// populated; the remainder is reserved and must stay zero on the wire.
pub const PAYLOAD_LEN: usize = 10;

const WIRE_LEN: usize = HEADER_LEN + PAYLOAD_LEN;

/// Role a peer announces for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PeerType {
    NotSet = 0,
    Peer = 1,
    GroupOwner = 2,
}

impl PeerType {
    pub fn from_byte(b: u8) -> PeerType {
        match b {
            0 => PeerType::NotSet,
            1 => PeerType::Peer,
            2 => PeerType::GroupOwner,
            other => {
                warn!(peer_type = other, "unrecognized peer type");
                PeerType::NotSet
            }
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Presence announcement exchanged to pair a robot with its console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDiscovery {
    peer_type: PeerType,
}

impl PeerDiscovery {
    pub fn new(peer_type: PeerType) -> Self {
        Self { peer_type }
    }

    pub fn peer_type(&self) -> PeerType {
        self.peer_type
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(WIRE_LEN);
        frame::put_header(&mut buf, MsgKind::PeerDiscovery, PAYLOAD_LEN);
        buf.put_u8(VERSION);
        buf.put_u8(self.peer_type.as_byte());
        buf.put_bytes(0, PAYLOAD_LEN - 2);
        Ok(buf.freeze())
    }

    /// Decode from the wire. An unknown version yields `NotSet`; the fields
    /// it would carry cannot be interpreted.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        frame::check_len(buf, WIRE_LEN)?;
        let mut p = &buf[HEADER_LEN..];
        let version = p.get_u8();
        let peer_type = match version {
            1 => PeerType::from_byte(p.get_u8()),
            _ => PeerType::NotSet,
        };
        Ok(Self { peer_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_peer_type() {
        for peer_type in [PeerType::NotSet, PeerType::Peer, PeerType::GroupOwner] {
            let msg = PeerDiscovery::new(peer_type);
            let encoded = msg.encode().unwrap();
            assert_eq!(PeerDiscovery::decode(&encoded).unwrap(), msg);
        }
    }

    #[test]
    fn payload_keeps_its_declared_size() {
        let encoded = PeerDiscovery::new(PeerType::Peer).encode().unwrap();
        assert_eq!(encoded.len(), WIRE_LEN);
        // Reserved bytes stay zero.
        assert!(encoded[HEADER_LEN + 2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn unknown_version_decodes_as_not_set() {
        let mut encoded = PeerDiscovery::new(PeerType::GroupOwner)
            .encode()
            .unwrap()
            .to_vec();
        encoded[HEADER_LEN] = 9;
        let decoded = PeerDiscovery::decode(&encoded).unwrap();
        assert_eq!(decoded.peer_type(), PeerType::NotSet);
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let encoded = PeerDiscovery::new(PeerType::Peer).encode().unwrap();
        assert!(PeerDiscovery::decode(&encoded[..WIRE_LEN - 1]).is_err());
    }
}
