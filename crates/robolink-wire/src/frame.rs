use std::fmt;

use bytes::{Buf, BufMut, BytesMut};
use tracing::warn;

use crate::error::{Result, WireError};

/// Frame header: kind tag (1) + payload length (2, big-endian) = 3 bytes.
pub const HEADER_LEN: usize = 3;

/// Largest datagram either side will send or buffer for receive.
pub const MAX_PACKET_SIZE: usize = 4098;

/// Message kind tag carried in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgKind {
    Empty = 0,
    Heartbeat = 1,
    Gamepad = 2,
    PeerDiscovery = 3,
    Command = 4,
    Telemetry = 5,
}

impl MsgKind {
    /// Map a tag byte to a kind.
    ///
    /// Unrecognized tags map to [`MsgKind::Empty`] with a logged warning so
    /// a newer peer never breaks an older one.
    pub fn from_byte(tag: u8) -> MsgKind {
        match tag {
            0 => MsgKind::Empty,
            1 => MsgKind::Heartbeat,
            2 => MsgKind::Gamepad,
            3 => MsgKind::PeerDiscovery,
            4 => MsgKind::Command,
            5 => MsgKind::Telemetry,
            other => {
                warn!(tag = other, "unrecognized message tag, treating as empty");
                MsgKind::Empty
            }
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MsgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MsgKind::Empty => "empty",
            MsgKind::Heartbeat => "heartbeat",
            MsgKind::Gamepad => "gamepad",
            MsgKind::PeerDiscovery => "peer-discovery",
            MsgKind::Command => "command",
            MsgKind::Telemetry => "telemetry",
        };
        f.write_str(name)
    }
}

/// Peek the kind of a framed message.
///
/// Returns `None` if the buffer is too short to hold a header.
pub fn frame_kind(buf: &[u8]) -> Option<MsgKind> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    Some(MsgKind::from_byte(buf[0]))
}

/// Write the 3-byte header.
pub(crate) fn put_header(dst: &mut BytesMut, kind: MsgKind, payload_len: usize) {
    dst.put_u8(kind.as_byte());
    dst.put_u16(payload_len as u16);
}

/// Fail with [`WireError::ShortBuffer`] unless `buf` holds at least `needed` bytes.
pub(crate) fn check_len(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(WireError::ShortBuffer {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

/// Read one byte off the front of `p`.
pub(crate) fn take_u8(p: &mut &[u8]) -> Result<u8> {
    if p.remaining() < 1 {
        return Err(WireError::ShortBuffer {
            needed: 1,
            available: 0,
        });
    }
    Ok(p.get_u8())
}

/// Read a length-prefixed string off the front of `p`.
///
/// Invalid UTF-8 decodes lossily rather than failing the whole frame.
pub(crate) fn take_string(p: &mut &[u8]) -> Result<String> {
    let len = take_u8(p)? as usize;
    if p.remaining() < len {
        return Err(WireError::ShortBuffer {
            needed: len,
            available: p.remaining(),
        });
    }
    let mut raw = vec![0u8; len];
    p.copy_to_slice(&mut raw);
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_round_trip() {
        for kind in [
            MsgKind::Empty,
            MsgKind::Heartbeat,
            MsgKind::Gamepad,
            MsgKind::PeerDiscovery,
            MsgKind::Command,
            MsgKind::Telemetry,
        ] {
            assert_eq!(MsgKind::from_byte(kind.as_byte()), kind);
        }
    }

    #[test]
    fn unknown_tag_becomes_empty() {
        assert_eq!(MsgKind::from_byte(42), MsgKind::Empty);
        assert_eq!(MsgKind::from_byte(255), MsgKind::Empty);
    }

    #[test]
    fn frame_kind_needs_full_header() {
        assert_eq!(frame_kind(&[]), None);
        assert_eq!(frame_kind(&[1, 0]), None);
        assert_eq!(frame_kind(&[1, 0, 10]), Some(MsgKind::Heartbeat));
    }

    #[test]
    fn take_string_reports_truncation() {
        let buf = [5u8, b'a', b'b'];
        let mut p = &buf[..];
        match take_string(&mut p) {
            Err(WireError::ShortBuffer { needed, available }) => {
                assert_eq!(needed, 5);
                assert_eq!(available, 2);
            }
            other => panic!("expected ShortBuffer, got {other:?}"),
        }
    }

    #[test]
    fn take_string_decodes_utf8() {
        let buf = [3u8, 0xE2, 0x9C, 0x93];
        let mut p = &buf[..];
        assert_eq!(take_string(&mut p).unwrap(), "\u{2713}");
    }
}
