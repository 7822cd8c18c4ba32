use std::sync::atomic::{AtomicU16, Ordering};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::clock;
use crate::error::Result;
use crate::frame::{self, MsgKind, HEADER_LEN};

/// Payload: sequence number (2) + timestamp (8) = 10 bytes.
pub const PAYLOAD_LEN: usize = 10;

const WIRE_LEN: usize = HEADER_LEN + PAYLOAD_LEN;

/// Highest sequence number handed out before the counter wraps to zero.
pub const MAX_SEQUENCE_NUMBER: u16 = 10000;

static SEQUENCE: AtomicU16 = AtomicU16::new(0);

/// Returns the current counter value and advances it, wrapping past the max.
fn next_sequence_number() -> u16 {
    SEQUENCE
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
            Some(if n >= MAX_SEQUENCE_NUMBER { 0 } else { n + 1 })
        })
        .unwrap_or(0)
}

/// Liveness probe echoed verbatim by the receiving side.
///
/// All heartbeats constructed in this process share one sequence counter,
/// so observed sequence numbers increase across senders too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    sequence_number: u16,
    timestamp: i64,
}

impl Heartbeat {
    /// Create a heartbeat stamped with the next sequence number.
    pub fn new() -> Self {
        Self {
            sequence_number: next_sequence_number(),
            timestamp: clock::monotonic_nanos(),
        }
    }

    /// The all-zero heartbeat used before any has been received.
    pub fn empty() -> Self {
        Self {
            sequence_number: 0,
            timestamp: 0,
        }
    }

    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(WIRE_LEN);
        frame::put_header(&mut buf, MsgKind::Heartbeat, PAYLOAD_LEN);
        buf.put_u16(self.sequence_number);
        buf.put_i64(self.timestamp);
        Ok(buf.freeze())
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        frame::check_len(buf, WIRE_LEN)?;
        let mut p = &buf[HEADER_LEN..];
        Ok(Self {
            sequence_number: p.get_u16(),
            timestamp: p.get_i64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WireError;

    #[test]
    fn round_trip_preserves_fields() {
        let hb = Heartbeat::new();
        let encoded = hb.encode().unwrap();
        assert_eq!(encoded.len(), WIRE_LEN);
        assert_eq!(encoded[0], MsgKind::Heartbeat.as_byte());
        let decoded = Heartbeat::decode(&encoded).unwrap();
        assert_eq!(decoded, hb);
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let encoded = Heartbeat::new().encode().unwrap();
        match Heartbeat::decode(&encoded[..WIRE_LEN - 1]) {
            Err(WireError::ShortBuffer { needed, available }) => {
                assert_eq!(needed, WIRE_LEN);
                assert_eq!(available, WIRE_LEN - 1);
            }
            other => panic!("expected ShortBuffer, got {other:?}"),
        }
    }

    #[test]
    fn sequence_numbers_stay_in_range_and_wrap() {
        // Other tests may draw from the shared counter concurrently, so this
        // checks the range invariant and that at least one wrap is observed
        // rather than exact consecutive values.
        let mut wraps = 0;
        let mut prev = Heartbeat::new().sequence_number();
        for _ in 0..(2 * MAX_SEQUENCE_NUMBER as u32 + 10) {
            let seq = Heartbeat::new().sequence_number();
            assert!(seq <= MAX_SEQUENCE_NUMBER);
            if seq < prev {
                wraps += 1;
            }
            prev = seq;
        }
        assert!(wraps >= 1);
    }

    #[test]
    fn empty_heartbeat_is_all_zero() {
        let hb = Heartbeat::empty();
        assert_eq!(hb.sequence_number(), 0);
        assert_eq!(hb.timestamp(), 0);
    }
}
