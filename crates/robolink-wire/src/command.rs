use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::clock;
use crate::error::{Result, WireError};
use crate::frame::{self, MsgKind, HEADER_LEN};

/// Longest name or extra payload, in UTF-8 bytes.
pub const MAX_STRING_LEN: usize = 256;

/// Payload before the strings: timestamp (8) + ack (1) + two length bytes.
const BASE_PAYLOAD_LEN: usize = 11;

/// A named instruction delivered at-least-once with acknowledgment.
///
/// Identity is `(name, timestamp)`; two commands with the same name created
/// at different instants are distinct, and a retransmitted copy of one
/// command is a duplicate. Content is fixed at construction, only the
/// acknowledged flag and the attempt counter change afterwards.
#[derive(Debug, Clone)]
pub struct Command {
    name: String,
    extra: String,
    timestamp: i64,
    acknowledged: bool,
    attempts: u8,
}

impl Command {
    /// Create an unacknowledged command stamped with a fresh timestamp.
    ///
    /// Fails if `name` or `extra` exceeds [`MAX_STRING_LEN`] UTF-8 bytes.
    pub fn new(name: impl Into<String>, extra: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let extra = extra.into();
        if name.len() > MAX_STRING_LEN {
            return Err(WireError::StringTooLong {
                what: "command name",
                len: name.len(),
                max: MAX_STRING_LEN,
            });
        }
        if extra.len() > MAX_STRING_LEN {
            return Err(WireError::StringTooLong {
                what: "command extra",
                len: extra.len(),
                max: MAX_STRING_LEN,
            });
        }
        Ok(Self {
            name,
            extra,
            timestamp: clock::monotonic_nanos(),
            acknowledged: false,
            attempts: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extra(&self) -> &str {
        &self.extra
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// Mark this command as received.
    pub fn acknowledge(&mut self) {
        self.acknowledged = true;
    }

    /// How many times this command has been encoded for sending.
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Encode for transmission. Every encode counts as a delivery attempt.
    pub fn encode(&mut self) -> Result<Bytes> {
        self.attempts = self.attempts.saturating_add(1);
        let payload_len = BASE_PAYLOAD_LEN + self.name.len() + self.extra.len();
        let mut buf = BytesMut::with_capacity(HEADER_LEN + payload_len);
        frame::put_header(&mut buf, MsgKind::Command, payload_len);
        buf.put_i64(self.timestamp);
        buf.put_u8(u8::from(self.acknowledged));
        buf.put_u8(self.name.len() as u8);
        buf.put_slice(self.name.as_bytes());
        buf.put_u8(self.extra.len() as u8);
        buf.put_slice(self.extra.as_bytes());
        Ok(buf.freeze())
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        frame::check_len(buf, HEADER_LEN + BASE_PAYLOAD_LEN)?;
        let mut p = &buf[HEADER_LEN..];
        let timestamp = p.get_i64();
        let acknowledged = p.get_u8() != 0;
        let name = frame::take_string(&mut p)?;
        let extra = frame::take_string(&mut p)?;
        Ok(Self {
            name,
            extra,
            timestamp,
            acknowledged,
            attempts: 0,
        })
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.timestamp == other.timestamp
    }
}

impl Eq for Command {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_content_and_flags() {
        let mut cmd = Command::new("moveForward", "100").unwrap();
        assert!(!cmd.is_acknowledged());
        let encoded = cmd.encode().unwrap();
        let decoded = Command::decode(&encoded).unwrap();
        assert_eq!(decoded.name(), "moveForward");
        assert_eq!(decoded.extra(), "100");
        assert_eq!(decoded.timestamp(), cmd.timestamp());
        assert!(!decoded.is_acknowledged());
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn acknowledged_flag_survives_the_wire() {
        let mut cmd = Command::new("stop", "").unwrap();
        cmd.acknowledge();
        let decoded = Command::decode(&cmd.encode().unwrap()).unwrap();
        assert!(decoded.is_acknowledged());
    }

    #[test]
    fn encode_counts_attempts() {
        let mut cmd = Command::new("turn", "90").unwrap();
        assert_eq!(cmd.attempts(), 0);
        cmd.encode().unwrap();
        cmd.encode().unwrap();
        assert_eq!(cmd.attempts(), 2);
    }

    #[test]
    fn attempts_saturate() {
        let mut cmd = Command::new("turn", "90").unwrap();
        for _ in 0..300 {
            cmd.encode().unwrap();
        }
        assert_eq!(cmd.attempts(), u8::MAX);
    }

    #[test]
    fn name_at_limit_constructs_and_over_limit_fails() {
        let at_limit = "x".repeat(MAX_STRING_LEN);
        assert!(Command::new(at_limit, "").is_ok());

        let over = "x".repeat(MAX_STRING_LEN + 1);
        match Command::new(over, "") {
            Err(WireError::StringTooLong { what, len, max }) => {
                assert_eq!(what, "command name");
                assert_eq!(len, MAX_STRING_LEN + 1);
                assert_eq!(max, MAX_STRING_LEN);
            }
            other => panic!("expected StringTooLong, got {other:?}"),
        }
    }

    #[test]
    fn extra_over_limit_fails() {
        let over = "y".repeat(MAX_STRING_LEN + 1);
        assert!(matches!(
            Command::new("ok", over),
            Err(WireError::StringTooLong {
                what: "command extra",
                ..
            })
        ));
    }

    #[test]
    fn identity_is_name_and_timestamp() {
        let mut a = Command::new("go", "1").unwrap();
        let b = a.clone();
        a.acknowledge();
        // Flag and attempt changes never affect identity.
        a.encode().unwrap();
        assert_eq!(a, b);

        let c = Command::new("go", "1").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn decode_rejects_truncated_strings() {
        let mut cmd = Command::new("navigate", "waypoint-7").unwrap();
        let encoded = cmd.encode().unwrap();
        assert!(Command::decode(&encoded[..encoded.len() - 4]).is_err());
        assert!(Command::decode(&encoded[..HEADER_LEN + 5]).is_err());
    }
}
