use std::collections::HashMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::clock;
use crate::error::{Result, WireError};
use crate::frame::{self, MsgKind, HEADER_LEN, MAX_PACKET_SIZE};

/// Tag reported when none was set.
pub const DEFAULT_TAG: &str = "TELEMETRY_DATA";

/// Most entries either data map can carry in one frame.
pub const MAX_DATA_ENTRIES: usize = 256;

/// Longest tag, key, or string value, in UTF-8 bytes.
pub const MAX_STRING_LEN: usize = 256;

/// Mutable accumulator of named readings, flushed to the operator console.
///
/// Append readings, encode-and-send, then [`clear_data`](Telemetry::clear_data)
/// for the next batch. The timestamp is stamped at encode time, not at
/// construction.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    tag: String,
    timestamp: i64,
    strings: HashMap<String, String>,
    numbers: HashMap<String, f32>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tag, or [`DEFAULT_TAG`] when none was set.
    ///
    /// An empty tag encodes as zero bytes on the wire; the default is a
    /// presentation-side substitution, never transmitted.
    pub fn tag(&self) -> &str {
        if self.tag.is_empty() {
            DEFAULT_TAG
        } else {
            &self.tag
        }
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = tag.into();
    }

    /// Milliseconds since the Unix epoch, stamped by the last encode.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn add_data(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.strings.insert(key.into(), value.into());
    }

    pub fn add_number(&mut self, key: impl Into<String>, value: f32) {
        self.numbers.insert(key.into(), value);
    }

    pub fn data_strings(&self) -> &HashMap<String, String> {
        &self.strings
    }

    pub fn data_numbers(&self) -> &HashMap<String, f32> {
        &self.numbers
    }

    pub fn has_data(&self) -> bool {
        !self.strings.is_empty() || !self.numbers.is_empty()
    }

    /// Reset the timestamp and drop every reading. The tag is kept.
    pub fn clear_data(&mut self) {
        self.timestamp = 0;
        self.strings.clear();
        self.numbers.clear();
    }

    /// Encode for transmission, stamping the timestamp with wall-clock now.
    pub fn encode(&mut self) -> Result<Bytes> {
        self.timestamp = clock::wall_millis();

        if self.strings.len() > MAX_DATA_ENTRIES {
            return Err(WireError::TooManyEntries {
                what: "string data",
                count: self.strings.len(),
                max: MAX_DATA_ENTRIES,
            });
        }
        if self.numbers.len() > MAX_DATA_ENTRIES {
            return Err(WireError::TooManyEntries {
                what: "number data",
                count: self.numbers.len(),
                max: MAX_DATA_ENTRIES,
            });
        }
        check_string("telemetry tag", &self.tag)?;

        let mut payload = BytesMut::new();
        payload.put_i64(self.timestamp);
        payload.put_u8(self.tag.len() as u8);
        payload.put_slice(self.tag.as_bytes());

        payload.put_u8(self.strings.len() as u8);
        for (key, value) in &self.strings {
            check_string("telemetry key", key)?;
            check_string("telemetry value", value)?;
            payload.put_u8(key.len() as u8);
            payload.put_slice(key.as_bytes());
            payload.put_u8(value.len() as u8);
            payload.put_slice(value.as_bytes());
        }

        payload.put_u8(self.numbers.len() as u8);
        for (key, value) in &self.numbers {
            check_string("telemetry key", key)?;
            payload.put_u8(key.len() as u8);
            payload.put_slice(key.as_bytes());
            payload.put_f32(*value);
        }

        let total = HEADER_LEN + payload.len();
        if total > MAX_PACKET_SIZE {
            return Err(WireError::PayloadTooLarge {
                size: total,
                max: MAX_PACKET_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(total);
        frame::put_header(&mut buf, MsgKind::Telemetry, payload.len());
        buf.put_slice(&payload);
        Ok(buf.freeze())
    }

    /// Decode from the wire, replacing any accumulated state.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        frame::check_len(buf, HEADER_LEN + 8)?;
        let mut p = &buf[HEADER_LEN..];
        let timestamp = p.get_i64();
        let tag = frame::take_string(&mut p)?;

        let mut strings = HashMap::new();
        let string_count = frame::take_u8(&mut p)?;
        for _ in 0..string_count {
            let key = frame::take_string(&mut p)?;
            let value = frame::take_string(&mut p)?;
            strings.insert(key, value);
        }

        let mut numbers = HashMap::new();
        let number_count = frame::take_u8(&mut p)?;
        for _ in 0..number_count {
            let key = frame::take_string(&mut p)?;
            if p.remaining() < 4 {
                return Err(WireError::ShortBuffer {
                    needed: 4,
                    available: p.remaining(),
                });
            }
            numbers.insert(key, p.get_f32());
        }

        Ok(Self {
            tag,
            timestamp,
            strings,
            numbers,
        })
    }
}

fn check_string(what: &'static str, s: &str) -> Result<()> {
    if s.len() > MAX_STRING_LEN {
        return Err(WireError::StringTooLong {
            what,
            len: s.len(),
            max: MAX_STRING_LEN,
        });
    }
    Ok(())
}
