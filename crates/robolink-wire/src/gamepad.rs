use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::Result;
use crate::frame::{self, MsgKind, HEADER_LEN};

/// Current gamepad format version. Version 2 added the trailing user byte.
pub const VERSION: u8 = 2;

/// Payload: version (1) + id (4) + timestamp (8) + six axes (24) +
/// button word (4) + user (1) = 42 bytes.
pub const PAYLOAD_LEN: usize = 42;

const WIRE_LEN: usize = HEADER_LEN + PAYLOAD_LEN;

/// Device id of a pad not yet associated with a physical controller.
pub const ID_UNASSOCIATED: i32 = -1;

/// Snapshot of one gamepad, as sampled by the operator console.
///
/// Axes run -1.0..1.0 (sticks) and 0.0..1.0 (triggers). `user` is the
/// console slot the pad claims, 1 or 2 in valid frames.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GamepadState {
    pub left_stick_x: f32,
    pub left_stick_y: f32,
    pub right_stick_x: f32,
    pub right_stick_y: f32,
    pub left_trigger: f32,
    pub right_trigger: f32,
    pub dpad_up: bool,
    pub dpad_down: bool,
    pub dpad_left: bool,
    pub dpad_right: bool,
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub guide: bool,
    pub start: bool,
    pub back: bool,
    pub left_bumper: bool,
    pub right_bumper: bool,
    pub user: u8,
    pub id: i32,
    pub timestamp: i64,
}

impl GamepadState {
    /// A pad with no associated device, everything at rest.
    pub fn unassociated() -> Self {
        Self {
            id: ID_UNASSOCIATED,
            ..Self::default()
        }
    }

    fn button_word(&self) -> i32 {
        let mut word = 0;
        for pressed in [
            self.dpad_up,
            self.dpad_down,
            self.dpad_left,
            self.dpad_right,
            self.a,
            self.b,
            self.x,
            self.y,
            self.guide,
            self.start,
            self.back,
            self.left_bumper,
            self.right_bumper,
        ] {
            word = (word << 1) | i32::from(pressed);
        }
        word
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(WIRE_LEN);
        frame::put_header(&mut buf, MsgKind::Gamepad, PAYLOAD_LEN);
        buf.put_u8(VERSION);
        buf.put_i32(self.id);
        buf.put_i64(self.timestamp);
        buf.put_f32(self.left_stick_x);
        buf.put_f32(self.left_stick_y);
        buf.put_f32(self.right_stick_x);
        buf.put_f32(self.right_stick_y);
        buf.put_f32(self.left_trigger);
        buf.put_f32(self.right_trigger);
        buf.put_i32(self.button_word());
        buf.put_u8(self.user);
        Ok(buf.freeze())
    }

    /// Decode from the wire, reading only the fields the frame's version
    /// guarantees.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        frame::check_len(buf, WIRE_LEN)?;
        let mut p = &buf[HEADER_LEN..];
        let version = p.get_u8();

        let mut pad = GamepadState::unassociated();
        if version >= 1 {
            pad.id = p.get_i32();
            pad.timestamp = p.get_i64();
            pad.left_stick_x = p.get_f32();
            pad.left_stick_y = p.get_f32();
            pad.right_stick_x = p.get_f32();
            pad.right_stick_y = p.get_f32();
            pad.left_trigger = p.get_f32();
            pad.right_trigger = p.get_f32();

            let word = p.get_i32();
            pad.dpad_up = word & 0x1000 != 0;
            pad.dpad_down = word & 0x0800 != 0;
            pad.dpad_left = word & 0x0400 != 0;
            pad.dpad_right = word & 0x0200 != 0;
            pad.a = word & 0x0100 != 0;
            pad.b = word & 0x0080 != 0;
            pad.x = word & 0x0040 != 0;
            pad.y = word & 0x0020 != 0;
            pad.guide = word & 0x0010 != 0;
            pad.start = word & 0x0008 != 0;
            pad.back = word & 0x0004 != 0;
            pad.left_bumper = word & 0x0002 != 0;
            pad.right_bumper = word & 0x0001 != 0;
        }
        if version >= 2 {
            pad.user = p.get_u8();
        }
        Ok(pad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pad() -> GamepadState {
        GamepadState {
            left_stick_x: -0.5,
            left_stick_y: 1.0,
            right_stick_x: 0.25,
            right_stick_y: -1.0,
            left_trigger: 0.75,
            right_trigger: 0.0,
            dpad_up: true,
            a: true,
            y: true,
            back: true,
            right_bumper: true,
            user: 1,
            id: 7001,
            timestamp: 1_234_567,
            ..GamepadState::default()
        }
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let pad = sample_pad();
        let encoded = pad.encode().unwrap();
        assert_eq!(encoded.len(), WIRE_LEN);
        let decoded = GamepadState::decode(&encoded).unwrap();
        assert_eq!(decoded, pad);
    }

    #[test]
    fn all_buttons_round_trip() {
        let mut pad = GamepadState {
            user: 2,
            id: 1,
            ..GamepadState::default()
        };
        pad.dpad_up = true;
        pad.dpad_down = true;
        pad.dpad_left = true;
        pad.dpad_right = true;
        pad.a = true;
        pad.b = true;
        pad.x = true;
        pad.y = true;
        pad.guide = true;
        pad.start = true;
        pad.back = true;
        pad.left_bumper = true;
        pad.right_bumper = true;

        assert_eq!(pad.button_word(), 0x1FFF);
        let decoded = GamepadState::decode(&pad.encode().unwrap()).unwrap();
        assert_eq!(decoded, pad);
    }

    #[test]
    fn button_word_places_dpad_up_at_bit_12() {
        let pad = GamepadState {
            dpad_up: true,
            ..GamepadState::default()
        };
        assert_eq!(pad.button_word(), 0x1000);

        let pad = GamepadState {
            right_bumper: true,
            ..GamepadState::default()
        };
        assert_eq!(pad.button_word(), 0x0001);
    }

    #[test]
    fn version_one_frame_leaves_user_unset() {
        let pad = sample_pad();
        let mut encoded = pad.encode().unwrap().to_vec();
        encoded[HEADER_LEN] = 1;
        let decoded = GamepadState::decode(&encoded).unwrap();
        assert_eq!(decoded.user, 0);
        assert_eq!(decoded.id, pad.id);
    }

    #[test]
    fn unassociated_pad_has_sentinel_id() {
        let pad = GamepadState::unassociated();
        assert_eq!(pad.id, ID_UNASSOCIATED);
        assert_eq!(pad.user, 0);
        assert!(!pad.a);
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let encoded = sample_pad().encode().unwrap();
        assert!(GamepadState::decode(&encoded[..WIRE_LEN - 1]).is_err());
    }
}
