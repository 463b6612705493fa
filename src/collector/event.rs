//! Decoding of raw Linux input-event records.
//!
//! A device node under `/dev/input` yields fixed-size `input_event` records:
//!
//! ```text
//! offset  size  field
//!      0     8  seconds      (little-endian, low 32 bits kept)
//!      8     8  microseconds (little-endian, low 32 bits kept)
//!     16     2  type
//!     18     2  code
//!     20     4  value        (signed)
//! ```
//!
//! Only key and relative-motion events are classified; everything else
//! decodes fine but never matches a predicate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of one wire record in bytes.
pub const EVENT_SIZE: usize = 24;

/// Smallest buffer [`Event::decode`] accepts. The value slot defaults to 0
/// when only this much is present.
pub const MIN_EVENT_SIZE: usize = 20;

/// Highest code treated as a keyboard scan code.
pub const MAX_KEY_CODE: u16 = 248;

/// Movement conversion from device counts to meters (empirical).
pub const METERS_PER_COUNT: f64 = 0.000_024_4;

/// Errors produced while decoding a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes than a record can be decoded from.
    #[error("input event needs at least 20 bytes, got {len}")]
    ShortBuffer { len: usize },
}

/// Event type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventType(pub u16);

impl EventType {
    /// `EV_KEY`: keys and buttons.
    pub const KEY: EventType = EventType(0x01);
    /// `EV_REL`: relative axis motion.
    pub const REL: EventType = EventType(0x02);
}

/// Event code field, scoped by [`EventType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventCode(pub u16);

impl EventCode {
    pub const BTN_LEFT: EventCode = EventCode(0x110);
    pub const BTN_RIGHT: EventCode = EventCode(0x111);
    pub const BTN_MIDDLE: EventCode = EventCode(0x112);
    pub const REL_X: EventCode = EventCode(0x00);
    pub const REL_Y: EventCode = EventCode(0x01);

    /// Whether the code lies in the keyboard scan-code range.
    pub fn is_key(self) -> bool {
        self.0 <= MAX_KEY_CODE
    }
}

/// Event value field. A press state for key events, a signed delta for
/// relative motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventValue(pub i32);

impl EventValue {
    /// Key released.
    pub const LIFT: EventValue = EventValue(0);
    /// Key pressed.
    pub const DOWN: EventValue = EventValue(1);
    /// Key autorepeat.
    pub const HOLD: EventValue = EventValue(2);

    /// Absolute magnitude of the value.
    pub fn abs(self) -> u64 {
        u64::from(self.0.unsigned_abs())
    }

    /// The value converted from device counts to meters.
    pub fn meters(self) -> f64 {
        f64::from(self.0) * METERS_PER_COUNT
    }
}

/// Relative motion axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

/// What a decoded event counts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classified {
    LeftClick,
    RightClick,
    MiddleClick,
    KeyPress,
    /// Pointer motion with the absolute delta in device counts.
    Move { axis: Axis, magnitude: u64 },
}

/// One decoded input record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub time_sec: u32,
    pub time_usec: u32,
    pub kind: EventType,
    pub code: EventCode,
    pub value: EventValue,
}

impl Event {
    /// Decode a record from its little-endian wire form.
    ///
    /// Buffers of [`MIN_EVENT_SIZE`] up to [`EVENT_SIZE`] bytes are accepted
    /// with the value defaulting to 0; anything shorter is rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < MIN_EVENT_SIZE {
            return Err(DecodeError::ShortBuffer { len: bytes.len() });
        }

        let value = if bytes.len() >= EVENT_SIZE {
            i32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]])
        } else {
            0
        };

        Ok(Self {
            time_sec: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            time_usec: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            kind: EventType(u16::from_le_bytes([bytes[16], bytes[17]])),
            code: EventCode(u16::from_le_bytes([bytes[18], bytes[19]])),
            value: EventValue(value),
        })
    }

    /// Encode the event into a full wire record.
    pub fn encode(&self) -> [u8; EVENT_SIZE] {
        let mut out = [0u8; EVENT_SIZE];
        out[0..4].copy_from_slice(&self.time_sec.to_le_bytes());
        out[8..12].copy_from_slice(&self.time_usec.to_le_bytes());
        out[16..18].copy_from_slice(&self.kind.0.to_le_bytes());
        out[18..20].copy_from_slice(&self.code.0.to_le_bytes());
        out[20..24].copy_from_slice(&self.value.0.to_le_bytes());
        out
    }

    pub fn is_left_click(&self) -> bool {
        self.is_button_down(EventCode::BTN_LEFT)
    }

    pub fn is_right_click(&self) -> bool {
        self.is_button_down(EventCode::BTN_RIGHT)
    }

    pub fn is_middle_click(&self) -> bool {
        self.is_button_down(EventCode::BTN_MIDDLE)
    }

    pub fn is_mouse_move(&self) -> bool {
        self.kind == EventType::REL
            && (self.code == EventCode::REL_X || self.code == EventCode::REL_Y)
    }

    /// Key presses are counted on release; down and autorepeat are ignored.
    pub fn is_keyboard_press(&self) -> bool {
        self.kind == EventType::KEY && self.code.is_key() && self.value == EventValue::LIFT
    }

    /// Map the event onto the counter it feeds, if any.
    pub fn classify(&self) -> Option<Classified> {
        if self.is_left_click() {
            Some(Classified::LeftClick)
        } else if self.is_right_click() {
            Some(Classified::RightClick)
        } else if self.is_middle_click() {
            Some(Classified::MiddleClick)
        } else if self.is_keyboard_press() {
            Some(Classified::KeyPress)
        } else if self.is_mouse_move() {
            let axis = if self.code == EventCode::REL_X {
                Axis::X
            } else {
                Axis::Y
            };
            Some(Classified::Move {
                axis,
                magnitude: self.value.abs(),
            })
        } else {
            None
        }
    }

    fn is_button_down(&self, button: EventCode) -> bool {
        self.kind == EventType::KEY && self.code == button && self.value == EventValue::DOWN
    }
}
