//! ASCII command frames, `<` ... `>`.
//!
//! Replies are parsed by fixed offset, not by delimiter: the integer payload
//! of a Get reply sits at byte 4 (1 byte for digital pins, 4 for analogue),
//! the status of a Set reply at bytes 6..8. Any firmware change to a field
//! width is a breaking wire change.

use std::error;
use std::fmt;

use crate::PinType;

const PAYLOAD_OFFSET: usize = 4;
const STATUS_OFFSET: usize = 6;
const STATUS_LEN: usize = 2;

/// Outcome field of a Set reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The reply ended before its payload window.
    Short { wanted: usize, got: usize },
    /// The payload window held something other than a base-10 integer.
    NonNumeric(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Short { wanted, got } => {
                write!(f, "reply shorter than its payload window ({got} of {wanted} bytes)")
            }
            FrameError::NonNumeric(payload) => {
                write!(f, "payload {payload:?} is not a base-10 integer")
            }
        }
    }
}

impl error::Error for FrameError {}

/// Encodes a read of one pin. Pin numbers are always two digits; numbers
/// above 99 are outside the wire contract.
pub fn encode_get(pin_type: PinType, pin: u8) -> String {
    debug_assert!(pin < 100);
    let discriminator = match pin_type {
        PinType::Digital => 'D',
        PinType::Analogue => 'A',
    };
    format!("<G{discriminator}{pin:02}>")
}

/// Encodes a write of one pin. Set frames always carry the digital
/// discriminator; the firmware has no analogue write. Any non-zero value
/// drives the pin high.
pub fn encode_set(pin: u8, value: i32) -> String {
    debug_assert!(pin < 100);
    let level = if value == 0 { '0' } else { '1' };
    format!("<SD{pin:02}{level}>")
}

/// Parses the integer payload out of a Get reply.
pub fn decode_get(raw: &str, pin_type: PinType) -> Result<i32, FrameError> {
    let line = raw.trim();
    let width = match pin_type {
        PinType::Digital => 1,
        PinType::Analogue => 4,
    };
    let field = line
        .get(PAYLOAD_OFFSET..PAYLOAD_OFFSET + width)
        .ok_or(FrameError::Short { wanted: PAYLOAD_OFFSET + width, got: line.len() })?;
    field
        .parse()
        .map_err(|_| FrameError::NonNumeric(field.to_string()))
}

/// Reads the status field of a Set reply. Anything but a case-exact `OK`
/// in the status window, including a short reply, counts as an error.
pub fn decode_set(raw: &str) -> SetStatus {
    let line = raw.trim();
    match line.get(STATUS_OFFSET..STATUS_OFFSET + STATUS_LEN) {
        Some("OK") => SetStatus::Ok,
        _ => SetStatus::Error,
    }
}
