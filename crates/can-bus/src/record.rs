//! Trace Record Format
//!
//! One frame per line, candump style:
//!
//! ```text
//! (1700000000.123456) can 123#DEADBE
//! ```
//!
//! Timestamp with six fractional digits, identifier in uppercase hex without
//! leading zeros, then each payload byte as two uppercase hex digits.

use crate::error::RecordError;
use crate::frame::{Frame, MAX_PAYLOAD};
use std::fmt::{self, Write};
use std::str::FromStr;

/// Interface marker written between timestamp and identifier
pub const INTERFACE: &str = "can";

/// First line written to a freshly opened trace file
pub const SESSION_HEADER: &str = "CAN Bus Log Started\n";

/// Upper bound on a rendered record for timestamps below 1e11 seconds
pub const MAX_RECORD_LEN: usize = 64;

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}) {} {:X}#", self.timestamp(), INTERFACE, self.id())?;
        for byte in self.payload() {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Render `frame` as a newline-terminated record, appending to `out`
///
/// Returns the number of bytes appended.
pub fn render_into(frame: &Frame, out: &mut String) -> usize {
    let start = out.len();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "{}", frame);
    out.len() - start
}

/// Render `frame` as a newline-terminated record
pub fn render(frame: &Frame) -> String {
    let mut out = String::with_capacity(MAX_RECORD_LEN);
    render_into(frame, &mut out);
    out
}

/// Parse one record (trailing newline optional) back into a frame
pub fn parse_record(line: &str) -> Result<Frame, RecordError> {
    let line = line.trim_end_matches(['\n', '\r']);

    let rest = line
        .strip_prefix('(')
        .ok_or_else(|| RecordError::MissingTimestamp(line.to_string()))?;
    let (timestamp, rest) = rest
        .split_once(") ")
        .ok_or_else(|| RecordError::MissingTimestamp(line.to_string()))?;
    let timestamp: f64 = timestamp
        .parse()
        .map_err(|_| RecordError::InvalidTimestamp(timestamp.to_string()))?;

    let (interface, body) = rest
        .split_once(' ')
        .ok_or_else(|| RecordError::InvalidInterface(rest.to_string()))?;
    if interface != INTERFACE {
        return Err(RecordError::InvalidInterface(interface.to_string()));
    }

    let (id, payload) = body.split_once('#').ok_or(RecordError::MissingSeparator)?;
    if id.is_empty() {
        return Err(RecordError::InvalidIdentifier(id.to_string()));
    }
    let id = u32::from_str_radix(id, 16)
        .map_err(|_| RecordError::InvalidIdentifier(id.to_string()))?;

    let bytes = decode_hex(payload)?;
    Ok(Frame::new(id, &bytes, timestamp)?)
}

fn decode_hex(payload: &str) -> Result<Vec<u8>, RecordError> {
    if payload.len() % 2 != 0 || payload.len() > MAX_PAYLOAD * 2 || !payload.is_ascii() {
        return Err(RecordError::InvalidPayload(payload.to_string()));
    }

    (0..payload.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&payload[i..i + 2], 16)
                .map_err(|_| RecordError::InvalidPayload(payload.to_string()))
        })
        .collect()
}

impl FromStr for Frame {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_record(s)
    }
}
