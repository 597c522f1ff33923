//! CAN Frame Definitions
//!
//! A [`RawFrame`] is what the controller hands out; a [`Frame`] is the same
//! message stamped with its capture time.

use crate::error::FrameError;

/// Maximum data bytes in a classic CAN frame
pub const MAX_PAYLOAD: usize = 8;

/// Largest 11-bit (standard) identifier
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// Largest 29-bit (extended) identifier
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// Frame as read from the controller, before timestamping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawFrame {
    id: u32,
    len: u8,
    data: [u8; MAX_PAYLOAD],
}

impl RawFrame {
    /// Build a frame from an identifier and up to 8 payload bytes
    pub fn new(id: u32, payload: &[u8]) -> Result<Self, FrameError> {
        if id > MAX_EXTENDED_ID {
            return Err(FrameError::IdentifierTooWide(id));
        }
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLong(payload.len()));
        }

        let mut data = [0u8; MAX_PAYLOAD];
        data[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            id,
            len: payload.len() as u8,
            data,
        })
    }

    /// Bus identifier
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Data length (0..=8)
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// True for a zero-length frame
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Valid payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Whether the identifier needs the 29-bit format
    pub fn is_extended(&self) -> bool {
        self.id > MAX_STANDARD_ID
    }

    /// Attach the capture timestamp (seconds since epoch)
    pub fn stamp(self, timestamp: f64) -> Frame {
        Frame {
            raw: self,
            timestamp,
        }
    }
}

/// One captured bus message
///
/// Immutable once captured. The timestamp is capture time, not the time the
/// formatter got around to rendering it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    raw: RawFrame,
    timestamp: f64,
}

impl Frame {
    /// Build a timestamped frame directly
    pub fn new(id: u32, payload: &[u8], timestamp: f64) -> Result<Self, FrameError> {
        Ok(RawFrame::new(id, payload)?.stamp(timestamp))
    }

    /// Bus identifier
    pub fn id(&self) -> u32 {
        self.raw.id()
    }

    /// Data length (0..=8)
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// True for a zero-length frame
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Valid payload bytes
    pub fn payload(&self) -> &[u8] {
        self.raw.payload()
    }

    /// Capture time in seconds since epoch
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// The untimestamped frame
    pub fn raw(&self) -> &RawFrame {
        &self.raw
    }
}
