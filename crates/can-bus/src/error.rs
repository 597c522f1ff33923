//! CAN Bus Error Types

use thiserror::Error;

/// Errors reported by a bus controller
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Controller has not been (successfully) initialized
    #[error("Bus controller not initialized")]
    NotInitialized,

    /// Initialization was rejected by the controller
    #[error("Bus controller initialization failed: {0}")]
    Init(String),

    /// Read attempted while the receive backlog was empty
    #[error("No frame available")]
    NoData,

    /// Controller entered bus-off state
    #[error("CAN bus off")]
    BusOff,

    /// Transient receive failure
    #[error("Frame read failed: {0}")]
    Read(String),
}

/// Errors constructing a frame from raw fields
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Identifier does not fit in 29 bits
    #[error("Identifier {0:#X} exceeds 29 bits")]
    IdentifierTooWide(u32),

    /// More than 8 data bytes
    #[error("Payload of {0} bytes exceeds 8")]
    PayloadTooLong(usize),
}

/// Errors parsing a persisted trace record
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    /// Record does not start with a parenthesised timestamp
    #[error("Missing timestamp in record: {0:?}")]
    MissingTimestamp(String),

    /// Timestamp is not a decimal number
    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    /// Interface marker is not `can`
    #[error("Unexpected interface marker: {0:?}")]
    InvalidInterface(String),

    /// Missing `#` between identifier and payload
    #[error("Missing '#' separator in record")]
    MissingSeparator,

    /// Identifier is not hexadecimal
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Payload is not an even-length hexadecimal string
    #[error("Invalid payload: {0:?}")]
    InvalidPayload(String),

    /// Fields parsed but do not form a valid frame
    #[error(transparent)]
    Frame(#[from] FrameError),
}
