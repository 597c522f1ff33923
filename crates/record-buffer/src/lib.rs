//! Dual Record Buffer
//!
//! Two fixed-capacity byte arenas bridging the formatter and the storage
//! writer. Records are appended whole; the arenas swap roles strictly between
//! records, so every persisted batch is a whole number of records.

mod arena;
mod dual;

pub use arena::{RecordArena, DEFAULT_ARENA_CAPACITY};
pub use dual::{ArenaRole, DualRecordBuffer, PendingBatch, SwapPoll, SwapRequest};

use thiserror::Error;

/// Record buffer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("Arena full: record needs {needed} bytes, {remaining} remaining")]
    ArenaFull { needed: usize, remaining: usize },

    #[error("Record of {needed} bytes can never fit an arena of {capacity} bytes")]
    RecordTooLarge { needed: usize, capacity: usize },

    #[error("Arena capacity {capacity} below minimum {minimum}")]
    CapacityTooSmall { capacity: usize, minimum: usize },

    #[error("Record buffer closed")]
    Closed,
}
