//! Fixed-Capacity Record Arena

use crate::BufferError;

/// Default arena capacity in bytes
pub const DEFAULT_ARENA_CAPACITY: usize = 4096;

/// Byte buffer plus write cursor
///
/// Allocated once; `clear` only rewinds the cursor.
#[derive(Debug)]
pub struct RecordArena {
    bytes: Box<[u8]>,
    cursor: usize,
    records: u64,
}

impl RecordArena {
    /// Allocate an arena of `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity].into_boxed_slice(),
            cursor: 0,
            records: 0,
        }
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Bytes written so far (the cursor)
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// Check if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Bytes still free
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    /// Records appended since the last clear
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Whether a record of `needed` bytes fits without overflowing
    pub fn fits(&self, needed: usize) -> bool {
        self.cursor + needed <= self.bytes.len()
    }

    /// Append one whole record
    pub fn push(&mut self, record: &[u8]) -> Result<(), BufferError> {
        if !self.fits(record.len()) {
            return Err(BufferError::ArenaFull {
                needed: record.len(),
                remaining: self.remaining(),
            });
        }

        self.bytes[self.cursor..self.cursor + record.len()].copy_from_slice(record);
        self.cursor += record.len();
        self.records += 1;
        Ok(())
    }

    /// The written bytes
    pub fn contents(&self) -> &[u8] {
        &self.bytes[..self.cursor]
    }

    /// Rewind to empty
    pub fn clear(&mut self) {
        self.cursor = 0;
        self.records = 0;
    }
}
