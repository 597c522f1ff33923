//! In-Memory Storage
//!
//! Keeps the trace in a shared byte vector. Used by tests and bench runs;
//! supports injecting short writes and an unavailable device.

use crate::{StorageError, TraceSink, TraceStorage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryLog {
    name: Option<String>,
    bytes: Vec<u8>,
    writes: usize,
    flushes: usize,
    /// Bytes to withhold from upcoming writes
    short_writes: VecDeque<usize>,
}

/// Storage backed by a shared in-memory log
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    log: Arc<Mutex<MemoryLog>>,
    available: bool,
}

impl MemoryStorage {
    /// Create an empty, available storage
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(MemoryLog::default())),
            available: true,
        }
    }

    /// Storage whose device is missing; every open fails
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next write accept `withheld` fewer bytes than requested
    pub fn inject_short_write(&self, withheld: usize) {
        self.lock().short_writes.push_back(withheld);
    }

    /// Everything written so far
    pub fn contents(&self) -> Vec<u8> {
        self.lock().bytes.clone()
    }

    /// Number of write calls
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Number of flush calls
    pub fn flush_count(&self) -> usize {
        self.lock().flushes
    }

    /// Name passed to the last successful open
    pub fn opened(&self) -> Option<String> {
        self.lock().name.clone()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceStorage for MemoryStorage {
    type Sink = MemorySink;

    fn open_for_append(&self, name: &str) -> Result<Self::Sink, StorageError> {
        if !self.available {
            return Err(StorageError::Unavailable("no medium".to_string()));
        }
        debug!("Opening in-memory trace {}", name);
        self.lock().name = Some(name.to_string());
        Ok(MemorySink {
            log: self.log.clone(),
        })
    }
}

/// Append handle into a [`MemoryStorage`]
#[derive(Debug)]
pub struct MemorySink {
    log: Arc<Mutex<MemoryLog>>,
}

impl TraceSink for MemorySink {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, StorageError> {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        let withheld = log.short_writes.pop_front().unwrap_or(0);
        let accepted = bytes.len().saturating_sub(withheld);

        log.bytes.extend_from_slice(&bytes[..accepted]);
        log.writes += 1;
        Ok(accepted)
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flushes += 1;
        Ok(())
    }
}
