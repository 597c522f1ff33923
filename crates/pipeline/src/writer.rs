//! Storage Writer Task
//!
//! Services swap requests and persists the handed-over arena. A short write
//! is reported and counted, never retried; the pipeline keeps going.

use record_buffer::{DualRecordBuffer, PendingBatch, SwapPoll};
use std::sync::Arc;
use std::time::Duration;
use trace_storage::TraceSink;
use tracing::{debug, error, info};

/// Writer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Batches handed to storage
    pub batches: u64,
    /// Bytes storage accepted
    pub bytes_persisted: u64,
    /// Records handed to storage
    pub messages_persisted: u64,
    /// Failed or short writes
    pub write_errors: u64,
    /// Cadence flushes issued
    pub flushes: u64,
}

/// Owns the storage handle and drains swapped-out arenas into it
pub struct StorageWriter<S: TraceSink> {
    sink: S,
    buffer: Arc<DualRecordBuffer>,
    flush_every: u64,
    poll: Duration,
    stats: WriterStats,
}

impl<S: TraceSink> StorageWriter<S> {
    /// Create a writer over an open sink
    pub fn new(sink: S, buffer: Arc<DualRecordBuffer>, flush_every: u64, poll: Duration) -> Self {
        Self {
            sink,
            buffer,
            flush_every: flush_every.max(1),
            poll,
            stats: WriterStats::default(),
        }
    }

    /// Statistics so far
    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    /// Write one batch, then flush if a cadence boundary was crossed
    pub fn persist(&mut self, batch: PendingBatch) {
        let requested = batch.len();
        let records = batch.records();
        let sink = &mut self.sink;

        match self.buffer.with_pending(batch, |bytes| sink.write(bytes)) {
            Ok(written) => {
                self.stats.bytes_persisted += written as u64;
                if written != requested {
                    self.stats.write_errors += 1;
                    metrics::counter!("canlog_storage_write_errors_total").increment(1);
                    error!(requested, written, "SD write error!");
                }
            }
            Err(e) => {
                self.stats.write_errors += 1;
                metrics::counter!("canlog_storage_write_errors_total").increment(1);
                error!("SD write error! {}", e);
            }
        }

        self.stats.batches += 1;
        self.stats.messages_persisted += records;
        self.flush_if_due();
    }

    fn flush_if_due(&mut self) {
        let due = self.stats.messages_persisted / self.flush_every;
        while self.stats.flushes < due {
            self.stats.flushes += 1;
            if let Err(e) = self.sink.flush() {
                error!("Storage flush failed: {}", e);
            }
        }
    }

    /// Poll for swaps until the buffer closes, then flush and return
    pub fn run(mut self) -> WriterStats {
        info!(flush_every = self.flush_every, "Starting storage writer");

        loop {
            match self.buffer.take_swap(self.poll) {
                SwapPoll::Ready(batch) => {
                    debug!(len = batch.len(), "Persisting batch");
                    self.persist(batch);
                }
                SwapPoll::Idle => {}
                SwapPoll::Closed => break,
            }
        }

        if let Err(e) = self.sink.flush() {
            error!("Final storage flush failed: {}", e);
        }
        info!(
            bytes = self.stats.bytes_persisted,
            errors = self.stats.write_errors,
            "Storage writer stopped"
        );
        self.stats
    }
}
