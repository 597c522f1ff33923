//! Formatting Task
//!
//! Takes frames off the queue in arrival order, renders each as one trace
//! record and appends it to the active arena. When a record would overflow
//! the arena the buffer hands the arena to the writer first, so a record is
//! never split across a swap.

use crate::counter::MessageCounter;
use crate::diagnostics::DiagnosticSink;
use can_bus::{render_into, Frame, MAX_RECORD_LEN};
use frame_queue::FrameQueue;
use record_buffer::{BufferError, DualRecordBuffer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Where formatted records end up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Into the record arenas, persisted by the writer
    Storage,
    /// No storage device: straight to the diagnostic sink
    Diagnostic,
}

/// Formatter statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatterStats {
    /// Records formatted
    pub formatted: u64,
    /// Records that caused an arena swap
    pub swaps: u64,
    /// Records lost to buffer errors
    pub rejected: u64,
}

/// Renders frames into the record buffer
pub struct FrameFormatter {
    queue: Arc<FrameQueue<Frame>>,
    buffer: Arc<DualRecordBuffer>,
    counter: Arc<MessageCounter>,
    diagnostics: Arc<dyn DiagnosticSink>,
    mode: OutputMode,
    swap_poll: Duration,
    scratch: String,
    stats: FormatterStats,
}

impl FrameFormatter {
    /// Create a formatter
    pub fn new(
        queue: Arc<FrameQueue<Frame>>,
        buffer: Arc<DualRecordBuffer>,
        counter: Arc<MessageCounter>,
        diagnostics: Arc<dyn DiagnosticSink>,
        mode: OutputMode,
        swap_poll: Duration,
    ) -> Self {
        Self {
            queue,
            buffer,
            counter,
            diagnostics,
            mode,
            swap_poll,
            scratch: String::with_capacity(MAX_RECORD_LEN),
            stats: FormatterStats::default(),
        }
    }

    /// Output mode in effect
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Statistics so far
    pub fn stats(&self) -> FormatterStats {
        self.stats
    }

    /// Render and store one frame
    ///
    /// Blocks only while a swap it raised is waiting for the writer.
    pub fn process(&mut self, frame: &Frame) -> Result<(), BufferError> {
        self.scratch.clear();
        render_into(frame, &mut self.scratch);

        match self.mode {
            OutputMode::Storage => {
                if self.buffer.append(self.scratch.as_bytes(), self.swap_poll)? {
                    self.stats.swaps += 1;
                }
            }
            OutputMode::Diagnostic => self.diagnostics.record(&self.scratch),
        }

        self.counter.increment();
        self.stats.formatted += 1;
        metrics::counter!("canlog_messages_total").increment(1);
        Ok(())
    }

    /// Consume frames until the queue is closed and drained
    ///
    /// On exit the partially filled arena is handed to the writer and the
    /// buffer is closed.
    pub fn run(mut self) -> FormatterStats {
        info!(mode = ?self.mode, "Starting formatting task");

        while let Some(frame) = self.queue.dequeue_blocking() {
            match self.process(&frame) {
                Ok(()) => {}
                Err(BufferError::Closed) => {
                    warn!("Record buffer closed, formatter exiting");
                    break;
                }
                Err(e) => {
                    self.stats.rejected += 1;
                    warn!("Dropping record for {:X}: {}", frame.id(), e);
                }
            }
        }

        match self.mode {
            OutputMode::Storage => {
                if let Err(e) = self.buffer.finish(self.swap_poll) {
                    warn!("Final arena hand-off failed: {}", e);
                }
            }
            OutputMode::Diagnostic => self.buffer.close(),
        }

        info!(formatted = self.stats.formatted, "Formatting task stopped");
        self.stats
    }
}
