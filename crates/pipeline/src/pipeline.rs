//! Pipeline Orchestration
//!
//! Wires queue, record buffer and counter together and runs the three tasks
//! on dedicated threads: capture, formatting and storage writer.

use crate::capture::{CaptureStats, CaptureTask};
use crate::config::PipelineConfig;
use crate::counter::MessageCounter;
use crate::diagnostics::{DiagnosticSink, TracingDiagnostics};
use crate::formatter::{FormatterStats, FrameFormatter, OutputMode};
use crate::writer::{StorageWriter, WriterStats};
use crate::PipelineError;
use can_bus::{BusController, ClockSource, Frame, SessionClock};
use frame_queue::FrameQueue;
use record_buffer::DualRecordBuffer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use trace_storage::TraceSink;
use tracing::{error, info, warn};

/// Point-in-time view for status displays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSnapshot {
    /// Messages formatted since startup
    pub messages: u64,
    /// Frames waiting in the queue
    pub queue_depth: usize,
    /// Queue capacity
    pub queue_capacity: usize,
    /// Frames dropped on a full queue
    pub dropped: u64,
    /// Bytes in the active arena
    pub arena_fill: usize,
    /// Arena capacity
    pub arena_capacity: usize,
    /// Arena swaps serviced
    pub swaps: u64,
}

/// Totals collected at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Final message counter value
    pub messages: u64,
    /// Capture task totals (zero when capture was disabled)
    pub capture: CaptureStats,
    /// Formatter totals
    pub formatter: FormatterStats,
    /// Writer totals (zero in diagnostic mode)
    pub writer: WriterStats,
}

/// Configures and starts a [`Pipeline`]
pub struct PipelineBuilder {
    config: PipelineConfig,
    controller: Option<Box<dyn BusController>>,
    sink: Option<Box<dyn TraceSink>>,
    clock: Option<Arc<dyn ClockSource>>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl PipelineBuilder {
    /// Capture from `controller`; without one capture stays disabled
    pub fn controller(mut self, controller: Box<dyn BusController>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Persist through `sink`; without one records go to the diagnostic sink
    pub fn sink(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Timestamp frames with `clock` (default: a fresh [`SessionClock`])
    pub fn clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Diagnostic output (default: [`TracingDiagnostics`])
    pub fn diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Allocate shared state and spawn the tasks
    pub fn start(self) -> Result<Pipeline, PipelineError> {
        self.config.validate()?;
        let config = self.config;

        let queue = Arc::new(FrameQueue::new(config.queue_capacity));
        let buffer = Arc::new(DualRecordBuffer::new(config.arena_capacity)?);
        let counter = Arc::new(MessageCounter::new());
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SessionClock::start()) as Arc<dyn ClockSource>);

        let mode = if self.sink.is_some() {
            OutputMode::Storage
        } else {
            warn!("No storage available, records go to the diagnostic channel");
            OutputMode::Diagnostic
        };

        let mut pipeline = Pipeline {
            shutdown: Arc::new(AtomicBool::new(false)),
            queue: queue.clone(),
            buffer: buffer.clone(),
            counter: counter.clone(),
            mode,
            capture: None,
            formatter: None,
            writer: None,
        };

        // Consumers first, so nothing produced is left without a reader.
        if let Some(sink) = self.sink {
            let writer = StorageWriter::new(sink, buffer.clone(), config.flush_every, config.writer_poll);
            pipeline.writer = Some(spawn("can-writer", move || writer.run())?);
        }

        let formatter = FrameFormatter::new(
            queue.clone(),
            buffer,
            counter,
            self.diagnostics,
            mode,
            config.swap_poll,
        );
        pipeline.formatter = Some(spawn("can-formatter", move || formatter.run())?);

        match self.controller {
            Some(controller) => {
                let capture = CaptureTask::new(
                    controller,
                    queue,
                    clock,
                    config.enqueue_timeout,
                    config.capture_idle,
                );
                let shutdown = pipeline.shutdown.clone();
                pipeline.capture = Some(spawn("can-capture", move || capture.run(&shutdown))?);
            }
            None => warn!("Capture disabled: no initialized bus controller"),
        }

        info!(
            queue = config.queue_capacity,
            arena = config.arena_capacity,
            mode = ?mode,
            "Pipeline started"
        );
        Ok(pipeline)
    }
}

fn spawn<T, F>(name: &str, task: F) -> Result<JoinHandle<T>, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(task)
        .map_err(PipelineError::Spawn)
}

fn join<T: Default>(handle: Option<JoinHandle<T>>, name: &str) -> T {
    match handle {
        Some(handle) => handle.join().unwrap_or_else(|_| {
            error!("{} task panicked", name);
            T::default()
        }),
        None => T::default(),
    }
}

/// Running capture → format → persist pipeline
pub struct Pipeline {
    shutdown: Arc<AtomicBool>,
    queue: Arc<FrameQueue<Frame>>,
    buffer: Arc<DualRecordBuffer>,
    counter: Arc<MessageCounter>,
    mode: OutputMode,
    capture: Option<JoinHandle<CaptureStats>>,
    formatter: Option<JoinHandle<FormatterStats>>,
    writer: Option<JoinHandle<WriterStats>>,
}

impl Pipeline {
    /// Start configuring a pipeline
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder {
            config,
            controller: None,
            sink: None,
            clock: None,
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// Shared message counter
    pub fn counter(&self) -> Arc<MessageCounter> {
        self.counter.clone()
    }

    /// Where records are going
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Whether a capture task is running
    pub fn capture_enabled(&self) -> bool {
        self.capture.is_some()
    }

    /// Current counters and fill levels
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            messages: self.counter.get(),
            queue_depth: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            dropped: self.queue.dropped(),
            arena_fill: self.buffer.active_len(),
            arena_capacity: self.buffer.capacity(),
            swaps: self.buffer.swaps(),
        }
    }

    /// Stop capture, drain the queue, persist the tail and join every task
    pub fn shutdown(mut self) -> PipelineReport {
        info!("Shutting down pipeline");

        self.shutdown.store(true, Ordering::Release);
        let capture = join(self.capture.take(), "capture");

        self.queue.close();
        let formatter = join(self.formatter.take(), "formatter");
        let writer = join(self.writer.take(), "writer");

        PipelineReport {
            messages: self.counter.get(),
            capture,
            formatter,
            writer,
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Detached tasks still get told to stop.
        self.shutdown.store(true, Ordering::Release);
        self.queue.close();
        if self.formatter.is_none() {
            self.buffer.close();
        }
    }
}
