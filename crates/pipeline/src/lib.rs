//! CAN Trace Pipeline
//!
//! Capture → format → persist. The capture task never blocks on the slow
//! side: frames cross a bounded queue to the formatter, which renders them
//! into double-buffered arenas that the storage writer persists in bulk.

mod capture;
mod config;
mod counter;
mod diagnostics;
mod formatter;
mod pipeline;
mod sampler;
mod writer;

pub use capture::{CaptureStats, CaptureTask};
pub use config::{PipelineConfig, MAX_ENQUEUE_TIMEOUT};
pub use counter::MessageCounter;
pub use diagnostics::{DiagnosticSink, MemoryDiagnostics, TracingDiagnostics, DIAGNOSTIC_TARGET};
pub use formatter::{FormatterStats, FrameFormatter, OutputMode};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineReport, PipelineSnapshot};
pub use sampler::{Throughput, ThroughputSampler};
pub use writer::{StorageWriter, WriterStats};

use record_buffer::BufferError;
use thiserror::Error;

/// Pipeline setup errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),
    #[error("Record buffer error: {0}")]
    Buffer(#[from] BufferError),
    #[error("Failed to spawn task thread: {0}")]
    Spawn(std::io::Error),
}
