//! Diagnostic Output Channel
//!
//! Where rendered records go when no storage device is available.

use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Tracing target used for diagnostic record output
pub const DIAGNOSTIC_TARGET: &str = "can_logger::diagnostic";

/// One-way sink for rendered records
pub trait DiagnosticSink: Send + Sync {
    /// Emit one rendered record (including its trailing newline)
    fn record(&self, line: &str);
}

/// Emits records as tracing events under [`DIAGNOSTIC_TARGET`]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn record(&self, line: &str) {
        info!(target: DIAGNOSTIC_TARGET, "{}", line.trim_end());
    }
}

/// Collects records in memory
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    lines: Mutex<Vec<String>>,
}

impl MemoryDiagnostics {
    /// Empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Records emitted so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DiagnosticSink for MemoryDiagnostics {
    fn record(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}
