//! Status Display
//!
//! Once per sample interval: running total and messages/second. Every health
//! interval: free memory, queue depth and active arena fill.

use pipeline::{PipelineSnapshot, ThroughputSampler};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use sysinfo::System;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Tracing target for the status line
pub const DISPLAY_TARGET: &str = "can_logger::display";

/// Throughput line shown every sample interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusReport {
    /// Messages formatted since startup
    pub messages: u64,
    /// Messages per second over the last interval
    pub per_second: u64,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:9} {}/s", self.messages, self.per_second)
    }
}

/// Periodic system health line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    /// Available memory in KiB
    pub free_memory_kib: u64,
    /// Frames waiting in the queue
    pub queue_depth: usize,
    /// Bytes in the active arena
    pub arena_fill: usize,
    /// Arena capacity
    pub arena_capacity: usize,
}

impl HealthReport {
    /// Combine a pipeline snapshot with a memory reading
    pub fn new(snapshot: &PipelineSnapshot, free_memory_kib: u64) -> Self {
        Self {
            free_memory_kib,
            queue_depth: snapshot.queue_depth,
            arena_fill: snapshot.arena_fill,
            arena_capacity: snapshot.arena_capacity,
        }
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "System Status - Free Memory: {} KiB, Queue: {}, Buffer: {}/{}",
            self.free_memory_kib, self.queue_depth, self.arena_fill, self.arena_capacity
        )
    }
}

/// Where status lines go
pub trait StatusDisplay: Send + Sync {
    /// Show the throughput line
    fn show(&self, report: &StatusReport);

    /// Show the health line
    fn health(&self, report: &HealthReport);
}

/// Emits status lines as tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDisplay;

impl StatusDisplay for TracingDisplay {
    fn show(&self, report: &StatusReport) {
        info!(target: DISPLAY_TARGET, "{}", report);
    }

    fn health(&self, report: &HealthReport) {
        info!("{}", report);
    }
}

/// Keeps every status line in memory
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    reports: Mutex<Vec<StatusReport>>,
    health: Mutex<Vec<HealthReport>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Throughput lines shown so far
    pub fn reports(&self) -> Vec<StatusReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Health lines shown so far
    pub fn health_reports(&self) -> Vec<HealthReport> {
        self.health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StatusDisplay for RecordingDisplay {
    fn show(&self, report: &StatusReport) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*report);
    }

    fn health(&self, report: &HealthReport) {
        self.health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*report);
    }
}

/// Available system memory
pub struct MemoryGauge {
    system: System,
}

impl MemoryGauge {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Refresh and return available memory in KiB
    pub fn available_kib(&mut self) -> u64 {
        self.system.refresh_memory();
        self.system.available_memory() / 1024
    }
}

impl Default for MemoryGauge {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive the status display until the future is dropped
///
/// `snapshot` is read on every tick; `sampler` must be built over the same
/// pipeline's message counter.
pub async fn run_status_loop<F>(
    snapshot: F,
    mut sampler: ThroughputSampler,
    display: &dyn StatusDisplay,
    health_interval: Duration,
)
where
    F: Fn() -> PipelineSnapshot,
{
    let mut sample_tick = tokio::time::interval(sampler.interval());
    let mut health_tick = tokio::time::interval(health_interval);
    sample_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    health_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Both intervals fire immediately; the first real sample is one period out.
    sample_tick.tick().await;
    health_tick.tick().await;

    let mut memory = MemoryGauge::new();

    loop {
        tokio::select! {
            _ = sample_tick.tick() => {
                let throughput = sampler.sample();
                display.show(&StatusReport {
                    messages: throughput.total,
                    per_second: throughput.per_second,
                });
            }
            _ = health_tick.tick() => {
                let free = memory.available_kib();
                display.health(&HealthReport::new(&snapshot(), free));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::MessageCounter;
    use std::sync::Arc;

    #[test]
    fn test_status_line_format() {
        let report = StatusReport {
            messages: 1234,
            per_second: 87,
        };
        assert_eq!(report.to_string(), "     1234 87/s");
    }

    #[test]
    fn test_health_line_format() {
        let snapshot = PipelineSnapshot {
            queue_depth: 4,
            queue_capacity: 100,
            arena_fill: 120,
            arena_capacity: 4096,
            ..Default::default()
        };
        assert_eq!(
            HealthReport::new(&snapshot, 2048).to_string(),
            "System Status - Free Memory: 2048 KiB, Queue: 4, Buffer: 120/4096"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_samples_each_interval() {
        let counter = Arc::new(MessageCounter::new());
        let sampler = ThroughputSampler::new(counter.clone(), Duration::from_secs(1));
        let display = RecordingDisplay::new();

        for _ in 0..250 {
            counter.increment();
        }

        let status = run_status_loop(
            PipelineSnapshot::default,
            sampler,
            &display,
            Duration::from_secs(5),
        );
        let _ = tokio::time::timeout(Duration::from_millis(2500), status).await;

        assert_eq!(
            display.reports(),
            vec![
                StatusReport {
                    messages: 250,
                    per_second: 250
                },
                StatusReport {
                    messages: 250,
                    per_second: 0
                },
            ]
        );
        assert!(display.health_reports().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_report_uses_snapshot() {
        let counter = Arc::new(MessageCounter::new());
        let sampler = ThroughputSampler::new(counter, Duration::from_secs(1));
        let display = RecordingDisplay::new();
        let snapshot = || PipelineSnapshot {
            queue_depth: 7,
            arena_fill: 64,
            arena_capacity: 4096,
            ..Default::default()
        };

        let status = run_status_loop(snapshot, sampler, &display, Duration::from_secs(5));
        let _ = tokio::time::timeout(Duration::from_millis(5500), status).await;

        let health = display.health_reports();
        assert_eq!(health.len(), 1);
        assert_eq!(health[0].queue_depth, 7);
        assert_eq!(health[0].arena_fill, 64);
        assert_eq!(display.reports().len(), 5);
    }
}
