//! Pipeline Configuration

use crate::PipelineError;
use can_bus::MAX_RECORD_LEN;
use std::time::Duration;

/// Longest the capture path may wait on a full queue
pub const MAX_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

/// Tunables for the capture → format → persist pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Frame queue capacity (default: 100)
    pub queue_capacity: usize,
    /// How long capture waits for a free queue slot before dropping (default: 10 ms)
    pub enqueue_timeout: Duration,
    /// Bytes per record arena (default: 4096)
    pub arena_capacity: usize,
    /// Flush storage every this many persisted messages (default: 400)
    pub flush_every: u64,
    /// Formatter re-check interval while waiting on a swap (default: 1 ms)
    pub swap_poll: Duration,
    /// Writer poll interval for swap requests (default: 1 ms)
    pub writer_poll: Duration,
    /// Capture sleep when the controller has nothing pending (default: 1 ms)
    pub capture_idle: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            enqueue_timeout: Duration::from_millis(10),
            arena_capacity: 4096,
            flush_every: 400,
            swap_poll: Duration::from_millis(1),
            writer_poll: Duration::from_millis(1),
            capture_idle: Duration::from_millis(1),
        }
    }
}

impl PipelineConfig {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.queue_capacity == 0 {
            return Err(PipelineError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.enqueue_timeout > MAX_ENQUEUE_TIMEOUT {
            return Err(PipelineError::InvalidConfig(format!(
                "enqueue_timeout {:?} exceeds {:?}",
                self.enqueue_timeout, MAX_ENQUEUE_TIMEOUT
            )));
        }
        if self.arena_capacity < MAX_RECORD_LEN {
            return Err(PipelineError::InvalidConfig(format!(
                "arena_capacity {} is below the maximum record length {}",
                self.arena_capacity, MAX_RECORD_LEN
            )));
        }
        if self.flush_every == 0 {
            return Err(PipelineError::InvalidConfig(
                "flush_every must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
