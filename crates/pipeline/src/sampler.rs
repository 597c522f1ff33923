//! Throughput Sampler

use crate::counter::MessageCounter;
use std::sync::Arc;
use std::time::Duration;

/// One throughput sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Throughput {
    /// Messages formatted since startup
    pub total: u64,
    /// Messages per second over the last interval
    pub per_second: u64,
}

/// Derives messages/second from the message counter
///
/// Only reads the counter; call [`sample`](Self::sample) once per interval.
#[derive(Debug)]
pub struct ThroughputSampler {
    counter: Arc<MessageCounter>,
    interval: Duration,
    previous: u64,
    last: Throughput,
}

impl ThroughputSampler {
    /// Sampler over `counter`, sampled every `interval`
    pub fn new(counter: Arc<MessageCounter>, interval: Duration) -> Self {
        let previous = counter.get();
        Self {
            counter,
            interval,
            previous,
            last: Throughput {
                total: previous,
                per_second: 0,
            },
        }
    }

    /// Sampling interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Read the counter and compute the rate since the previous sample
    pub fn sample(&mut self) -> Throughput {
        let current = self.counter.get();
        self.observe(current)
    }

    /// Compute the rate for an explicit counter reading
    pub fn observe(&mut self, current: u64) -> Throughput {
        let delta = current.saturating_sub(self.previous);
        let seconds = self.interval.as_secs_f64();
        let per_second = if seconds > 0.0 {
            (delta as f64 / seconds).round() as u64
        } else {
            delta
        };

        self.previous = current;
        self.last = Throughput {
            total: current,
            per_second,
        };
        self.last
    }

    /// Most recent sample
    pub fn last(&self) -> Throughput {
        self.last
    }
}
