//! Capture Clock
//!
//! The RTC on the logger only ticks in whole seconds. Timestamps combine one
//! coarse reading taken at session start with a monotonic offset, so they
//! have sub-second resolution and never go backwards within a session.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source of capture timestamps
pub trait ClockSource: Send + Sync {
    /// Seconds since the Unix epoch, fractional
    fn now(&self) -> f64;

    /// Wall-clock time, used for naming the session log
    fn wall_clock(&self) -> DateTime<Utc>;
}

/// Coarse real-time base plus monotonic offset
#[derive(Debug, Clone)]
pub struct SessionClock {
    base_secs: i64,
    started: Instant,
}

impl SessionClock {
    /// Read the real-time clock (truncated to whole seconds) and start counting
    pub fn start() -> Self {
        Self::from_coarse(Utc::now().timestamp())
    }

    /// Start from an explicit whole-second RTC reading
    pub fn from_coarse(base_secs: i64) -> Self {
        Self {
            base_secs,
            started: Instant::now(),
        }
    }

    /// Time since the session started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl ClockSource for SessionClock {
    fn now(&self) -> f64 {
        self.base_secs as f64 + self.started.elapsed().as_secs_f64()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        let base = DateTime::<Utc>::from_timestamp(self.base_secs, 0).unwrap_or_default();
        let offset = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        base + offset
    }
}

/// Manually advanced clock for tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    /// Clock fixed at `secs` seconds since epoch
    pub fn at(secs: f64) -> Self {
        Self {
            micros: AtomicU64::new((secs * 1e6).round() as u64),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.as_micros() as u64, Ordering::Relaxed);
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> f64 {
        self.micros.load(Ordering::Relaxed) as f64 / 1e6
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        let micros = self.micros.load(Ordering::Relaxed) as i64;
        DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or_default()
    }
}
