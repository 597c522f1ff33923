//! Bounded Frame Queue
//!
//! Fixed-capacity FIFO carrying captured frames from the capture task to the
//! formatter. Enqueue gives up after a short timeout instead of blocking the
//! capture path; dequeue blocks until a frame arrives.

mod queue;

pub use queue::{FrameQueue, DEFAULT_CAPACITY};

use thiserror::Error;

/// Queue errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Queue full, item dropped")]
    Full,
    #[error("Queue closed")]
    Closed,
}
