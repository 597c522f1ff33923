//! Bounded Frame Queue Implementation

use crate::QueueError;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Default queue capacity (frames)
pub const DEFAULT_CAPACITY: usize = 100;

/// Fixed-capacity FIFO shared between one producer and one consumer
///
/// A bounded channel holding both ends. The producer never waits longer than
/// the timeout it passes in; the consumer may wait forever. Closing drops the
/// sending end, so the consumer drains what is queued and then sees the end.
pub struct FrameQueue<T> {
    /// `None` once closed
    sender: RwLock<Option<Sender<T>>>,
    receiver: Receiver<T>,
    capacity: usize,
    /// Items accepted (for statistics)
    accepted: AtomicU64,
    /// Items discarded because the queue stayed full
    dropped: AtomicU64,
}

impl<T> FrameQueue<T> {
    /// Create a queue holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender: RwLock::new(Some(sender)),
            receiver,
            capacity,
            accepted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Create a queue with default capacity (100 frames)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Append `item`, waiting at most `timeout` for a free slot
    ///
    /// On [`QueueError::Full`] the item is discarded and counted as dropped.
    /// A timeout too large to form a deadline waits without one.
    pub fn try_enqueue(&self, item: T, timeout: Duration) -> Result<(), QueueError> {
        let sender = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let sender = sender.as_ref().ok_or(QueueError::Closed)?;

        match sender.send_timeout(item, timeout) {
            Ok(()) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(SendTimeoutError::Timeout(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(QueueError::Full)
            }
            Err(SendTimeoutError::Disconnected(_)) => Err(QueueError::Closed),
        }
    }

    /// Remove the oldest item, waiting indefinitely for one to arrive
    ///
    /// Returns `None` only once the queue is closed and fully drained.
    pub fn dequeue_blocking(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Remove the oldest item if one is queued
    pub fn try_dequeue(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Refuse further items and wake a blocked consumer
    ///
    /// Items already queued can still be dequeued.
    pub fn close(&self) {
        self.sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Number of items currently queued
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Get the queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.len() as f64 / self.capacity as f64
    }

    /// Total items accepted
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Total items dropped on a full queue
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    const NO_WAIT: Duration = Duration::from_millis(1);

    #[test]
    fn test_fifo_order() {
        let queue = FrameQueue::new(10);
        for i in 0..5 {
            queue.try_enqueue(i, NO_WAIT).unwrap();
        }
        assert_eq!(queue.len(), 5);

        let drained: Vec<_> = std::iter::from_fn(|| queue.try_dequeue()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drops_once_capacity_reached() {
        let queue = FrameQueue::new(50);
        let mut dropped_positions = Vec::new();

        for i in 0..60 {
            if queue.try_enqueue(i, NO_WAIT) == Err(QueueError::Full) {
                dropped_positions.push(i);
            }
        }

        assert_eq!(queue.len(), 50);
        assert_eq!(queue.accepted(), 50);
        assert_eq!(queue.dropped(), 10);
        assert_eq!(dropped_positions, (50..60).collect::<Vec<_>>());

        let drained: Vec<_> = std::iter::from_fn(|| queue.try_dequeue()).collect();
        assert_eq!(drained, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_enqueue_waits_for_consumer() {
        let queue = Arc::new(FrameQueue::new(1));
        queue.try_enqueue(1, NO_WAIT).unwrap();

        let consumer = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                queue.dequeue_blocking()
            })
        };

        queue.try_enqueue(2, Duration::from_secs(5)).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(1));
        assert_eq!(queue.try_dequeue(), Some(2));
        assert_eq!(queue.dropped(), 0);
    }

    #[test]
    fn test_dequeue_blocks_until_item() {
        let queue = Arc::new(FrameQueue::new(4));
        let consumer = {
            let queue = queue.clone();
            std::thread::spawn(move || queue.dequeue_blocking())
        };

        std::thread::sleep(Duration::from_millis(10));
        queue.try_enqueue(42, NO_WAIT).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(42));
    }

    #[test]
    fn test_close_drains_then_ends() {
        let queue = FrameQueue::new(4);
        queue.try_enqueue("a", NO_WAIT).unwrap();
        queue.close();

        assert_eq!(queue.try_enqueue("b", NO_WAIT), Err(QueueError::Closed));
        assert_eq!(queue.dequeue_blocking(), Some("a"));
        assert_eq!(queue.dequeue_blocking(), None);
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let queue: Arc<FrameQueue<u32>> = Arc::new(FrameQueue::new(4));
        let consumer = {
            let queue = queue.clone();
            std::thread::spawn(move || queue.dequeue_blocking())
        };

        std::thread::sleep(Duration::from_millis(10));
        queue.close();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn test_unbounded_timeout_waits_for_consumer() {
        let queue = Arc::new(FrameQueue::new(1));
        queue.try_enqueue(1, Duration::MAX).unwrap();

        let consumer = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                queue.dequeue_blocking()
            })
        };

        queue.try_enqueue(2, Duration::MAX).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(1));
        assert_eq!(queue.try_dequeue(), Some(2));
        assert_eq!(queue.dropped(), 0);
    }

    proptest! {
        #[test]
        fn prop_paused_consumer_keeps_order(capacity in 1usize..64, submitted in 0usize..128) {
            let queue = FrameQueue::new(capacity);
            let mut rejected = 0;
            for i in 0..submitted {
                if queue.try_enqueue(i, Duration::ZERO).is_err() {
                    rejected += 1;
                }
            }

            let accepted = submitted.min(capacity);
            prop_assert_eq!(rejected, submitted - accepted);
            prop_assert_eq!(queue.dropped() as usize, submitted - accepted);

            let drained: Vec<_> = std::iter::from_fn(|| queue.try_dequeue()).collect();
            prop_assert_eq!(drained, (0..accepted).collect::<Vec<_>>());
        }
    }
}
