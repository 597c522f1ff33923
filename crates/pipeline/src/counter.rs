//! Message Counter

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic count of formatted frames
///
/// Incremented only by the formatter; read by the writer and the sampler.
#[derive(Debug, Default)]
pub struct MessageCounter {
    count: AtomicU64,
}

impl MessageCounter {
    /// Counter starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one and return the new total
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Release) + 1
    }

    /// Current total
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increment_returns_total() {
        let counter = MessageCounter::new();
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_reader_sees_writer_progress() {
        let counter = Arc::new(MessageCounter::new());
        let writer = {
            let counter = counter.clone();
            std::thread::spawn(move || {
                for _ in 0..10_000 {
                    counter.increment();
                }
            })
        };

        let mut last = 0;
        while last < 10_000 {
            let now = counter.get();
            assert!(now >= last);
            last = now;
        }
        writer.join().unwrap();
    }
}
