//! Active/Standby Arena Pair
//!
//! Two arenas that never change identity, only role. The formatter appends
//! to the active one; when the next record would overflow it raises a swap
//! request carrying the filled length and waits. The writer services the
//! request by flipping the role index and clearing the request under one
//! lock, then persists the old arena while the formatter carries on in the
//! other one.
//!
//! ```text
//! Active --(swap request serviced)--> PendingWrite --(write done)--> Idle
//! Idle   --(swap request serviced)--> Active
//! ```

use crate::arena::RecordArena;
use crate::BufferError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};

/// Role of one arena at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaRole {
    /// Owned by the formatter, being appended to
    Active,
    /// Owned by the writer, full and being persisted
    PendingWrite,
    /// Owned by the writer, empty, waiting to become active
    Idle,
}

/// Length and record count of the arena handed over in a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRequest {
    /// Bytes to persist
    pub len: usize,
    /// Whole records contained in those bytes
    pub records: u64,
}

/// Arena the writer now owns and must persist
///
/// Consumed by [`DualRecordBuffer::with_pending`], which returns the arena to
/// `Idle`.
#[derive(Debug)]
#[must_use = "a pending batch must be written back with `with_pending`"]
pub struct PendingBatch {
    index: usize,
    request: SwapRequest,
}

impl PendingBatch {
    /// Which arena (0 or 1) holds the batch
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bytes to persist
    pub fn len(&self) -> usize {
        self.request.len
    }

    /// Check if the batch carries no bytes
    pub fn is_empty(&self) -> bool {
        self.request.len == 0
    }

    /// Whole records in the batch
    pub fn records(&self) -> u64 {
        self.request.records
    }
}

/// Outcome of one writer poll
#[derive(Debug)]
pub enum SwapPoll {
    /// A swap was serviced; persist this batch
    Ready(PendingBatch),
    /// Nothing requested within the poll interval
    Idle,
    /// Buffer closed and no request outstanding
    Closed,
}

struct Handoff {
    /// Index of the active arena
    active: usize,
    /// At most one outstanding request
    request: Option<SwapRequest>,
    /// Arena currently being persisted
    writing: Option<usize>,
    closed: bool,
}

/// Double-buffered record store shared by the formatter and the writer
pub struct DualRecordBuffer {
    arenas: [Mutex<RecordArena>; 2],
    handoff: Mutex<Handoff>,
    /// Signalled when a request is raised or the buffer closes
    requested: Condvar,
    /// Signalled when a request is serviced or the buffer closes
    serviced: Condvar,
    capacity: usize,
    swaps: AtomicU64,
}

impl DualRecordBuffer {
    /// Allocate both arenas; arena 0 starts active
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::CapacityTooSmall {
                capacity,
                minimum: 1,
            });
        }

        Ok(Self {
            arenas: [
                Mutex::new(RecordArena::new(capacity)),
                Mutex::new(RecordArena::new(capacity)),
            ],
            handoff: Mutex::new(Handoff {
                active: 0,
                request: None,
                writing: None,
                closed: false,
            }),
            requested: Condvar::new(),
            serviced: Condvar::new(),
            capacity,
            swaps: AtomicU64::new(0),
        })
    }

    fn lock_handoff(&self) -> MutexGuard<'_, Handoff> {
        self.handoff.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_arena(&self, index: usize) -> MutexGuard<'_, RecordArena> {
        self.arenas[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Capacity of each arena
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index of the arena currently accepting records
    pub fn active_index(&self) -> usize {
        self.lock_handoff().active
    }

    /// Current role of arena `index` (0 or 1)
    pub fn role(&self, index: usize) -> ArenaRole {
        let handoff = self.lock_handoff();
        if handoff.active == index {
            ArenaRole::Active
        } else if handoff.writing == Some(index) {
            ArenaRole::PendingWrite
        } else {
            ArenaRole::Idle
        }
    }

    /// Bytes written into the active arena
    pub fn active_len(&self) -> usize {
        let index = self.active_index();
        self.lock_arena(index).len()
    }

    /// Swaps serviced so far
    pub fn swaps(&self) -> u64 {
        self.swaps.load(Ordering::Relaxed)
    }

    /// Whether a swap request is outstanding
    pub fn swap_pending(&self) -> bool {
        self.lock_handoff().request.is_some()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.lock_handoff().closed
    }

    /// Append one whole record to the active arena
    ///
    /// If it would overflow, first hands the active arena to the writer and
    /// waits (re-checking every `poll`) until the swap is serviced; the
    /// record then lands at cursor 0 of the other arena. Returns whether a
    /// swap happened.
    pub fn append(&self, record: &[u8], poll: Duration) -> Result<bool, BufferError> {
        if record.len() > self.capacity {
            return Err(BufferError::RecordTooLarge {
                needed: record.len(),
                capacity: self.capacity,
            });
        }

        {
            let mut arena = self.lock_arena(self.active_index());
            if arena.fits(record.len()) {
                arena.push(record)?;
                return Ok(false);
            }
        }

        self.request_swap(poll)?;
        self.lock_arena(self.active_index()).push(record)?;
        Ok(true)
    }

    /// Raise a swap request for the active arena and wait until serviced
    pub fn request_swap(&self, poll: Duration) -> Result<SwapRequest, BufferError> {
        let request = {
            let arena = self.lock_arena(self.active_index());
            SwapRequest {
                len: arena.len(),
                records: arena.records(),
            }
        };

        let mut handoff = self.lock_handoff();
        if handoff.closed {
            return Err(BufferError::Closed);
        }
        debug_assert!(handoff.request.is_none(), "only the formatter raises swaps");
        handoff.request = Some(request);
        self.requested.notify_one();
        trace!(len = request.len, "Swap requested");

        while handoff.request.is_some() {
            if handoff.closed {
                handoff.request = None;
                return Err(BufferError::Closed);
            }
            handoff = self
                .serviced
                .wait_timeout(handoff, poll)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        Ok(request)
    }

    /// Hand over whatever the active arena holds, then close
    ///
    /// Used at shutdown so the tail of the session reaches storage.
    pub fn finish(&self, poll: Duration) -> Result<(), BufferError> {
        if self.active_len() > 0 {
            self.request_swap(poll)?;
        }
        self.close();
        Ok(())
    }

    /// Stop accepting swap requests and wake both sides
    pub fn close(&self) {
        self.lock_handoff().closed = true;
        self.requested.notify_all();
        self.serviced.notify_all();
    }

    /// Writer side: wait up to `poll` for a request and service it
    ///
    /// Servicing flips the role index and clears the request in one critical
    /// section, which releases the formatter.
    pub fn take_swap(&self, poll: Duration) -> SwapPoll {
        let mut handoff = self.lock_handoff();
        if handoff.request.is_none() && !handoff.closed {
            handoff = self
                .requested
                .wait_timeout(handoff, poll)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        // The standby arena must be Idle before it can become active.
        if handoff.writing.is_some() {
            return SwapPoll::Idle;
        }

        match handoff.request.take() {
            Some(request) => {
                let pending = handoff.active;
                handoff.active = 1 - pending;
                handoff.writing = Some(pending);
                drop(handoff);

                self.swaps.fetch_add(1, Ordering::Relaxed);
                self.serviced.notify_all();
                debug!(arena = pending, len = request.len, "Swap serviced");

                SwapPoll::Ready(PendingBatch {
                    index: pending,
                    request,
                })
            }
            None if handoff.closed => SwapPoll::Closed,
            None => SwapPoll::Idle,
        }
    }

    /// Writer side: run `persist` over the batch bytes, then mark the arena Idle
    pub fn with_pending<R>(&self, batch: PendingBatch, persist: impl FnOnce(&[u8]) -> R) -> R {
        let result = {
            let mut arena = self.lock_arena(batch.index);
            let len = batch.len().min(arena.len());
            let result = persist(&arena.contents()[..len]);
            arena.clear();
            result
        };

        self.lock_handoff().writing = None;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread::JoinHandle;

    const POLL: Duration = Duration::from_millis(1);

    fn spawn_writer(buffer: Arc<DualRecordBuffer>) -> JoinHandle<Vec<Vec<u8>>> {
        std::thread::spawn(move || {
            let mut batches = Vec::new();
            loop {
                match buffer.take_swap(POLL) {
                    SwapPoll::Ready(batch) => {
                        assert_eq!(buffer.role(batch.index()), ArenaRole::PendingWrite);
                        let bytes = buffer.with_pending(batch, |bytes| bytes.to_vec());
                        batches.push(bytes);
                    }
                    SwapPoll::Idle => {}
                    SwapPoll::Closed => break,
                }
            }
            batches
        })
    }

    #[test]
    fn test_initial_roles() {
        let buffer = DualRecordBuffer::new(64).unwrap();
        assert_eq!(buffer.active_index(), 0);
        assert_eq!(buffer.role(0), ArenaRole::Active);
        assert_eq!(buffer.role(1), ArenaRole::Idle);
        assert_eq!(buffer.active_len(), 0);
        assert!(!buffer.swap_pending());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            DualRecordBuffer::new(0),
            Err(BufferError::CapacityTooSmall { .. })
        ));
    }

    #[test]
    fn test_record_larger_than_arena() {
        let buffer = DualRecordBuffer::new(4).unwrap();
        assert_eq!(
            buffer.append(b"12345", POLL),
            Err(BufferError::RecordTooLarge {
                needed: 5,
                capacity: 4
            })
        );
    }

    #[test]
    fn test_swap_before_overflowing_record() {
        let buffer = Arc::new(DualRecordBuffer::new(4096).unwrap());
        let writer = spawn_writer(buffer.clone());

        let filler = vec![b'a'; 4090];
        assert!(!buffer.append(&filler, POLL).unwrap());
        assert_eq!(buffer.active_len(), 4090);

        let record = b"123456789\n";
        assert!(buffer.append(record, POLL).unwrap());
        assert_eq!(buffer.active_index(), 1);
        assert_eq!(buffer.active_len(), 10);
        assert_eq!(buffer.swaps(), 1);

        buffer.close();
        let batches = writer.join().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 4090);
        assert_eq!(buffer.role(0), ArenaRole::Idle);
    }

    #[test]
    fn test_arenas_alternate() {
        let buffer = Arc::new(DualRecordBuffer::new(8).unwrap());
        let writer = spawn_writer(buffer.clone());

        for i in 0..6u8 {
            buffer.append(&[b'0' + i; 8], POLL).unwrap();
            assert_eq!(buffer.active_index(), (i % 2) as usize);
        }

        buffer.finish(POLL).unwrap();
        let batches = writer.join().unwrap();
        assert_eq!(batches.len(), 6);
        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch, &vec![b'0' + i as u8; 8]);
        }
    }

    #[test]
    fn test_finish_flushes_tail_and_closes() {
        let buffer = Arc::new(DualRecordBuffer::new(64).unwrap());
        let writer = spawn_writer(buffer.clone());

        buffer.append(b"tail\n", POLL).unwrap();
        buffer.finish(POLL).unwrap();

        let batches = writer.join().unwrap();
        assert_eq!(batches, vec![b"tail\n".to_vec()]);
        assert!(buffer.is_closed());
        assert_eq!(buffer.request_swap(POLL), Err(BufferError::Closed));
    }

    #[test]
    fn test_finish_on_empty_arena_writes_nothing() {
        let buffer = Arc::new(DualRecordBuffer::new(64).unwrap());
        let writer = spawn_writer(buffer.clone());
        buffer.finish(POLL).unwrap();
        assert!(writer.join().unwrap().is_empty());
    }

    #[test]
    fn test_take_swap_times_out_when_idle() {
        let buffer = DualRecordBuffer::new(64).unwrap();
        assert!(matches!(buffer.take_swap(POLL), SwapPoll::Idle));
        buffer.close();
        assert!(matches!(buffer.take_swap(POLL), SwapPoll::Closed));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_batches_hold_whole_records(
            capacity in 16usize..256,
            lengths in proptest::collection::vec(1usize..16, 1..200),
        ) {
            let buffer = Arc::new(DualRecordBuffer::new(capacity).unwrap());
            let writer = spawn_writer(buffer.clone());

            let records: Vec<Vec<u8>> = lengths
                .iter()
                .enumerate()
                .map(|(i, len)| vec![(i % 251) as u8; *len])
                .collect();
            for record in &records {
                buffer.append(record, POLL).unwrap();
            }
            buffer.finish(POLL).unwrap();
            let batches = writer.join().unwrap();

            let mut next = records.iter();
            for batch in &batches {
                prop_assert!(batch.len() <= capacity);
                let mut consumed = 0;
                while consumed < batch.len() {
                    let record = next.next().unwrap();
                    prop_assert_eq!(&batch[consumed..consumed + record.len()], &record[..]);
                    consumed += record.len();
                }
                prop_assert_eq!(consumed, batch.len());
            }
            prop_assert!(next.next().is_none());
        }
    }
}
