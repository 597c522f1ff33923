//! Capture Task
//!
//! Drains the controller's receive backlog into the frame queue. Never waits
//! longer than the enqueue timeout: a frame that finds the queue full is
//! dropped and reported, because the controller's own FIFO would overflow
//! while we waited.

use can_bus::{BusController, ClockSource, Frame};
use frame_queue::{FrameQueue, QueueError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Capture statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames accepted by the queue
    pub captured: u64,
    /// Frames dropped on a full queue
    pub dropped: u64,
    /// Failed controller reads
    pub read_errors: u64,
}

/// Moves frames from the controller into the queue
pub struct CaptureTask {
    controller: Box<dyn BusController>,
    queue: Arc<FrameQueue<Frame>>,
    clock: Arc<dyn ClockSource>,
    enqueue_timeout: Duration,
    idle: Duration,
    stats: CaptureStats,
}

impl CaptureTask {
    /// Create a capture task over an initialized controller
    pub fn new(
        controller: Box<dyn BusController>,
        queue: Arc<FrameQueue<Frame>>,
        clock: Arc<dyn ClockSource>,
        enqueue_timeout: Duration,
        idle: Duration,
    ) -> Self {
        Self {
            controller,
            queue,
            clock,
            enqueue_timeout,
            idle,
            stats: CaptureStats::default(),
        }
    }

    /// Read every frame currently pending, returning how many were read
    ///
    /// Stops early on a read error (retried next poll), a closed queue or a
    /// raised `shutdown` flag, which is checked per frame since an
    /// overloaded bus never empties the backlog.
    pub fn drain_backlog(&mut self, shutdown: &AtomicBool) -> usize {
        let mut read = 0;

        while !shutdown.load(Ordering::Acquire) && self.controller.has_pending_frame() {
            let frame = match self.controller.read_frame() {
                Ok(raw) => raw.stamp(self.clock.now()),
                Err(e) => {
                    self.stats.read_errors += 1;
                    warn!("CAN read error: {}", e);
                    break;
                }
            };
            read += 1;

            let id = frame.id();
            match self.queue.try_enqueue(frame, self.enqueue_timeout) {
                Ok(()) => self.stats.captured += 1,
                Err(QueueError::Full) => {
                    self.stats.dropped += 1;
                    metrics::counter!("canlog_frames_dropped_total").increment(1);
                    warn!("Queue full! Dropped message {:X}", id);
                }
                Err(QueueError::Closed) => {
                    debug!("Frame queue closed, stopping drain");
                    break;
                }
            }
        }

        read
    }

    /// Statistics so far
    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Poll the controller until `shutdown` is raised
    pub fn run(mut self, shutdown: &AtomicBool) -> CaptureStats {
        info!("Starting capture task");

        while !shutdown.load(Ordering::Acquire) {
            if self.drain_backlog(shutdown) == 0 {
                std::thread::sleep(self.idle);
            }
        }

        info!(
            captured = self.stats.captured,
            dropped = self.stats.dropped,
            "Capture task stopped"
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_bus::{ControllerError, ManualClock, RawFrame, ScriptedController};
    use std::sync::mpsc;

    static NO_SHUTDOWN: AtomicBool = AtomicBool::new(false);

    /// Controller whose receive backlog never empties
    struct Flooded {
        next: u32,
    }

    impl BusController for Flooded {
        fn initialize(&mut self) -> Result<(), ControllerError> {
            Ok(())
        }

        fn has_pending_frame(&mut self) -> bool {
            true
        }

        fn read_frame(&mut self) -> Result<RawFrame, ControllerError> {
            self.next = self.next.wrapping_add(1);
            RawFrame::new(self.next & 0x7FF, &[0xAA]).map_err(|e| ControllerError::Read(e.to_string()))
        }

        fn is_initialized(&self) -> bool {
            true
        }
    }

    fn scripted(count: u32) -> ScriptedController {
        let frames = (0..count).map(|i| RawFrame::new(i, &[i as u8]).unwrap());
        let mut controller = ScriptedController::new(frames);
        controller.initialize().unwrap();
        controller
    }

    fn make_task(controller: ScriptedController, capacity: usize) -> (CaptureTask, Arc<FrameQueue<Frame>>) {
        let queue = Arc::new(FrameQueue::new(capacity));
        let task = CaptureTask::new(
            Box::new(controller),
            queue.clone(),
            Arc::new(ManualClock::at(1_700_000_000.0)),
            Duration::from_millis(1),
            Duration::from_millis(1),
        );
        (task, queue)
    }

    #[test]
    fn test_drains_whole_backlog_in_order() {
        let (mut task, queue) = make_task(scripted(5), 10);
        assert_eq!(task.drain_backlog(&NO_SHUTDOWN), 5);

        let ids: Vec<_> = std::iter::from_fn(|| queue.try_dequeue()).map(|f| f.id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(task.stats().captured, 5);
    }

    #[test]
    fn test_frames_are_stamped_at_capture() {
        let (mut task, queue) = make_task(scripted(1), 10);
        task.drain_backlog(&NO_SHUTDOWN);
        let frame = queue.try_dequeue().unwrap();
        assert_eq!(frame.timestamp(), 1_700_000_000.0);
    }

    #[test]
    fn test_overflow_drops_tail_without_blocking() {
        let (mut task, queue) = make_task(scripted(60), 50);
        assert_eq!(task.drain_backlog(&NO_SHUTDOWN), 60);

        let stats = task.stats();
        assert_eq!(stats.captured, 50);
        assert_eq!(stats.dropped, 10);
        assert_eq!(queue.dropped(), 10);

        let ids: Vec<_> = std::iter::from_fn(|| queue.try_dequeue()).map(|f| f.id()).collect();
        assert_eq!(ids, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_read_error_is_counted_and_skipped() {
        let mut controller = scripted(1);
        controller.push_error(ControllerError::Read("crc".to_string()));
        controller.push_frame(RawFrame::new(0x42, &[]).unwrap());

        let (mut task, queue) = make_task(controller, 10);
        assert_eq!(task.drain_backlog(&NO_SHUTDOWN), 1);
        assert_eq!(task.stats().read_errors, 1);
        assert_eq!(task.drain_backlog(&NO_SHUTDOWN), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let (task, queue) = make_task(scripted(3), 10);
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = {
            let shutdown = shutdown.clone();
            std::thread::spawn(move || task.run(&shutdown))
        };
        while queue.len() < 3 {
            std::thread::sleep(Duration::from_millis(1));
        }
        shutdown.store(true, Ordering::Release);

        let stats = handle.join().unwrap();
        assert_eq!(stats.captured, 3);
    }

    #[test]
    fn test_run_stops_while_backlog_never_empties() {
        let queue = Arc::new(FrameQueue::new(8));
        let task = CaptureTask::new(
            Box::new(Flooded { next: 0 }),
            queue.clone(),
            Arc::new(ManualClock::at(0.0)),
            Duration::from_millis(1),
            Duration::from_millis(1),
        );
        let shutdown = Arc::new(AtomicBool::new(false));

        let (done_tx, done_rx) = mpsc::channel();
        {
            let shutdown = shutdown.clone();
            std::thread::spawn(move || {
                let _ = done_tx.send(task.run(&shutdown));
            });
        }

        std::thread::sleep(Duration::from_millis(50));
        shutdown.store(true, Ordering::Release);

        let stats = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("capture did not stop under a flooded bus");
        assert_eq!(stats.captured, 8);
        assert!(stats.dropped > 0);
    }
}
