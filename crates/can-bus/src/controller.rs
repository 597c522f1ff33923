//! Bus Controller Abstraction
//!
//! The capture task only needs two calls from the hardware: "is a frame
//! waiting" and "give me the next one". Vendor drivers implement
//! [`BusController`]; this module ships a simulated controller for bench
//! runs and a scripted one for tests.

use crate::error::ControllerError;
use crate::frame::{RawFrame, MAX_EXTENDED_ID, MAX_STANDARD_ID};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Receive side of a CAN controller
pub trait BusController: Send {
    /// Bring the controller up (bitrate, filters, normal mode)
    fn initialize(&mut self) -> Result<(), ControllerError>;

    /// Whether the receive backlog holds at least one frame
    fn has_pending_frame(&mut self) -> bool;

    /// Pop the oldest frame from the receive backlog
    fn read_frame(&mut self) -> Result<RawFrame, ControllerError>;

    /// Whether `initialize` has succeeded
    fn is_initialized(&self) -> bool;
}

/// Bounded retry policy for controller bring-up
#[derive(Debug, Clone)]
pub struct InitPolicy {
    /// Attempts per round
    pub attempts: u8,
    /// Delay between attempts within a round
    pub retry_delay: Duration,
    /// Number of rounds
    pub rounds: u8,
    /// Delay between rounds
    pub round_delay: Duration,
}

impl Default for InitPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay: Duration::from_millis(100),
            rounds: 2,
            round_delay: Duration::from_secs(1),
        }
    }
}

/// Initialize `controller`, retrying per `policy`
///
/// Returns the number of attempts used on success, or the last error once
/// every round is exhausted. Blocks the calling thread between attempts.
pub fn initialize_with_retry(
    controller: &mut dyn BusController,
    policy: &InitPolicy,
) -> Result<u32, ControllerError> {
    let mut attempts = 0u32;
    let mut last_error = ControllerError::NotInitialized;

    for round in 0..policy.rounds.max(1) {
        if round > 0 {
            warn!("Controller init failed, retrying in {:?}", policy.round_delay);
            std::thread::sleep(policy.round_delay);
        }

        for attempt in 0..policy.attempts.max(1) {
            if attempt > 0 {
                std::thread::sleep(policy.retry_delay);
            }
            attempts += 1;

            match controller.initialize() {
                Ok(()) => {
                    info!("Bus controller initialized after {} attempt(s)", attempts);
                    return Ok(attempts);
                }
                Err(e) => {
                    debug!("Controller init attempt {} failed: {}", attempts, e);
                    last_error = e;
                }
            }
        }
    }

    Err(last_error)
}

/// Settings for the simulated controller
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Frames generated per second
    pub rate_hz: f64,
    /// Nominal bitrate, only reported in logs
    pub bitrate: u32,
    /// Seed for the payload generator
    pub seed: u64,
    /// Receive FIFO depth; older frames are overrun beyond it
    pub fifo_depth: u64,
}

/// Receive FIFO depth of a typical CAN controller (frames)
pub const DEFAULT_FIFO_DEPTH: u64 = 3;

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            rate_hz: 1000.0,
            bitrate: 500_000,
            seed: 0x5EED,
            fifo_depth: DEFAULT_FIFO_DEPTH,
        }
    }
}

/// Controller that synthesises traffic at a fixed rate
///
/// Frames "arrive" on a wall-clock schedule into a FIFO of `fifo_depth`
/// frames. A consumer that falls behind loses the oldest frames to overrun,
/// counted in [`overruns`](Self::overruns).
pub struct SimulatedController {
    config: SimulatedConfig,
    initialized: bool,
    started: Instant,
    emitted: u64,
    overruns: u64,
}

impl SimulatedController {
    /// Create an uninitialized simulated controller
    pub fn new(config: SimulatedConfig) -> Self {
        info!(
            "Creating simulated CAN controller: {} Hz @ {} bit/s",
            config.rate_hz, config.bitrate
        );
        Self {
            config,
            initialized: false,
            started: Instant::now(),
            emitted: 0,
            overruns: 0,
        }
    }

    /// Frames lost because the FIFO was full when they arrived
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Frames waiting in the FIFO, after discarding any overrun
    fn backlog(&mut self) -> u64 {
        let due = (self.started.elapsed().as_secs_f64() * self.config.rate_hz) as u64;
        let depth = self.config.fifo_depth.max(1);
        let waiting = due.saturating_sub(self.emitted);
        if waiting > depth {
            let lost = waiting - depth;
            self.overruns += lost;
            self.emitted += lost;
            debug!("Simulated receive FIFO overrun, {} frame(s) lost", lost);
        }
        due.saturating_sub(self.emitted)
    }

    fn generate(&self, sequence: u64) -> RawFrame {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        // Deterministic per (seed, sequence) pseudo-random traffic
        let mut hasher = DefaultHasher::new();
        self.config.seed.hash(&mut hasher);
        sequence.hash(&mut hasher);
        let hash = hasher.finish();

        let id = if hash % 4 == 0 {
            (hash >> 8) as u32 & MAX_EXTENDED_ID
        } else {
            (hash >> 8) as u32 & MAX_STANDARD_ID
        };
        let len = ((hash >> 40) % 9) as usize;
        let bytes = hash.to_le_bytes();

        // id and len are masked into range above
        RawFrame::new(id, &bytes[..len]).unwrap_or_default()
    }
}

impl BusController for SimulatedController {
    fn initialize(&mut self) -> Result<(), ControllerError> {
        self.initialized = true;
        self.started = Instant::now();
        self.emitted = 0;
        self.overruns = 0;
        Ok(())
    }

    fn has_pending_frame(&mut self) -> bool {
        self.initialized && self.backlog() > 0
    }

    fn read_frame(&mut self) -> Result<RawFrame, ControllerError> {
        if !self.initialized {
            return Err(ControllerError::NotInitialized);
        }
        if self.backlog() == 0 {
            return Err(ControllerError::NoData);
        }

        let frame = self.generate(self.emitted);
        self.emitted += 1;
        Ok(frame)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Controller that replays a fixed script of reads
pub struct ScriptedController {
    script: VecDeque<Result<RawFrame, ControllerError>>,
    init_failures: u32,
    initialized: bool,
}

impl ScriptedController {
    /// Controller that yields `frames` in order
    pub fn new(frames: impl IntoIterator<Item = RawFrame>) -> Self {
        Self {
            script: frames.into_iter().map(Ok).collect(),
            init_failures: 0,
            initialized: false,
        }
    }

    /// Fail the first `count` initialization attempts
    pub fn with_init_failures(mut self, count: u32) -> Self {
        self.init_failures = count;
        self
    }

    /// Queue a read failure after the frames already scripted
    pub fn push_error(&mut self, error: ControllerError) {
        self.script.push_back(Err(error));
    }

    /// Queue another frame
    pub fn push_frame(&mut self, frame: RawFrame) {
        self.script.push_back(Ok(frame));
    }

    /// Reads left in the script
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl BusController for ScriptedController {
    fn initialize(&mut self) -> Result<(), ControllerError> {
        if self.init_failures > 0 {
            self.init_failures -= 1;
            return Err(ControllerError::Init("scripted failure".to_string()));
        }
        self.initialized = true;
        Ok(())
    }

    fn has_pending_frame(&mut self) -> bool {
        self.initialized && !self.script.is_empty()
    }

    fn read_frame(&mut self) -> Result<RawFrame, ControllerError> {
        if !self.initialized {
            return Err(ControllerError::NotInitialized);
        }
        self.script.pop_front().unwrap_or(Err(ControllerError::NoData))
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_policy() -> InitPolicy {
        InitPolicy {
            attempts: 3,
            retry_delay: Duration::from_millis(1),
            rounds: 2,
            round_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_init_succeeds_after_retries() {
        let mut controller = ScriptedController::new([]).with_init_failures(2);
        let attempts = initialize_with_retry(&mut controller, &quick_policy()).unwrap();
        assert_eq!(attempts, 3);
        assert!(controller.is_initialized());
    }

    #[test]
    fn test_init_second_round() {
        let mut controller = ScriptedController::new([]).with_init_failures(4);
        let attempts = initialize_with_retry(&mut controller, &quick_policy()).unwrap();
        assert_eq!(attempts, 5);
    }

    #[test]
    fn test_init_gives_up() {
        let mut controller = ScriptedController::new([]).with_init_failures(10);
        let result = initialize_with_retry(&mut controller, &quick_policy());
        assert!(matches!(result, Err(ControllerError::Init(_))));
        assert!(!controller.is_initialized());
    }

    #[test]
    fn test_scripted_reads_in_order() {
        let frames = [
            RawFrame::new(0x100, &[1]).unwrap(),
            RawFrame::new(0x200, &[2]).unwrap(),
        ];
        let mut controller = ScriptedController::new(frames);
        controller.push_error(ControllerError::BusOff);

        assert!(matches!(
            controller.read_frame(),
            Err(ControllerError::NotInitialized)
        ));
        controller.initialize().unwrap();

        assert_eq!(controller.read_frame().unwrap().id(), 0x100);
        assert_eq!(controller.read_frame().unwrap().id(), 0x200);
        assert!(matches!(controller.read_frame(), Err(ControllerError::BusOff)));
        assert!(!controller.has_pending_frame());
        assert!(matches!(controller.read_frame(), Err(ControllerError::NoData)));
    }

    #[test]
    fn test_simulated_controller_produces_frames() {
        let mut controller = SimulatedController::new(SimulatedConfig {
            rate_hz: 10_000.0,
            ..Default::default()
        });
        assert!(!controller.has_pending_frame());
        controller.initialize().unwrap();

        std::thread::sleep(Duration::from_millis(5));
        assert!(controller.has_pending_frame());

        let mut read = 0;
        while controller.has_pending_frame() && read < 10 {
            let frame = controller.read_frame().unwrap();
            assert!(frame.id() <= MAX_EXTENDED_ID);
            assert!(frame.len() <= 8);
            read += 1;
        }
        assert!(read > 0);
    }

    #[test]
    fn test_simulated_fifo_overruns_when_not_drained() {
        let mut controller = SimulatedController::new(SimulatedConfig {
            rate_hz: 10_000.0,
            ..Default::default()
        });
        controller.initialize().unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert!(controller.has_pending_frame());
        assert!(controller.overruns() > 0);

        let mut read = 0;
        while controller.has_pending_frame() && read < 50 {
            controller.read_frame().unwrap();
            read += 1;
        }
        assert!(read < 50, "backlog exceeded the receive FIFO");
    }

    #[test]
    fn test_simulated_traffic_is_deterministic() {
        let controller = SimulatedController::new(SimulatedConfig::default());
        assert_eq!(controller.generate(7), controller.generate(7));
    }
}
