//! CAN Bus Primitives
//!
//! Frame model, the candump-style text record written to the trace log,
//! the receive-side controller abstraction and the capture clock.

mod clock;
mod controller;
mod error;
mod frame;
mod record;

pub use clock::{ClockSource, ManualClock, SessionClock};
pub use controller::{
    initialize_with_retry, BusController, InitPolicy, ScriptedController, SimulatedConfig,
    SimulatedController, DEFAULT_FIFO_DEPTH,
};
pub use error::{ControllerError, FrameError, RecordError};
pub use frame::{Frame, RawFrame, MAX_EXTENDED_ID, MAX_PAYLOAD, MAX_STANDARD_ID};
pub use record::{parse_record, render, render_into, INTERFACE, MAX_RECORD_LEN, SESSION_HEADER};
