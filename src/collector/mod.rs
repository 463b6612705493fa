//! Input collection from Linux event devices.
//!
//! Raw `input_event` records are read from `/dev/input/event*` nodes,
//! decoded, classified and folded into the counters of a [`Tracker`].

pub mod event;
pub mod stream;
pub mod tracker;

// Re-export commonly used types
pub use event::{
    Axis, Classified, DecodeError, Event, EventCode, EventType, EventValue, EVENT_SIZE,
};
pub use stream::{Frame, FrameReader};
pub use tracker::{CollectorError, ExitReason, ReaderExit, Tracker, TrackerSnapshot};
