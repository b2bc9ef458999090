//! Shared fakes for exercising the harness without a real compiler or
//! device attached.

pub mod recording;

pub use recording::{Event, RecordingBackend, RecordingDevice, RecordingUnit};
