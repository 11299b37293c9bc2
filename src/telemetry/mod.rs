//! Multi-arm telemetry ingestion
//!
//! Arms stream one JSON object per line over USB serial:
//!
//! ```text
//! {"arm_id":"follower-1","b":0.01,"s":-0.2,"e":1.57,"t":0.0,"r":0.0,"g":3.1,"x":235.1,"y":0.0,"z":234.5}
//! ```
//!
//! [`IngestSupervisor`] runs one reader thread per discovered arm. A reader
//! decodes each line into a [`TelemetryFrame`], drops noise and frames that
//! report a different identity, stamps the rest with host time and hands them
//! to its own [`FrameSink`].

mod frame;
mod reader;
mod sink;
mod supervisor;

pub use frame::{current_timestamp_us, decode_object, identity_of, TelemetryFrame};
pub use reader::{run_reader, ReaderStats};
pub use sink::{ChannelSink, FrameSink, JsonlSink, LogSink};
pub use supervisor::{IngestSupervisor, ReaderHandle, ReaderOutcome, ReaderSummary, StopSignal};
