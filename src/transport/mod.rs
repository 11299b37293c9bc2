//! Transport layer for line-delimited device links
//!
//! Arms emit one JSON object per line over USB serial. Discovery and ingestion
//! only need "give me the next complete line, or tell me the read timed out",
//! so that is the whole seam:
//!
//! - [`LineSource`]: an open endpoint yielding complete lines
//! - [`EndpointOpener`]: opens an endpoint by name (serial path)
//! - [`Console`]: a line endpoint commands can also be written to
//!
//! [`SerialOpener`] is the hardware implementation; [`mock::ScriptedOpener`]
//! replays scripted lines for tests.

use crate::error::Result;

mod framer;
pub mod mock;
mod serial;

pub use framer::LineFramer;
pub use serial::{SerialLink, SerialOpener, SerialTransport};

/// Default baud rate of the arm's USB serial console
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// An open endpoint producing newline-delimited records
pub trait LineSource: Send {
    /// Next complete line without its terminator.
    ///
    /// Blocks at most one read timeout. `Ok(None)` means the read timed out
    /// before a full line arrived; `Err` means the endpoint is unusable.
    fn next_line(&mut self) -> Result<Option<Vec<u8>>>;
}

/// A line endpoint that also takes writes: a device's command console
pub trait Console: LineSource {
    /// Drop buffered input, including partially received lines
    fn discard_input(&mut self) -> Result<()>;

    /// Write one line; the terminator is appended here
    fn write_line(&mut self, line: &[u8]) -> Result<()>;
}

/// Opens endpoints by name. Dropping the returned link closes the endpoint.
pub trait EndpointOpener: Send + Sync {
    type Link: LineSource + 'static;

    fn open(&self, endpoint: &str) -> Result<Self::Link>;
}

impl<T: LineSource + ?Sized> LineSource for Box<T> {
    fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        (**self).next_line()
    }
}
