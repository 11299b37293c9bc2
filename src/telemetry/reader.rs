//! Per-arm reader loop

use super::{current_timestamp_us, FrameSink, StopSignal, TelemetryFrame};
use crate::error::Result;
use crate::protocol::DeviceAddress;
use crate::transport::LineSource;

/// Counters for one reader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Frames handed to the sink
    pub forwarded: u64,
    /// Lines that did not decode into a frame
    pub noise: u64,
    /// Frames reporting a different identity
    pub foreign: u64,
}

/// Pump frames for `arm_id` from `link` into `sink` until `stop` is raised.
///
/// The stop signal is checked before every read, and each read blocks at most
/// one read timeout, so a raised signal is honored within one timeout. Returns
/// the first link or sink error.
pub fn run_reader<L, S>(
    arm_id: &DeviceAddress,
    link: &mut L,
    sink: &mut S,
    stop: &StopSignal,
    stats: &mut ReaderStats,
) -> Result<()>
where
    L: LineSource + ?Sized,
    S: FrameSink + ?Sized,
{
    while !stop.is_raised() {
        let Some(line) = link.next_line()? else {
            continue;
        };

        let Some(frame) = TelemetryFrame::decode(&line, current_timestamp_us()) else {
            stats.noise += 1;
            log::trace!("[{}] dropped {} byte noise line", arm_id, line.len());
            continue;
        };

        if frame.arm_id != *arm_id {
            stats.foreign += 1;
            log::debug!("[{}] dropped frame reported by {}", arm_id, frame.arm_id);
            continue;
        }

        sink.write(&frame)?;
        stats.forwarded += 1;

        if stats.forwarded % 1000 == 0 {
            log::debug!(
                "[{}] {} frames, {} noise, {} foreign",
                arm_id,
                stats.forwarded,
                stats.noise,
                stats.foreign
            );
        }
    }

    sink.flush()
}
