//! Frame sinks: where accepted telemetry goes
//!
//! Each reader owns exactly one sink and hands it frames one at a time, in
//! arrival order. A sink error ends that reader.

use super::TelemetryFrame;
use crate::error::{Error, Result};
use crate::protocol::DeviceAddress;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Append target for one arm's frames
pub trait FrameSink: Send {
    /// Accept one frame
    fn write(&mut self, frame: &TelemetryFrame) -> Result<()>;

    /// Push buffered frames out
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write(&mut self, frame: &TelemetryFrame) -> Result<()> {
        (**self).write(frame)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Suffixes tried before giving up on a session file name
const MAX_NAME_ATTEMPTS: usize = 100;

/// JSON-lines file per arm, flushed after every frame.
///
/// Files are named `<arm_id>_<unix_secs>.jsonl`, so restarts never append to
/// an earlier session. An existing file is never reused: identities sharing a
/// file stem in the same second get a `_<n>` suffix.
pub struct JsonlSink {
    writer: BufWriter<File>,
    path: PathBuf,
    frames_written: u64,
}

impl JsonlSink {
    /// Create the session file for `arm_id` inside `dir` (created if missing)
    pub fn create(dir: impl AsRef<Path>, arm_id: &DeviceAddress) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let stem = format!("{}_{}", arm_id.file_stem(), secs);

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = match attempt {
                0 => format!("{}.jsonl", stem),
                n => format!("{}_{}.jsonl", stem, n),
            };
            let path = dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok(Self::from_file(file, path)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::Sink(format!(
            "no free file name for {} in {}",
            stem,
            dir.display()
        )))
    }

    /// Create (truncate) a sink writing to exactly `path`
    pub fn create_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self::from_file(file, path))
    }

    fn from_file(file: File, path: PathBuf) -> Self {
        log::info!("Recording telemetry to {}", path.display());
        Self {
            writer: BufWriter::new(file),
            path,
            frames_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl FrameSink for JsonlSink {
    fn write(&mut self, frame: &TelemetryFrame) -> Result<()> {
        serde_json::to_writer(&mut self.writer, frame)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.frames_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        log::debug!(
            "Closed {} ({} frames)",
            self.path.display(),
            self.frames_written
        );
    }
}

/// Forwards frames into a bounded channel.
///
/// A full channel is waited on for at most `send_timeout`; after that the
/// frame is dropped with a warning so a stalled consumer cannot wedge the
/// reader. A disconnected receiver is a sink error.
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<TelemetryFrame>,
    send_timeout: Duration,
}

impl ChannelSink {
    pub fn new(tx: Sender<TelemetryFrame>, send_timeout: Duration) -> Self {
        Self { tx, send_timeout }
    }

    /// Sink plus the receiving end of a fresh channel holding `capacity` frames
    pub fn bounded(capacity: usize, send_timeout: Duration) -> (Self, Receiver<TelemetryFrame>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self::new(tx, send_timeout), rx)
    }
}

impl FrameSink for ChannelSink {
    fn write(&mut self, frame: &TelemetryFrame) -> Result<()> {
        match self.tx.send_timeout(frame.clone(), self.send_timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(frame)) => {
                log::warn!(
                    "Telemetry consumer stalled, dropping frame from {}",
                    frame.arm_id
                );
                Ok(())
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                Err(Error::Sink("telemetry receiver disconnected".to_string()))
            }
        }
    }
}

/// Logs every frame at info level under the `telemetry` target
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl FrameSink for LogSink {
    fn write(&mut self, frame: &TelemetryFrame) -> Result<()> {
        log::info!(target: "telemetry", "{}", frame.to_json_line()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use tempfile::tempdir;

    fn frame(arm: &str, b: f64) -> TelemetryFrame {
        let line = format!(r#"{{"arm_id":"{}","b":{}}}"#, arm, b);
        TelemetryFrame::decode(line.as_bytes(), 1).unwrap()
    }

    #[test]
    fn test_jsonl_one_line_per_frame() {
        let dir = tempdir().unwrap();
        let mut sink = JsonlSink::create(dir.path(), &DeviceAddress::from("AA:BB")).unwrap();
        sink.write(&frame("AA:BB", 0.1)).unwrap();
        sink.write(&frame("AA:BB", 0.2)).unwrap();

        let name = sink.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("AA_BB_"));
        assert!(name.ends_with(".jsonl"));

        // Visible without closing the sink
        let file = File::open(sink.path()).unwrap();
        let lines: Vec<String> = BufReader::new(file).lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["b"], 0.1);
        assert_eq!(first["host_time_us"], 1);
        assert_eq!(sink.frames_written(), 2);
    }

    #[test]
    fn test_jsonl_colliding_stems_get_separate_files() {
        let dir = tempdir().unwrap();
        let mut colon = JsonlSink::create(dir.path(), &DeviceAddress::from("AA:BB")).unwrap();
        let mut underscore = JsonlSink::create(dir.path(), &DeviceAddress::from("AA_BB")).unwrap();
        assert_ne!(colon.path(), underscore.path());

        colon.write(&frame("AA:BB", 0.1)).unwrap();
        underscore.write(&frame("AA_BB", 0.2)).unwrap();

        for (sink, arm) in [(&colon, "AA:BB"), (&underscore, "AA_BB")] {
            let file = File::open(sink.path()).unwrap();
            let lines: Vec<String> = BufReader::new(file).lines().map(|l| l.unwrap()).collect();
            assert_eq!(lines.len(), 1, "{}", sink.path().display());
            let record: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
            assert_eq!(record["arm_id"], arm);
        }
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (mut sink, rx) = ChannelSink::bounded(1, Duration::from_millis(5));
        sink.write(&frame("A", 1.0)).unwrap();
        sink.write(&frame("A", 2.0)).unwrap();

        assert_eq!(rx.try_recv().unwrap().field("b"), Some(1.0));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_errors_when_disconnected() {
        let (mut sink, rx) = ChannelSink::bounded(4, Duration::from_millis(5));
        drop(rx);
        assert!(matches!(sink.write(&frame("A", 1.0)), Err(Error::Sink(_))));
    }
}
