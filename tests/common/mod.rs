//! Shared fixtures for integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use setu::telemetry::{FrameSink, TelemetryFrame};
use setu::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Read timeout of scripted endpoints
pub const READ_TIMEOUT: Duration = Duration::from_millis(20);

/// Sink collecting frames into shared storage and reporting its own release
pub struct CollectingSink {
    frames: Arc<Mutex<Vec<TelemetryFrame>>>,
    released: Arc<AtomicBool>,
}

/// Test-side view of a [`CollectingSink`]
#[derive(Clone, Default)]
pub struct SinkProbe {
    frames: Arc<Mutex<Vec<TelemetryFrame>>>,
    released: Arc<AtomicBool>,
}

impl SinkProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> CollectingSink {
        CollectingSink {
            frames: Arc::clone(&self.frames),
            released: Arc::clone(&self.released),
        }
    }

    pub fn frames(&self) -> Vec<TelemetryFrame> {
        self.frames.lock().clone()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl FrameSink for CollectingSink {
    fn write(&mut self, frame: &TelemetryFrame) -> Result<()> {
        self.frames.lock().push(frame.clone());
        Ok(())
    }
}

impl Drop for CollectingSink {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Telemetry line as an arm emits it
pub fn telemetry_line(arm_id: &str, b: f64) -> String {
    format!(
        r#"{{"arm_id":"{}","b":{},"s":0.2,"e":1.57,"t":0.0,"r":0.0,"g":3.1}}"#,
        arm_id, b
    )
}

/// Candidate list from string literals
pub fn candidates(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
