//! Scripted line endpoints for testing
//!
//! Stands in for serial hardware in discovery and ingestion tests: each endpoint
//! replays a script of lines, idle reads and failures, and records how often it
//! was opened and closed so tests can observe endpoint release.

use super::{Console, EndpointOpener, LineSource};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// One scripted read result
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// A complete line arrives
    Line(Vec<u8>),
    /// The read times out with nothing
    Idle,
    /// The endpoint fails
    Fail(String),
}

/// Sequence of reads an endpoint will produce
#[derive(Debug, Clone, Default)]
pub struct LinkScript {
    steps: Vec<ScriptStep>,
    repeat: bool,
}

impl LinkScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script made of the given lines
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut script = Self::new();
        for line in lines {
            script = script.line(line);
        }
        script
    }

    pub fn line(mut self, line: impl AsRef<[u8]>) -> Self {
        self.steps.push(ScriptStep::Line(line.as_ref().to_vec()));
        self
    }

    pub fn idle(mut self, reads: usize) -> Self {
        self.steps.extend(std::iter::repeat(ScriptStep::Idle).take(reads));
        self
    }

    pub fn fail(mut self, message: &str) -> Self {
        self.steps.push(ScriptStep::Fail(message.to_string()));
        self
    }

    /// Replay the script forever instead of going idle once exhausted
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }
}

/// Open/close bookkeeping for one scripted endpoint
#[derive(Debug, Default)]
pub struct LinkState {
    opened: AtomicUsize,
    closed: AtomicUsize,
    lines_served: AtomicUsize,
    written: Mutex<Vec<Vec<u8>>>,
}

impl LinkState {
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// At least one link to this endpoint is still alive
    pub fn is_open(&self) -> bool {
        self.open_count() > self.close_count()
    }

    pub fn lines_served(&self) -> usize {
        self.lines_served.load(Ordering::SeqCst)
    }

    /// Lines written to this endpoint, without terminators
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().clone()
    }
}

/// Link replaying a [`LinkScript`]
pub struct ScriptedLink {
    pending: VecDeque<ScriptStep>,
    script: LinkScript,
    read_timeout: Duration,
    state: Arc<LinkState>,
}

impl LineSource for ScriptedLink {
    fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        if self.pending.is_empty() && self.script.repeat && !self.script.steps.is_empty() {
            self.pending.extend(self.script.steps.iter().cloned());
        }

        match self.pending.pop_front() {
            Some(ScriptStep::Line(line)) => {
                self.state.lines_served.fetch_add(1, Ordering::SeqCst);
                Ok(Some(line))
            }
            Some(ScriptStep::Fail(message)) => Err(Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                message,
            ))),
            Some(ScriptStep::Idle) | None => {
                // A real port blocks for the read timeout before giving up
                thread::sleep(self.read_timeout);
                Ok(None)
            }
        }
    }
}

// The script models what arrives after each write, so there is no stale
// input to discard
impl Console for ScriptedLink {
    fn discard_input(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.state.written.lock().push(line.to_vec());
        Ok(())
    }
}

impl Drop for ScriptedLink {
    fn drop(&mut self) {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Opener serving scripted endpoints by name
pub struct ScriptedOpener {
    scripts: Mutex<HashMap<String, LinkScript>>,
    states: Mutex<HashMap<String, Arc<LinkState>>>,
    read_timeout: Duration,
}

impl ScriptedOpener {
    pub fn new(read_timeout: Duration) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            states: Mutex::new(HashMap::new()),
            read_timeout,
        }
    }

    /// Register (or replace) the script served by `endpoint`
    pub fn endpoint(self, endpoint: &str, script: LinkScript) -> Self {
        self.scripts.lock().insert(endpoint.to_string(), script);
        self
    }

    /// Bookkeeping for `endpoint`, created on first use
    pub fn state(&self, endpoint: &str) -> Arc<LinkState> {
        Arc::clone(self.states.lock().entry(endpoint.to_string()).or_default())
    }
}

impl EndpointOpener for ScriptedOpener {
    type Link = ScriptedLink;

    fn open(&self, endpoint: &str) -> Result<ScriptedLink> {
        let Some(script) = self.scripts.lock().get(endpoint).cloned() else {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such endpoint: {}", endpoint),
            )));
        };

        let state = self.state(endpoint);
        state.opened.fetch_add(1, Ordering::SeqCst);

        Ok(ScriptedLink {
            pending: script.steps.iter().cloned().collect(),
            script,
            read_timeout: self.read_timeout,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_then_idles() {
        let opener = ScriptedOpener::new(Duration::from_millis(1))
            .endpoint("/dev/ttyUSB0", LinkScript::lines(["a", "b"]).fail("unplugged"));

        let mut link = opener.open("/dev/ttyUSB0").unwrap();
        assert_eq!(link.next_line().unwrap(), Some(b"a".to_vec()));
        assert_eq!(link.next_line().unwrap(), Some(b"b".to_vec()));
        assert!(link.next_line().is_err());
        assert_eq!(link.next_line().unwrap(), None);
    }

    #[test]
    fn test_tracks_open_and_close() {
        let opener = ScriptedOpener::new(Duration::from_millis(1))
            .endpoint("/dev/ttyUSB0", LinkScript::new());
        let state = opener.state("/dev/ttyUSB0");

        let link = opener.open("/dev/ttyUSB0").unwrap();
        assert!(state.is_open());
        drop(link);
        assert!(!state.is_open());
        assert_eq!(state.open_count(), 1);
        assert_eq!(state.close_count(), 1);

        assert!(opener.open("/dev/ttyUSB9").is_err());
    }

    #[test]
    fn test_repeating_script() {
        let opener = ScriptedOpener::new(Duration::from_millis(1))
            .endpoint("p", LinkScript::lines(["x"]).repeating());
        let mut link = opener.open("p").unwrap();
        for _ in 0..3 {
            assert_eq!(link.next_line().unwrap(), Some(b"x".to_vec()));
        }
    }

    #[test]
    fn test_records_written_lines() {
        let opener = ScriptedOpener::new(Duration::from_millis(1)).endpoint("p", LinkScript::new());
        let mut link = opener.open("p").unwrap();
        link.write_line(br#"{"T":306}"#).unwrap();
        assert_eq!(opener.state("p").written(), vec![br#"{"T":306}"#.to_vec()]);
    }
}
