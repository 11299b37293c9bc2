//! Ingestion supervisor: one reader thread per discovered arm

use super::reader::{run_reader, ReaderStats};
use super::FrameSink;
use crate::discovery::Discovery;
use crate::error::{Error, Result};
use crate::protocol::DeviceAddress;
use crate::transport::EndpointOpener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Shared cooperative cancellation flag.
///
/// Readers only observe it; raising is idempotent and cannot be undone.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// How a reader ended
#[derive(Debug)]
pub enum ReaderOutcome {
    /// Stop signal observed
    Stopped,
    /// Endpoint could not be opened, or the link or sink failed
    Failed(Error),
    /// Reader thread panicked; link and sink were dropped during unwinding
    Panicked,
}

/// Final report of one reader
#[derive(Debug)]
pub struct ReaderSummary {
    pub arm_id: DeviceAddress,
    pub endpoint: String,
    pub stats: ReaderStats,
    pub outcome: ReaderOutcome,
}

/// A running reader thread
pub struct ReaderHandle {
    arm_id: DeviceAddress,
    endpoint: String,
    handle: JoinHandle<(ReaderStats, Result<()>)>,
}

impl ReaderHandle {
    pub fn arm_id(&self) -> &DeviceAddress {
        &self.arm_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    fn join(self) -> ReaderSummary {
        let (stats, outcome) = match self.handle.join() {
            Ok((stats, Ok(()))) => (stats, ReaderOutcome::Stopped),
            Ok((stats, Err(e))) => (stats, ReaderOutcome::Failed(e)),
            Err(_) => (ReaderStats::default(), ReaderOutcome::Panicked),
        };
        ReaderSummary {
            arm_id: self.arm_id,
            endpoint: self.endpoint,
            stats,
            outcome,
        }
    }
}

/// Runs one reader per discovered arm until stopped.
///
/// Readers are independent: one failing endpoint or sink ends only its own
/// reader. Dropping the supervisor raises the stop signal and joins every
/// reader.
pub struct IngestSupervisor {
    readers: Vec<ReaderHandle>,
    stop: StopSignal,
}

impl IngestSupervisor {
    /// Start a reader for every entry of `discovery`.
    ///
    /// `make_sink` is called once per arm on the calling thread; an arm whose
    /// sink cannot be created is skipped with an error log. Each reader opens
    /// its endpoint on its own thread and owns link and sink exclusively.
    pub fn start<O, F, S>(
        discovery: &Discovery,
        opener: Arc<O>,
        mut make_sink: F,
        stop: StopSignal,
    ) -> Result<Self>
    where
        O: EndpointOpener + 'static,
        F: FnMut(&DeviceAddress) -> Result<S>,
        S: FrameSink + 'static,
    {
        let mut supervisor = Self {
            readers: Vec::with_capacity(discovery.len()),
            stop,
        };

        for (arm_id, found) in discovery {
            let sink = match make_sink(arm_id) {
                Ok(sink) => sink,
                Err(e) => {
                    log::error!("[{}] no sink, not ingesting: {}", arm_id, e);
                    continue;
                }
            };

            let opener = Arc::clone(&opener);
            let stop = supervisor.stop.clone();
            let thread_arm = arm_id.clone();
            let endpoint = found.endpoint.clone();

            // On spawn failure the partially started supervisor is dropped,
            // which stops and joins the readers already running.
            let handle = thread::Builder::new()
                .name(format!("reader-{}", arm_id.file_stem()))
                .spawn(move || Self::reader_main(&*opener, &endpoint, &thread_arm, sink, &stop))
                .map_err(|e| Error::Other(format!("Failed to spawn reader thread: {}", e)))?;

            log::info!("[{}] reading telemetry from {}", arm_id, found.endpoint);
            supervisor.readers.push(ReaderHandle {
                arm_id: arm_id.clone(),
                endpoint: found.endpoint.clone(),
                handle,
            });
        }

        Ok(supervisor)
    }

    fn reader_main<O: EndpointOpener, S: FrameSink>(
        opener: &O,
        endpoint: &str,
        arm_id: &DeviceAddress,
        mut sink: S,
        stop: &StopSignal,
    ) -> (ReaderStats, Result<()>) {
        let mut stats = ReaderStats::default();

        let mut link = match opener.open(endpoint) {
            Ok(link) => link,
            Err(e) => {
                log::error!("[{}] failed to open {}: {}", arm_id, endpoint, e);
                return (stats, Err(e));
            }
        };

        let result = run_reader(arm_id, &mut link, &mut sink, stop, &mut stats);
        match &result {
            Ok(()) => log::info!(
                "[{}] reader stopped after {} frames",
                arm_id,
                stats.forwarded
            ),
            Err(e) => log::error!(
                "[{}] reader terminated after {} frames: {}",
                arm_id,
                stats.forwarded,
                e
            ),
        }
        (stats, result)
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn readers(&self) -> &[ReaderHandle] {
        &self.readers
    }

    /// Readers whose thread is still running
    pub fn active_readers(&self) -> usize {
        self.readers.iter().filter(|r| !r.is_finished()).count()
    }

    /// Join every reader without raising the stop signal
    pub fn wait(&mut self) -> Vec<ReaderSummary> {
        let summaries: Vec<ReaderSummary> =
            self.readers.drain(..).map(ReaderHandle::join).collect();

        for summary in &summaries {
            if let ReaderOutcome::Panicked = summary.outcome {
                log::error!("[{}] reader thread panicked", summary.arm_id);
            }
        }
        summaries
    }

    /// Raise the stop signal and join every reader
    pub fn shutdown(&mut self) -> Vec<ReaderSummary> {
        if self.readers.is_empty() {
            return Vec::new();
        }
        log::info!("Stopping {} telemetry reader(s)...", self.readers.len());
        self.stop.raise();
        let summaries = self.wait();
        log::info!("Telemetry ingestion stopped");
        summaries
    }
}

impl Drop for IngestSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
