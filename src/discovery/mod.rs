//! Device discovery
//!
//! Probes candidate serial endpoints concurrently and keeps those that
//! identify themselves with an `arm_id` within the probe timeout.
//!
//! Open failures, read errors, timeouts and endpoints that only produce
//! garbage are excluded silently (debug log). Every probe link is closed
//! before the scan returns.

use crate::error::{Error, Result};
use crate::protocol::DeviceAddress;
use crate::telemetry::{current_timestamp_us, decode_object, identity_of};
use crate::transport::{EndpointOpener, LineSource};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// An endpoint that identified itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEndpoint {
    /// Endpoint path, e.g. `/dev/ttyUSB0`
    pub endpoint: String,
    /// Identity read from its first identifying frame
    pub address: DeviceAddress,
    /// µs since the Unix epoch at which the identifying line was read
    pub discovered_at_us: u64,
}

/// Identity → endpoint
pub type Discovery = BTreeMap<DeviceAddress, DiscoveredEndpoint>;

/// Serial ports present on this host
pub fn available_endpoints() -> Result<Vec<String>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Probe one endpoint for an identity.
///
/// Reads lines until one decodes to an object with an `arm_id`, or until
/// `timeout` elapses (`Ok(None)`). The link is dropped, and so closed, on
/// every return path.
pub fn probe<O: EndpointOpener + ?Sized>(
    opener: &O,
    endpoint: &str,
    timeout: Duration,
) -> Result<Option<DiscoveredEndpoint>> {
    let mut link = opener.open(endpoint)?;
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        let Some(line) = link.next_line()? else {
            continue;
        };
        if let Some(address) = decode_object(&line).as_ref().and_then(identity_of) {
            return Ok(Some(DiscoveredEndpoint {
                endpoint: endpoint.to_string(),
                address,
                discovered_at_us: current_timestamp_us(),
            }));
        }
        log::trace!("{}: skipped non-identifying line", endpoint);
    }
    Ok(None)
}

/// Concurrent endpoint scanner
pub struct Scanner<O: EndpointOpener> {
    opener: Arc<O>,
}

impl<O: EndpointOpener> Scanner<O> {
    pub fn new(opener: Arc<O>) -> Self {
        Self { opener }
    }

    pub fn opener(&self) -> &Arc<O> {
        &self.opener
    }

    /// Probe every candidate on its own thread and collect identified arms.
    ///
    /// The map is assembled after every probe finished. If two endpoints
    /// report the same identity, the earlier candidate wins.
    pub fn scan(&self, candidates: &[String], probe_timeout: Duration) -> Discovery {
        log::info!(
            "Scanning {} endpoint(s) for arms ({:?} per probe)",
            candidates.len(),
            probe_timeout
        );

        let results: Vec<Option<DiscoveredEndpoint>> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(candidates.len());
            for (index, endpoint) in candidates.iter().enumerate() {
                let opener = &*self.opener;
                let spawned = thread::Builder::new()
                    .name(format!("probe-{}", index))
                    .spawn_scoped(scope, move || probe(opener, endpoint, probe_timeout));
                match spawned {
                    Ok(handle) => handles.push((index, handle)),
                    Err(e) => log::warn!("{}: could not spawn probe thread: {}", endpoint, e),
                }
            }

            handles
                .into_iter()
                .map(|(index, handle)| {
                    let endpoint = &candidates[index];
                    match handle.join() {
                        Ok(Ok(Some(found))) => Some(found),
                        Ok(Ok(None)) => {
                            log::debug!("{}: no identity within {:?}", endpoint, probe_timeout);
                            None
                        }
                        Ok(Err(e)) => {
                            log::debug!("{}: probe failed: {}", endpoint, e);
                            None
                        }
                        Err(_) => {
                            log::debug!("{}: probe thread panicked", endpoint);
                            None
                        }
                    }
                })
                .collect()
        });

        let mut discovery = Discovery::new();
        // Results are in candidate order, so the earlier candidate wins
        for found in results.into_iter().flatten() {
            if let Some(existing) = discovery.get(&found.address) {
                log::warn!(
                    "{} reported by both {} and {}, keeping {}",
                    found.address,
                    existing.endpoint,
                    found.endpoint,
                    existing.endpoint
                );
                continue;
            }
            log::info!("Found arm {} on {}", found.address, found.endpoint);
            discovery.insert(found.address.clone(), found);
        }

        log::info!("Discovery complete: {} arm(s)", discovery.len());
        discovery
    }
}

/// Parse a list of candidate endpoints from config, rejecting empty entries
pub fn parse_candidates(entries: &[String]) -> Result<Vec<String>> {
    entries
        .iter()
        .map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                Err(Error::InvalidEndpoint("empty discovery candidate".to_string()))
            } else {
                Ok(entry.to_string())
            }
        })
        .collect()
}
