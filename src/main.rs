//! Setu - leader/follower relay and multi-arm telemetry daemon
//!
//! 1. Optionally configures the local arm as an ESP-NOW leader, registers its
//!    followers and starts relaying
//! 2. Discovers arms streaming telemetry over USB serial
//! 3. Records each arm's frames (JSONL file per arm, or the log) until Ctrl-C
//!    or the configured duration elapses

use setu::config::{LeaderConfig, SetuConfig};
use setu::discovery::{self, Scanner};
use setu::error::{Error, Result};
use setu::leader::Coordinator;
use setu::link::{self, CommandChannel, Endpoint};
use setu::telemetry::{
    FrameSink, IngestSupervisor, JsonlSink, LogSink, ReaderOutcome, StopSignal,
};
use setu::transport::SerialOpener;
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_CONFIG_PATH: &str = "/etc/setu.toml";

/// Main loop poll interval
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Parse config path from command line arguments.
///
/// Supports:
/// - `setu <path>` (positional)
/// - `setu --config <path>` (flag-based)
/// - `setu -c <path>` (short flag)
///
/// Defaults to `/etc/setu.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for pair in args.windows(2).skip(1) {
        if pair[0] == "--config" || pair[0] == "-c" {
            return pair[1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    DEFAULT_CONFIG_PATH.to_string()
}

fn load_config(path: &str) -> Result<SetuConfig> {
    // A missing default file means "all defaults"; an explicit path must exist
    if path == DEFAULT_CONFIG_PATH && !Path::new(path).exists() {
        return Ok(SetuConfig::default());
    }
    SetuConfig::load(Path::new(path))
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = load_config(&config_path)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();

    log::info!("Setu v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_path);

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        handler_stop.raise();
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let command_endpoint = config.link.endpoint()?;

    // Leader setup runs synchronously before any telemetry is read
    let mut coordinator = match (&config.leader, &command_endpoint) {
        (Some(leader), Some(endpoint)) => {
            let channel = link::connect(endpoint, config.link.timeout(), config.link.baud_rate)?;
            Some(setup_leader(channel, leader)?)
        }
        _ => None,
    };

    let candidates = discovery_candidates(&config, command_endpoint.as_ref())?;
    let opener = Arc::new(SerialOpener::new(
        config.discovery.baud_rate,
        config.discovery.read_timeout(),
    ));
    let found = Scanner::new(Arc::clone(&opener))
        .scan(&candidates, config.discovery.probe_timeout());
    if found.is_empty() {
        log::warn!("No arms found on {} endpoint(s)", candidates.len());
    }

    let output_dir = config.ingest.output_dir.clone();
    let mut supervisor = IngestSupervisor::start(
        &found,
        opener,
        |arm_id| -> Result<Box<dyn FrameSink>> {
            match &output_dir {
                Some(dir) => Ok(Box::new(JsonlSink::create(dir, arm_id)?)),
                None => Ok(Box::new(LogSink)),
            }
        },
        stop.clone(),
    )?;

    match config.ingest.duration() {
        Some(duration) => log::info!("Setu running for {:?}. Press Ctrl-C to stop.", duration),
        None => log::info!("Setu running. Press Ctrl-C to stop."),
    }

    let started = Instant::now();
    while !stop.is_raised() {
        if config
            .ingest
            .duration()
            .is_some_and(|limit| started.elapsed() >= limit)
        {
            log::info!("Configured duration elapsed");
            break;
        }
        // Nothing left to do once every reader has ended and no relay is active
        if coordinator.is_none() && supervisor.active_readers() == 0 {
            log::warn!("All telemetry readers have ended");
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    log::info!("Shutting down...");
    for summary in supervisor.shutdown() {
        match summary.outcome {
            ReaderOutcome::Stopped => log::info!(
                "[{}] {} frames ({} noise, {} foreign)",
                summary.arm_id,
                summary.stats.forwarded,
                summary.stats.noise,
                summary.stats.foreign
            ),
            ReaderOutcome::Failed(e) => log::warn!(
                "[{}] ended early after {} frames: {}",
                summary.arm_id,
                summary.stats.forwarded,
                e
            ),
            ReaderOutcome::Panicked => log::error!("[{}] reader panicked", summary.arm_id),
        }
    }

    if let Some(coordinator) = coordinator.as_mut() {
        if coordinator.registry().is_broadcasting() {
            if let Err(e) = coordinator.stop_broadcasting() {
                log::error!("Failed to stop broadcasting: {}", e);
            }
        }
    }

    log::info!("Setu stopped");
    Ok(())
}

/// Configure the local arm as leader, register followers, optionally start relaying
fn setup_leader<C: CommandChannel>(channel: C, leader: &LeaderConfig) -> Result<Coordinator<C>> {
    let mut coordinator = Coordinator::new(channel);

    match coordinator.query_mode() {
        Ok(status) => log::info!("Current ESP-NOW status: {}", status),
        Err(e) => log::debug!("ESP-NOW status query failed: {}", e),
    }

    let response = coordinator.configure_as_leader(leader.mode()?)?;
    if !response.is_ok() {
        return Err(Error::Other(format!(
            "leader configuration rejected: {}",
            response
        )));
    }

    for follower in leader.follower_addresses() {
        let response = coordinator.add_follower(&follower)?;
        if !response.is_ok() {
            log::warn!("Follower {} not registered", follower);
        }
    }

    if leader.broadcast {
        if coordinator.registry().followers().is_empty() {
            log::warn!("No followers registered, not broadcasting");
        } else {
            coordinator.start_broadcasting()?;
        }
    }

    Ok(coordinator)
}

/// Endpoints to probe: configured list, or every serial port except the command port
fn discovery_candidates(config: &SetuConfig, command: Option<&Endpoint>) -> Result<Vec<String>> {
    let mut candidates = if config.discovery.candidates.is_empty() {
        discovery::available_endpoints()?
    } else {
        discovery::parse_candidates(&config.discovery.candidates)?
    };

    if let Some(Endpoint::Serial { path }) = command {
        candidates.retain(|candidate| candidate != path);
    }
    log::debug!("Discovery candidates: {:?}", candidates);
    Ok(candidates)
}
