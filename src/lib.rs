//! Setu - leader/follower relay and telemetry ingestion for robotic arms
//!
//! Arms speak a flat JSON command protocol over HTTP or USB serial and stream
//! one JSON telemetry object per line. This library provides:
//!
//! - [`link`]: command channel (one command, one reply, bounded by a timeout)
//! - [`leader`]: ESP-NOW leader/follower coordination and pose relay
//! - [`discovery`]: concurrent probing of serial endpoints for arm identities
//! - [`telemetry`]: one reader thread per arm feeding per-arm sinks
//! - [`device`]: typed single-arm commands
//!
//! [`transport::mock`] and [`link::mock`] replace hardware in tests.

pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod leader;
pub mod link;
pub mod protocol;
pub mod telemetry;
pub mod transport;

// Re-export commonly used types
pub use config::SetuConfig;
pub use device::ArmDevice;
pub use discovery::{DiscoveredEndpoint, Discovery, Scanner};
pub use error::{Error, Result};
pub use leader::{Coordinator, CoordinatorState, FollowerRegistry, LeaderMode, RelayTarget};
pub use link::{CommandChannel, Endpoint};
pub use protocol::{Command, CommandResponse, DeviceAddress, JointPose, Mode};
pub use telemetry::{FrameSink, IngestSupervisor, StopSignal, TelemetryFrame};
