//! Leader/follower coordinator
//!
//! Drives one physical device through the ESP-NOW role handshakes and keeps a
//! [`FollowerRegistry`] in step with it. Every operation follows the same rule:
//!
//! 1. Check the registry precondition (no I/O if it would be violated)
//! 2. Send exactly the command(s) the protocol requires
//! 3. Advance local state only if the device answered `{"status":"ok"}`
//!
//! Transport errors propagate with local state untouched. Any other status is
//! returned to the caller as the raw [`CommandResponse`] for diagnosis.
//!
//! # State Machine
//!
//! ```text
//!                  configure_as_leader
//!   Unconfigured ─────────────────────▶ Leader(sub, broadcasting)
//!        │                                  ▲        │
//!        │ configure_as_follower            │        │ configure_as_follower
//!        ▼                                  │        │ (no followers registered)
//!     Follower ◀────────────────────────────┼────────┘
//!        │          configure_as_leader     │
//!        └──────────────────────────────────┘
//! ```
//!
//! There is no terminal state; re-sending a configuring command in the state
//! it configures leaves the model unchanged.
//!
//! Not thread-safe by itself: concurrent callers must serialize access, e.g.
//! with `parking_lot::Mutex<Coordinator<_>>`.

use super::registry::FollowerRegistry;
use crate::error::{Error, Result};
use crate::link::CommandChannel;
use crate::protocol::{Command, CommandResponse, DeviceAddress, JointPose, Mode};
use std::fmt;
use std::str::FromStr;

/// Leader sub-mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderMode {
    /// Relay to every registered follower
    Broadcast,
    /// Relay to exactly one follower
    Single,
}

impl LeaderMode {
    fn mode(self) -> Mode {
        match self {
            LeaderMode::Broadcast => Mode::BroadcastLeader,
            LeaderMode::Single => Mode::SingleLeader,
        }
    }
}

impl FromStr for LeaderMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "broadcast" => Ok(LeaderMode::Broadcast),
            "single" => Ok(LeaderMode::Single),
            other => Err(Error::Config(format!(
                "invalid leader mode '{}', use 'broadcast' or 'single'",
                other
            ))),
        }
    }
}

/// Observable role of the coordinated device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Unconfigured,
    Leader {
        sub_mode: LeaderMode,
        broadcasting: bool,
    },
    Follower,
}

/// Where a relayed pose goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayTarget {
    /// Every registered follower, in one command
    All,
    /// One registered follower
    One(DeviceAddress),
}

impl RelayTarget {
    /// `"all"` or the broadcast MAC select every follower; anything else is an address
    pub fn parse(target: &str) -> Self {
        let address = DeviceAddress::from(target);
        if target.eq_ignore_ascii_case("all") || address.is_broadcast() {
            RelayTarget::All
        } else {
            RelayTarget::One(address)
        }
    }
}

impl From<&str> for RelayTarget {
    fn from(target: &str) -> Self {
        Self::parse(target)
    }
}

impl From<DeviceAddress> for RelayTarget {
    fn from(address: DeviceAddress) -> Self {
        if address.is_broadcast() {
            RelayTarget::All
        } else {
            RelayTarget::One(address)
        }
    }
}

impl fmt::Display for RelayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayTarget::All => f.write_str("all"),
            RelayTarget::One(address) => write!(f, "{}", address),
        }
    }
}

/// Coordinates the leader/follower role of one device
pub struct Coordinator<C: CommandChannel> {
    channel: C,
    registry: FollowerRegistry,
    /// Peer learned during the follower handshake
    leader: Option<DeviceAddress>,
}

impl<C: CommandChannel> Coordinator<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            registry: FollowerRegistry::new(),
            leader: None,
        }
    }

    pub fn registry(&self) -> &FollowerRegistry {
        &self.registry
    }

    /// Leader this device follows, once configured as a follower
    pub fn leader(&self) -> Option<&DeviceAddress> {
        self.leader.as_ref()
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    pub fn state(&self) -> CoordinatorState {
        match self.registry.mode() {
            Mode::Disabled => CoordinatorState::Unconfigured,
            Mode::BroadcastLeader => CoordinatorState::Leader {
                sub_mode: LeaderMode::Broadcast,
                broadcasting: self.registry.is_broadcasting(),
            },
            Mode::SingleLeader => CoordinatorState::Leader {
                sub_mode: LeaderMode::Single,
                broadcasting: self.registry.is_broadcasting(),
            },
            Mode::Follower => CoordinatorState::Follower,
        }
    }

    /// Configure the device as a leader in `sub_mode`
    pub fn configure_as_leader(&mut self, sub_mode: LeaderMode) -> Result<CommandResponse> {
        let mode = sub_mode.mode();
        self.registry.check_mode(mode)?;

        let response = self.send(&Command::EspNowConfig { mode })?;
        if response.is_ok() {
            self.registry.set_mode(mode)?;
            self.leader = None;
            log::info!("Configured as {:?} leader", sub_mode);
        } else {
            log::warn!("Leader configuration rejected: {}", response);
        }
        Ok(response)
    }

    /// Configure the device as a follower of `leader`.
    ///
    /// Two steps in strict order: register the leader's address (`T:303`, the
    /// same opcode a leader uses for followers), then switch to follower mode
    /// (`T:301`). If the first step fails or is not confirmed, the second is
    /// never sent and the first step's outcome is returned.
    pub fn configure_as_follower(&mut self, leader: &DeviceAddress) -> Result<CommandResponse> {
        self.registry.check_mode(Mode::Follower)?;

        let peer = self.send(&Command::AddPeer {
            mac: leader.clone(),
        })?;
        if !peer.is_ok() {
            log::warn!("Leader address {} rejected: {}", leader, peer);
            return Ok(peer);
        }

        let response = self.send(&Command::EspNowConfig {
            mode: Mode::Follower,
        })?;
        if response.is_ok() {
            self.registry.set_mode(Mode::Follower)?;
            self.leader = Some(leader.clone());
            log::info!("Configured as follower of {}", leader);
        } else {
            log::warn!("Follower configuration rejected: {}", response);
        }
        Ok(response)
    }

    /// Register a follower on the leader device
    pub fn add_follower(&mut self, address: &DeviceAddress) -> Result<CommandResponse> {
        self.registry.check_can_add()?;

        let response = self.send(&Command::AddPeer {
            mac: address.clone(),
        })?;
        if response.is_ok() {
            self.registry.add_follower(address.clone())?;
            log::info!(
                "Follower {} added ({} registered)",
                address,
                self.registry.followers().len()
            );
        } else {
            log::warn!("Adding follower {} rejected: {}", address, response);
        }
        Ok(response)
    }

    /// Remove a follower from the leader device
    pub fn remove_follower(&mut self, address: &DeviceAddress) -> Result<CommandResponse> {
        let response = self.send(&Command::RemovePeer {
            mac: address.clone(),
        })?;
        if response.is_ok() {
            self.registry.remove_follower(address);
            log::info!("Follower {} removed", address);
        } else {
            log::warn!("Removing follower {} rejected: {}", address, response);
        }
        Ok(response)
    }

    /// Start relaying the leader's movements
    pub fn start_broadcasting(&mut self) -> Result<CommandResponse> {
        self.registry.check_can_broadcast()?;
        let response = self.send(&Command::BroadcastFollower {
            enabled: true,
            mac: DeviceAddress::broadcast(),
        })?;
        if response.is_ok() {
            self.registry.start_broadcasting()?;
            log::info!("Broadcasting started");
        } else {
            log::warn!("Broadcast start rejected: {}", response);
        }
        Ok(response)
    }

    /// Stop relaying the leader's movements
    pub fn stop_broadcasting(&mut self) -> Result<CommandResponse> {
        let response = self.send(&Command::BroadcastFollower {
            enabled: false,
            mac: DeviceAddress::broadcast(),
        })?;
        if response.is_ok() {
            self.registry.stop_broadcasting();
            log::info!("Broadcasting stopped");
        } else {
            log::warn!("Broadcast stop rejected: {}", response);
        }
        Ok(response)
    }

    /// Relay a pose to every follower or to one registered follower.
    ///
    /// Joints missing from `pose` are sent as zero. A single target must be a
    /// registered follower; otherwise nothing is sent.
    pub fn relay_pose(
        &mut self,
        target: impl Into<RelayTarget>,
        pose: &JointPose,
    ) -> Result<CommandResponse> {
        let command = match target.into() {
            RelayTarget::All => Command::ManyControl { pose: *pose },
            RelayTarget::One(address) => {
                if !self.registry.contains(&address) {
                    return Err(Error::UnknownFollower(address));
                }
                Command::SingleControl {
                    mac: address,
                    pose: *pose,
                }
            }
        };
        self.send(&command)
    }

    /// Ask the device for its ESP-NOW role (`T:301`, mode -1).
    ///
    /// The reply shape is undocumented; it is returned as-is and never
    /// applied to the registry.
    pub fn query_mode(&mut self) -> Result<CommandResponse> {
        self.send(&Command::QueryEspNowMode)
    }

    fn send(&mut self, command: &Command) -> Result<CommandResponse> {
        self.channel.send(command).map_err(|e| {
            log::error!("T:{} failed: {}", command.code(), e);
            e
        })
    }
}
