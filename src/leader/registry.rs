//! Follower registry: local model of a device's leader/follower role
//!
//! Pure state transitions. The coordinator applies them only after the device
//! confirmed the matching command, so the registry never runs ahead of the
//! hardware.
//!
//! Invariant: `broadcasting` implies a leader mode.

use crate::error::{Error, Result};
use crate::protocol::{DeviceAddress, Mode};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct FollowerRegistry {
    mode: Mode,
    followers: BTreeSet<DeviceAddress>,
    broadcasting: bool,
}

impl FollowerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_broadcasting(&self) -> bool {
        self.broadcasting
    }

    pub fn followers(&self) -> &BTreeSet<DeviceAddress> {
        &self.followers
    }

    pub fn contains(&self, address: &DeviceAddress) -> bool {
        self.followers.contains(address)
    }

    /// Check whether `mode` may be entered without changing anything
    pub fn check_mode(&self, mode: Mode) -> Result<()> {
        if mode == Mode::Follower && !self.followers.is_empty() {
            return Err(Error::InvalidTransition(format!(
                "cannot become a follower while {} follower(s) are registered",
                self.followers.len()
            )));
        }
        Ok(())
    }

    /// Switch role. Leaving the leader modes ends broadcasting.
    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.check_mode(mode)?;
        if !mode.is_leader() {
            self.broadcasting = false;
        }
        if self.mode != mode {
            log::debug!("Registry mode {:?} -> {:?}", self.mode, mode);
        }
        self.mode = mode;
        Ok(())
    }

    /// Check whether followers may be registered in the current mode
    pub fn check_can_add(&self) -> Result<()> {
        if !self.mode.is_leader() {
            return Err(Error::InvalidTransition(format!(
                "followers can only be added in a leader mode (current: {:?})",
                self.mode
            )));
        }
        Ok(())
    }

    /// Register a follower; no-op if already present
    pub fn add_follower(&mut self, address: DeviceAddress) -> Result<()> {
        self.check_can_add()?;
        if self.followers.insert(address.clone()) {
            log::debug!("Registered follower {}", address);
        }
        Ok(())
    }

    /// Forget a follower; no-op if absent
    pub fn remove_follower(&mut self, address: &DeviceAddress) {
        if !self.followers.remove(address) {
            return;
        }
        log::debug!("Removed follower {}", address);

        // A single-target leader has nobody left to relay to
        if self.broadcasting && self.mode == Mode::SingleLeader && self.followers.is_empty() {
            self.broadcasting = false;
        }
    }

    /// Check whether broadcasting may be started in the current mode
    pub fn check_can_broadcast(&self) -> Result<()> {
        if !self.mode.is_leader() {
            return Err(Error::InvalidTransition(format!(
                "broadcasting requires a leader mode (current: {:?})",
                self.mode
            )));
        }
        Ok(())
    }

    /// Start broadcasting; a no-op while no followers are registered
    pub fn start_broadcasting(&mut self) -> Result<()> {
        self.check_can_broadcast()?;
        if self.followers.is_empty() {
            log::debug!("Broadcast start with no followers registered, flag unchanged");
            return Ok(());
        }
        self.broadcasting = true;
        Ok(())
    }

    pub fn stop_broadcasting(&mut self) {
        self.broadcasting = false;
    }
}
