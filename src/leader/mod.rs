//! Leader/follower relay over ESP-NOW
//!
//! - [`FollowerRegistry`]: local model of the device role and its followers
//! - [`Coordinator`]: issues the role commands and applies confirmed changes

mod coordinator;
mod registry;

pub use coordinator::{Coordinator, CoordinatorState, LeaderMode, RelayTarget};
pub use registry::FollowerRegistry;
