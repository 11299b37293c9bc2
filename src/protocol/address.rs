//! Device identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Link-layer broadcast address used to reach every registered follower
pub const BROADCAST_MAC: &str = "FF:FF:FF:FF:FF:FF";

/// Opaque hardware identity of one arm.
///
/// Either the ESP-NOW MAC address reported by `T:302` or the `arm_id` tag an arm
/// stamps on its telemetry. Compared verbatim; the only interpreted value is the
/// broadcast address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The reserved "all followers" address
    pub fn broadcast() -> Self {
        Self(BROADCAST_MAC.to_string())
    }

    pub fn is_broadcast(&self) -> bool {
        self.0.eq_ignore_ascii_case(BROADCAST_MAC)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity reduced to characters safe for a file name
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for DeviceAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_detection_ignores_case() {
        assert!(DeviceAddress::broadcast().is_broadcast());
        assert!(DeviceAddress::from("ff:ff:ff:ff:ff:ff").is_broadcast());
        assert!(!DeviceAddress::from("AA:BB:CC:DD:EE:FF").is_broadcast());
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(DeviceAddress::from("AA:BB").file_stem(), "AA_BB");
        assert_eq!(
            DeviceAddress::from("follower_left").file_stem(),
            "follower_left"
        );
        assert_eq!(DeviceAddress::from("../x").file_stem(), "___x");
    }
}
