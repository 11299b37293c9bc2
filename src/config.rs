//! Configuration loading for Setu
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration that discovers and logs all attached arms.

use crate::error::{Error, Result};
use crate::leader::LeaderMode;
use crate::link::Endpoint;
use crate::protocol::DeviceAddress;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SetuConfig {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Leader setup run before ingestion starts (optional)
    #[serde(default)]
    pub leader: Option<LeaderConfig>,
}

/// Command channel to the local (leader) device
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LinkConfig {
    /// `http://192.168.4.1`, `serial:///dev/ttyUSB0`, or a bare device path
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-command timeout in milliseconds (default: 5000)
    #[serde(default = "default_command_timeout")]
    pub timeout_ms: u64,

    /// Serial baud rate (default: 115200)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Telemetry endpoint discovery
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    /// Endpoints to probe; empty means every serial port on the host
    #[serde(default)]
    pub candidates: Vec<String>,

    /// Time an endpoint gets to report its identity, ms (default: 2000)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Upper bound on one blocking serial read, ms (default: 100)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Serial baud rate (default: 115200)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Telemetry ingestion
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Directory for per-arm JSONL files; frames are logged when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Stop after this many seconds; runs until Ctrl-C when unset
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

/// Logging configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (default: info)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Leader role setup
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LeaderConfig {
    /// `broadcast` or `single` (default: broadcast)
    #[serde(default = "default_leader_mode")]
    pub mode: String,

    /// Follower MAC addresses to register
    #[serde(default)]
    pub followers: Vec<String>,

    /// Start relaying once followers are registered (default: true)
    #[serde(default = "default_broadcast")]
    pub broadcast: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: default_command_timeout(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            probe_timeout_ms: default_probe_timeout(),
            read_timeout_ms: default_read_timeout(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_command_timeout() -> u64 {
    5000
}
fn default_baud_rate() -> u32 {
    crate::transport::DEFAULT_BAUD_RATE
}
fn default_probe_timeout() -> u64 {
    2000
}
fn default_read_timeout() -> u64 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_leader_mode() -> String {
    "broadcast".to_string()
}
fn default_broadcast() -> bool {
    true
}

impl SetuConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: SetuConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.link.endpoint {
            endpoint.parse::<Endpoint>()?;
        }
        if let Some(leader) = &self.leader {
            if self.link.endpoint.is_none() {
                return Err(Error::Config(
                    "[leader] requires [link] endpoint".to_string(),
                ));
            }
            leader.mode()?;
        }
        if self.discovery.read_timeout_ms == 0 {
            return Err(Error::Config(
                "discovery.read_timeout_ms must be positive".to_string(),
            ));
        }
        if self.discovery.read_timeout_ms > self.discovery.probe_timeout_ms {
            log::warn!(
                "discovery.read_timeout_ms ({}) exceeds probe_timeout_ms ({})",
                self.discovery.read_timeout_ms,
                self.discovery.probe_timeout_ms
            );
        }
        Ok(())
    }
}

impl LinkConfig {
    /// Parsed command endpoint, if configured
    pub fn endpoint(&self) -> Result<Option<Endpoint>> {
        self.endpoint.as_deref().map(str::parse).transpose()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl DiscoveryConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl IngestConfig {
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }
}

impl LeaderConfig {
    pub fn mode(&self) -> Result<LeaderMode> {
        self.mode.parse()
    }

    pub fn follower_addresses(&self) -> Vec<DeviceAddress> {
        self.followers
            .iter()
            .map(|f| DeviceAddress::from(f.trim()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = SetuConfig::parse("").unwrap();
        assert_eq!(config.link.endpoint, None);
        assert_eq!(config.link.timeout(), Duration::from_secs(5));
        assert_eq!(config.discovery.probe_timeout(), Duration::from_secs(2));
        assert_eq!(config.discovery.read_timeout(), Duration::from_millis(100));
        assert_eq!(config.discovery.baud_rate, 115200);
        assert!(config.discovery.candidates.is_empty());
        assert!(config.ingest.output_dir.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(config.leader.is_none());
    }

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[link]
endpoint = "http://192.168.4.1"
timeout_ms = 1500

[discovery]
candidates = ["/dev/ttyUSB0", "/dev/ttyUSB1"]
probe_timeout_ms = 3000

[ingest]
output_dir = "recordings"
duration_secs = 60

[logging]
level = "debug"

[leader]
mode = "single"
followers = ["AA:BB:CC:DD:EE:FF"]
broadcast = false
"#;

        let config = SetuConfig::parse(toml_content).unwrap();
        assert_eq!(
            config.link.endpoint().unwrap(),
            Some(Endpoint::Http {
                base_url: "http://192.168.4.1".to_string()
            })
        );
        assert_eq!(config.link.timeout_ms, 1500);
        assert_eq!(config.discovery.candidates.len(), 2);
        assert_eq!(config.discovery.read_timeout_ms, 100);
        assert_eq!(config.ingest.output_dir, Some(PathBuf::from("recordings")));
        assert_eq!(config.ingest.duration(), Some(Duration::from_secs(60)));
        assert_eq!(config.logging.level, "debug");

        let leader = config.leader.unwrap();
        assert_eq!(leader.mode().unwrap(), LeaderMode::Single);
        assert_eq!(
            leader.follower_addresses(),
            vec![DeviceAddress::from("AA:BB:CC:DD:EE:FF")]
        );
        assert!(!leader.broadcast);
    }

    #[test]
    fn test_leader_section_defaults() {
        let config = SetuConfig::parse(
            r#"
[link]
endpoint = "/dev/ttyUSB0"

[leader]
"#,
        )
        .unwrap();
        let leader = config.leader.unwrap();
        assert_eq!(leader.mode().unwrap(), LeaderMode::Broadcast);
        assert!(leader.broadcast);
        assert!(leader.followers.is_empty());
    }

    #[test]
    fn test_leader_requires_endpoint() {
        assert!(matches!(
            SetuConfig::parse("[leader]\nmode = \"broadcast\"\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(SetuConfig::parse("[link]\nendpoint = \"ftp://x\"\n").is_err());
        assert!(SetuConfig::parse(
            "[link]\nendpoint = \"http://x\"\n[leader]\nmode = \"follower\"\n"
        )
        .is_err());
        assert!(SetuConfig::parse("[discovery]\nread_timeout_ms = 0\n").is_err());
        assert!(SetuConfig::parse("[link]\ntimeout_ms = \"soon\"\n").is_err());
    }

    #[test]
    fn test_sample_config_parses() {
        let config = SetuConfig::parse(include_str!("../setu.toml")).unwrap();
        assert!(config.leader.is_some());
        assert!(config.link.endpoint().unwrap().is_some());
    }

    #[test]
    fn test_missing_file() {
        let err = SetuConfig::load(Path::new("/nonexistent/setu.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
