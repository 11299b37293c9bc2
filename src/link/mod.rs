//! Command channel: one request, one structured reply
//!
//! Every higher component talks to hardware through [`CommandChannel::send`].
//! The channel frames the transport (URL query parameter over HTTP, one JSON
//! line over serial) and never interprets command semantics. Every call is
//! bounded by a timeout; connection failures, timeouts and malformed replies
//! surface as transport errors (see [`Error::is_transport`]).
//!
//! [`Error::is_transport`]: crate::error::Error::is_transport

mod http;
pub mod mock;
mod serial;

pub use http::HttpChannel;
pub use serial::SerialChannel;

use crate::error::{Error, Result};
use crate::protocol::{Command, CommandResponse};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Sends commands to one device
pub trait CommandChannel: Send {
    /// Send a command and wait for the device's reply
    fn send(&mut self, command: &Command) -> Result<CommandResponse>;
}

impl<C: CommandChannel + ?Sized> CommandChannel for Box<C> {
    fn send(&mut self, command: &Command) -> Result<CommandResponse> {
        (**self).send(command)
    }
}

/// Where a device's command interface is reachable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Web interface, e.g. `http://192.168.4.1`
    Http { base_url: String },
    /// USB serial console, e.g. `/dev/ttyUSB0`
    Serial { path: String },
}

impl FromStr for Endpoint {
    type Err = Error;

    /// Accepts `http://host[:port]`, `https://...`, `serial:///dev/tty..`,
    /// a bare device path (`/dev/..`, `COM3`) or a bare host/IP (HTTP).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidEndpoint("empty endpoint".to_string()));
        }

        if s.starts_with("http://") || s.starts_with("https://") {
            return Ok(Endpoint::Http {
                base_url: s.trim_end_matches('/').to_string(),
            });
        }
        if let Some(path) = s.strip_prefix("serial://") {
            if path.is_empty() {
                return Err(Error::InvalidEndpoint(s.to_string()));
            }
            return Ok(Endpoint::Serial {
                path: path.to_string(),
            });
        }
        if s.starts_with('/') || is_com_port(s) {
            return Ok(Endpoint::Serial {
                path: s.to_string(),
            });
        }
        if s.contains("://") {
            return Err(Error::InvalidEndpoint(format!("unsupported scheme: {}", s)));
        }

        Ok(Endpoint::Http {
            base_url: format!("http://{}", s.trim_end_matches('/')),
        })
    }
}

impl TryFrom<String> for Endpoint {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Http { base_url } => f.write_str(base_url),
            Endpoint::Serial { path } => write!(f, "serial://{}", path),
        }
    }
}

/// Windows serial port name (`COM1`..`COM256`)
fn is_com_port(s: &str) -> bool {
    match (s.get(..3), s.get(3..)) {
        (Some(prefix), Some(number)) => {
            prefix.eq_ignore_ascii_case("COM")
                && !number.is_empty()
                && number.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Open a command channel to `endpoint`
pub fn connect(
    endpoint: &Endpoint,
    timeout: Duration,
    baud_rate: u32,
) -> Result<Box<dyn CommandChannel>> {
    log::debug!("Connecting command channel to {}", endpoint);
    match endpoint {
        Endpoint::Http { base_url } => Ok(Box::new(HttpChannel::new(base_url, timeout))),
        Endpoint::Serial { path } => Ok(Box::new(SerialChannel::open(path, baud_rate, timeout)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_endpoints() {
        assert_eq!(
            "http://192.168.4.1/".parse::<Endpoint>().unwrap(),
            Endpoint::Http {
                base_url: "http://192.168.4.1".to_string()
            }
        );
        assert_eq!(
            "192.168.4.2".parse::<Endpoint>().unwrap(),
            Endpoint::Http {
                base_url: "http://192.168.4.2".to_string()
            }
        );
    }

    #[test]
    fn test_parse_serial_endpoints() {
        assert_eq!(
            "/dev/ttyUSB0".parse::<Endpoint>().unwrap(),
            Endpoint::Serial {
                path: "/dev/ttyUSB0".to_string()
            }
        );
        assert_eq!(
            "serial:///dev/ttyACM1".parse::<Endpoint>().unwrap(),
            Endpoint::Serial {
                path: "/dev/ttyACM1".to_string()
            }
        );
        assert_eq!(
            "COM4".parse::<Endpoint>().unwrap(),
            Endpoint::Serial {
                path: "COM4".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Endpoint>().is_err());
        assert!("serial://".parse::<Endpoint>().is_err());
        assert!("mqtt://broker".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for s in ["http://10.0.0.7", "serial:///dev/ttyUSB0"] {
            let endpoint: Endpoint = s.parse().unwrap();
            assert_eq!(endpoint.to_string(), s);
        }
    }
}
