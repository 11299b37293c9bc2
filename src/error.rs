//! Error types for Setu

use crate::protocol::DeviceAddress;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Setu error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed (connection refused, body read failure)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Device answered with a non-2xx status; `body` is its raw response
    #[error("HTTP status {status} from {url}: {body}")]
    HttpStatus { status: u16, url: String, body: String },

    /// Communication timeout
    #[error("Communication timeout")]
    Timeout,

    /// Reply body was not a JSON object
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Follower registry invariant would be violated
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Relay targeted an address that is not a registered follower
    #[error("Unknown follower: {0}")]
    UnknownFollower(DeviceAddress),

    /// Endpoint string could not be parsed
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Telemetry sink rejected a frame
    #[error("Sink error: {0}")]
    Sink(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures of the command/telemetry link itself.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Serial(_)
                | Error::Io(_)
                | Error::Http(_)
                | Error::HttpStatus { .. }
                | Error::Timeout
                | Error::MalformedReply(_)
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(status, response) => {
                let url = response.get_url().to_string();
                let body = response
                    .into_string()
                    .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
                Error::HttpStatus { status, url, body }
            }
            ureq::Error::Transport(transport) => {
                let timed_out = std::error::Error::source(&transport)
                    .and_then(|s| s.downcast_ref::<std::io::Error>())
                    .is_some_and(|io| io.kind() == std::io::ErrorKind::TimedOut);
                if timed_out {
                    Error::Timeout
                } else {
                    Error::Http(transport.to_string())
                }
            }
        }
    }
}
