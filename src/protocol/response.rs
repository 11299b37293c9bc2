//! Command replies

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::fmt;

/// Success sentinel in the `status` field
pub const STATUS_OK: &str = "ok";

/// Structured reply from one device.
///
/// Kept as the raw JSON object so callers can diagnose rejections with whatever
/// the firmware sent back.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandResponse {
    body: Map<String, Value>,
}

impl CommandResponse {
    pub fn new(body: Map<String, Value>) -> Self {
        Self { body }
    }

    /// Parse a reply body; anything but a JSON object is malformed
    pub fn parse(text: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(Value::Object(body)) => Ok(Self { body }),
            Ok(other) => Err(Error::MalformedReply(format!(
                "expected JSON object, got {}",
                other
            ))),
            Err(e) => Err(Error::MalformedReply(e.to_string())),
        }
    }

    /// Value of the `status` field, if present and a string
    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }

    /// Device confirmed the command
    pub fn is_ok(&self) -> bool {
        self.status() == Some(STATUS_OK)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn into_body(self) -> Map<String, Value> {
        self.body
    }
}

impl fmt::Display for CommandResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.body.clone()))
    }
}
