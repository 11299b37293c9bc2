//! Telemetry frame decoding

use crate::protocol::{DeviceAddress, JointPose, IDENTITY_FIELD};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Current wall-clock time in microseconds since the Unix epoch
pub fn current_timestamp_us() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Decode one line into a JSON object; anything else is noise
pub fn decode_object(line: &[u8]) -> Option<Map<String, Value>> {
    let text = std::str::from_utf8(line).ok()?;
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Identity a record reports, if any.
///
/// Firmware builds differ on whether `arm_id` is a string or a number.
pub fn identity_of(record: &Map<String, Value>) -> Option<DeviceAddress> {
    match record.get(IDENTITY_FIELD)? {
        Value::String(s) if !s.trim().is_empty() => Some(DeviceAddress::from(s.trim())),
        Value::Number(n) => Some(DeviceAddress::new(n.to_string())),
        _ => None,
    }
}

/// One telemetry record from one arm
///
/// Serializes flat: `{"arm_id": .., "b": .., ..., "host_time_us": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryFrame {
    pub arm_id: DeviceAddress,
    /// Numeric fields as reported (joints `b s e t r g`, Cartesian `x y z`, ...)
    #[serde(flatten)]
    pub fields: BTreeMap<String, f64>,
    /// Host receive time, µs since the Unix epoch
    pub host_time_us: u64,
}

impl TelemetryFrame {
    /// Decode a line, stamping it with `host_time_us`.
    ///
    /// Returns `None` for decode noise: invalid UTF-8, non-JSON, non-object
    /// lines and objects without an identity. Non-numeric fields are ignored.
    pub fn decode(line: &[u8], host_time_us: u64) -> Option<Self> {
        let record = decode_object(line)?;
        Self::from_record(&record, host_time_us)
    }

    pub fn from_record(record: &Map<String, Value>, host_time_us: u64) -> Option<Self> {
        let arm_id = identity_of(record)?;
        let fields = record
            .iter()
            .filter(|(key, _)| key.as_str() != IDENTITY_FIELD)
            .filter_map(|(key, value)| value.as_f64().map(|v| (key.clone(), v)))
            .collect();

        Some(Self {
            arm_id,
            fields,
            host_time_us,
        })
    }

    pub fn field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }

    /// Joint angles carried by this frame; the gripper is reported as `g`
    pub fn joint_pose(&self) -> JointPose {
        let joint = |key: &str| self.field(key).unwrap_or(0.0);
        JointPose {
            b: joint("b"),
            s: joint("s"),
            e: joint("e"),
            t: joint("t"),
            r: joint("r"),
            h: self.field("g").or_else(|| self.field("h")).unwrap_or(0.0),
        }
    }

    /// Single-line JSON encoding
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
