//! Joint pose relayed between arms

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Six joint angles in radians.
///
/// Keys follow the firmware: `b` base, `s` shoulder, `e` elbow, `t` wrist tilt,
/// `r` wrist roll, `h` hand (gripper). Absent joints read as 0.0, matching what
/// the firmware does with lossy upstream telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JointPose {
    pub b: f64,
    pub s: f64,
    pub e: f64,
    pub t: f64,
    pub r: f64,
    pub h: f64,
}

impl JointPose {
    /// Build from a partial key/value mapping; missing or non-numeric joints are zero
    pub fn from_partial(values: &Map<String, Value>) -> Self {
        let joint = |key: &str| values.get(key).and_then(Value::as_f64).unwrap_or(0.0);
        Self {
            b: joint("b"),
            s: joint("s"),
            e: joint("e"),
            t: joint("t"),
            r: joint("r"),
            h: joint("h"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_partial_fills_zero() {
        let Value::Object(map) = json!({"b": 1.0, "e": -0.25, "extra": "ignored"}) else {
            unreachable!()
        };
        let pose = JointPose::from_partial(&map);
        assert_eq!(pose.b, 1.0);
        assert_eq!(pose.e, -0.25);
        assert_eq!(pose.s, 0.0);
        assert_eq!(pose.h, 0.0);
    }

    #[test]
    fn test_deserialize_defaults() {
        let pose: JointPose = serde_json::from_str(r#"{"s":0.5}"#).unwrap();
        assert_eq!(
            pose,
            JointPose {
                s: 0.5,
                ..Default::default()
            }
        );
    }
}
