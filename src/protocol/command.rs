//! Command set and wire encoding
//!
//! Dynamic command dictionaries are replaced by a closed enum: each opcode carries
//! exactly the named parameters the firmware reads, so a mistyped key is a compile
//! error instead of a silently ignored field. [`Command::to_json`] produces the
//! flat object the firmware expects.

use super::{DeviceAddress, JointPose};
use serde_json::{json, Value};

/// Opcodes (`T` field)
pub mod opcodes {
    // Joint control
    pub const SINGLE_JOINT_CTRL: u16 = 101; // Move one joint (rad, spd)
    pub const GET_JOINT_ANGLES: u16 = 103;
    pub const STOP_MOVING: u16 = 104;

    // Cartesian control
    pub const COORDCTRL_POS: u16 = 201; // Move end effector (IK on device)
    pub const COORDCTRL_GET_POS: u16 = 203;
    pub const COORDCTRL_HOME: u16 = 205;

    // ESP-NOW leader/follower
    pub const BROADCAST_FOLLOWER: u16 = 300; // Broadcast on/off, addressed to FF:FF:..
    pub const ESP_NOW_CONFIG: u16 = 301; // Mode 0-3, -1 queries
    pub const GET_MAC_ADDRESS: u16 = 302;
    pub const ESP_NOW_ADD_FOLLOWER: u16 = 303; // Used by both roles to learn the peer
    pub const ESP_NOW_REMOVE_FOLLOWER: u16 = 304;
    pub const ESP_NOW_MANY_CTRL: u16 = 305; // Pose to every follower
    pub const ESP_NOW_SINGLE: u16 = 306; // Pose to one follower

    // Telemetry identity
    pub const SET_ARM_IDENTITY: u16 = 400;
}

/// Wire value of the ESP-NOW query mode
const QUERY_MODE: i8 = -1;

/// Message tag the firmware attaches to relayed poses
const POSE_MESSAGE: &str = "position update";

/// ESP-NOW role of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// No leader/follower role
    #[default]
    Disabled,
    /// Leader relaying to every registered follower
    BroadcastLeader,
    /// Leader relaying to exactly one follower
    SingleLeader,
    /// Follower replicating a leader
    Follower,
}

impl Mode {
    /// Value of the `mode` parameter of `T:301`
    pub fn wire_value(self) -> i8 {
        match self {
            Mode::Disabled => 0,
            Mode::BroadcastLeader => 1,
            Mode::SingleLeader => 2,
            Mode::Follower => 3,
        }
    }

    pub fn is_leader(self) -> bool {
        matches!(self, Mode::BroadcastLeader | Mode::SingleLeader)
    }
}

/// Commands understood by the arm firmware
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Move one joint (0 base .. 5 gripper) to `rad` at `speed` (0-100)
    JointControl { joint: u8, rad: f64, speed: f64 },
    GetJointAngles,
    StopMoving,
    /// Move the end effector to a Cartesian pose, meters and radians
    CoordControl {
        x: f64,
        y: f64,
        z: f64,
        roll: f64,
        pitch: f64,
        yaw: f64,
        speed: f64,
    },
    GetPosition,
    Home,
    /// Turn leader broadcasting on or off
    BroadcastFollower { enabled: bool, mac: DeviceAddress },
    /// Set the ESP-NOW role
    EspNowConfig { mode: Mode },
    /// Ask for the current ESP-NOW role; reply shape is firmware specific
    QueryEspNowMode,
    GetMacAddress,
    /// Register a peer (leader side: a follower; follower side: its leader)
    AddPeer { mac: DeviceAddress },
    RemovePeer { mac: DeviceAddress },
    /// Relay a pose to every registered follower
    ManyControl { pose: JointPose },
    /// Relay a pose to one follower
    SingleControl { mac: DeviceAddress, pose: JointPose },
    /// Tag this arm's telemetry with `arm_id`
    SetArmIdentity { arm_id: String },
}

impl Command {
    /// Opcode sent in the `T` field
    pub fn code(&self) -> u16 {
        match self {
            Command::JointControl { .. } => opcodes::SINGLE_JOINT_CTRL,
            Command::GetJointAngles => opcodes::GET_JOINT_ANGLES,
            Command::StopMoving => opcodes::STOP_MOVING,
            Command::CoordControl { .. } => opcodes::COORDCTRL_POS,
            Command::GetPosition => opcodes::COORDCTRL_GET_POS,
            Command::Home => opcodes::COORDCTRL_HOME,
            Command::BroadcastFollower { .. } => opcodes::BROADCAST_FOLLOWER,
            Command::EspNowConfig { .. } | Command::QueryEspNowMode => opcodes::ESP_NOW_CONFIG,
            Command::GetMacAddress => opcodes::GET_MAC_ADDRESS,
            Command::AddPeer { .. } => opcodes::ESP_NOW_ADD_FOLLOWER,
            Command::RemovePeer { .. } => opcodes::ESP_NOW_REMOVE_FOLLOWER,
            Command::ManyControl { .. } => opcodes::ESP_NOW_MANY_CTRL,
            Command::SingleControl { .. } => opcodes::ESP_NOW_SINGLE,
            Command::SetArmIdentity { .. } => opcodes::SET_ARM_IDENTITY,
        }
    }

    /// Encode as the flat JSON object the firmware parses
    pub fn to_json(&self) -> Value {
        let code = self.code();
        match self {
            Command::JointControl { joint, rad, speed } => {
                json!({ "T": code, "joint": joint, "rad": rad, "spd": speed })
            }
            Command::CoordControl {
                x,
                y,
                z,
                roll,
                pitch,
                yaw,
                speed,
            } => json!({
                "T": code,
                "x": x,
                "y": y,
                "z": z,
                "rx": roll,
                "ry": pitch,
                "rz": yaw,
                "spd": speed,
            }),
            Command::BroadcastFollower { enabled, mac } => {
                json!({ "T": code, "mode": u8::from(*enabled), "mac": mac })
            }
            Command::EspNowConfig { mode } => json!({
                "T": code,
                "mode": mode.wire_value(),
                "dev": 0,
                "cmd": 0,
                "megs": 0,
            }),
            Command::QueryEspNowMode => json!({ "T": code, "mode": QUERY_MODE }),
            Command::AddPeer { mac } | Command::RemovePeer { mac } => {
                json!({ "T": code, "mac": mac })
            }
            Command::ManyControl { pose } => pose_command(code, None, pose),
            Command::SingleControl { mac, pose } => pose_command(code, Some(mac), pose),
            Command::SetArmIdentity { arm_id } => json!({ "T": code, "arm_id": arm_id }),
            Command::GetJointAngles
            | Command::StopMoving
            | Command::GetPosition
            | Command::Home
            | Command::GetMacAddress => json!({ "T": code }),
        }
    }

    /// Compact single-line encoding (URL payload / serial line)
    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }
}

fn pose_command(code: u16, mac: Option<&DeviceAddress>, pose: &JointPose) -> Value {
    let mut cmd = json!({
        "T": code,
        "dev": 0,
        "b": pose.b,
        "s": pose.s,
        "e": pose.e,
        "t": pose.t,
        "r": pose.r,
        "h": pose.h,
        "cmd": 0,
        "megs": POSE_MESSAGE,
    });
    if let (Some(mac), Value::Object(map)) = (mac, &mut cmd) {
        map.insert("mac".to_string(), json!(mac));
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_config_encoding() {
        let cmd = Command::EspNowConfig {
            mode: Mode::BroadcastLeader,
        };
        assert_eq!(
            cmd.to_json(),
            json!({"T": 301, "mode": 1, "dev": 0, "cmd": 0, "megs": 0})
        );

        let follower = Command::EspNowConfig {
            mode: Mode::Follower,
        };
        assert_eq!(follower.to_json()["mode"], 3);
    }

    #[test]
    fn test_broadcast_toggle_targets_all() {
        let cmd = Command::BroadcastFollower {
            enabled: true,
            mac: DeviceAddress::broadcast(),
        };
        assert_eq!(
            cmd.to_json(),
            json!({"T": 300, "mode": 1, "mac": "FF:FF:FF:FF:FF:FF"})
        );
    }

    #[test]
    fn test_single_control_carries_mac_and_pose() {
        let pose = JointPose {
            s: 0.5,
            ..JointPose::default()
        };
        let cmd = Command::SingleControl {
            mac: DeviceAddress::from("AA:BB"),
            pose,
        };
        let v = cmd.to_json();
        assert_eq!(v["T"], 306);
        assert_eq!(v["mac"], "AA:BB");
        assert_eq!(v["s"], 0.5);
        assert_eq!(v["h"], 0.0);
        assert_eq!(v["megs"], "position update");
    }

    #[test]
    fn test_query_shares_config_opcode() {
        assert_eq!(Command::QueryEspNowMode.code(), 301);
        assert_eq!(Command::QueryEspNowMode.to_json()["mode"], -1);
    }

    #[test]
    fn test_compact_string_is_single_line() {
        let s = Command::GetMacAddress.to_json_string();
        assert_eq!(s, r#"{"T":302}"#);
    }
}
