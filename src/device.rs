//! Single-arm command wrapper
//!
//! Thin typed layer over a [`CommandChannel`]: one method per firmware
//! command, one `send` per call.

use crate::error::{Error, Result};
use crate::link::CommandChannel;
use crate::protocol::{Command, CommandResponse, DeviceAddress, JointPose};
use serde_json::Value;

/// Default movement speed (0-100)
pub const DEFAULT_SPEED: f64 = 50.0;

/// Gripper travel in radians from closed to fully open
const GRIPPER_RANGE_RAD: f64 = 1.57;

/// Arm joints, numbered as the firmware expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joint {
    Base,
    Shoulder,
    Elbow,
    WristPitch,
    WristRoll,
    Gripper,
}

impl Joint {
    pub fn index(self) -> u8 {
        match self {
            Joint::Base => 0,
            Joint::Shoulder => 1,
            Joint::Elbow => 2,
            Joint::WristPitch => 3,
            Joint::WristRoll => 4,
            Joint::Gripper => 5,
        }
    }
}

/// End-effector target: position in meters, orientation in radians
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CartesianPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl CartesianPose {
    pub fn position(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            ..Default::default()
        }
    }
}

/// One arm reachable through a command channel
pub struct ArmDevice<C: CommandChannel> {
    channel: C,
}

impl<C: CommandChannel> ArmDevice<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    /// ESP-NOW MAC address (`T:302`)
    pub fn mac_address(&mut self) -> Result<DeviceAddress> {
        let response = self.channel.send(&Command::GetMacAddress)?;
        match response.str_field("mac") {
            Some(mac) if !mac.is_empty() => Ok(DeviceAddress::from(mac)),
            _ => Err(Error::MalformedReply(format!(
                "MAC address reply without 'mac': {}",
                response
            ))),
        }
    }

    /// Make the arm tag its telemetry with `arm_id` (`T:400`)
    pub fn set_arm_identity(&mut self, arm_id: &str) -> Result<CommandResponse> {
        let response = self.channel.send(&Command::SetArmIdentity {
            arm_id: arm_id.to_string(),
        })?;
        if response.is_ok() {
            log::info!("Arm identity set to {}", arm_id);
        } else {
            log::warn!("Arm identity {} rejected: {}", arm_id, response);
        }
        Ok(response)
    }

    /// Current joint angles (`T:103`); the gripper may be reported as `g`
    pub fn joint_angles(&mut self) -> Result<JointPose> {
        let response = self.channel.send(&Command::GetJointAngles)?;
        let body = response.body();
        let mut pose = JointPose::from_partial(body);
        if !body.contains_key("h") {
            if let Some(g) = body.get("g").and_then(Value::as_f64) {
                pose.h = g;
            }
        }
        Ok(pose)
    }

    /// End-effector position and orientation (`T:203`), as reported
    pub fn position(&mut self) -> Result<CommandResponse> {
        self.channel.send(&Command::GetPosition)
    }

    /// Move one joint to `rad` at `speed` (`T:101`)
    pub fn move_joint(&mut self, joint: Joint, rad: f64, speed: f64) -> Result<CommandResponse> {
        self.channel.send(&Command::JointControl {
            joint: joint.index(),
            rad,
            speed,
        })
    }

    /// Open the gripper to `opening` (0.0 closed .. 1.0 open)
    pub fn set_gripper(&mut self, opening: f64, speed: f64) -> Result<CommandResponse> {
        let rad = opening.clamp(0.0, 1.0) * GRIPPER_RANGE_RAD;
        self.move_joint(Joint::Gripper, rad, speed)
    }

    /// Move the end effector with on-device IK (`T:201`)
    pub fn move_to(&mut self, target: &CartesianPose, speed: f64) -> Result<CommandResponse> {
        self.channel.send(&Command::CoordControl {
            x: target.x,
            y: target.y,
            z: target.z,
            roll: target.roll,
            pitch: target.pitch,
            yaw: target.yaw,
            speed,
        })
    }

    /// Return to the home pose (`T:205`)
    pub fn home(&mut self) -> Result<CommandResponse> {
        self.channel.send(&Command::Home)
    }

    /// Stop all movement immediately (`T:104`)
    pub fn emergency_stop(&mut self) -> Result<CommandResponse> {
        log::warn!("Emergency stop");
        self.channel.send(&Command::StopMoving)
    }
}
