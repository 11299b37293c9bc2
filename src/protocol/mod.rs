//! JSON command protocol spoken by the arm firmware.
//!
//! Every command is a flat JSON object with a numeric opcode under `T` plus
//! command-specific named parameters:
//!
//! ```text
//! {"T":303,"mac":"AA:BB:CC:DD:EE:FF"}
//! {"T":305,"dev":0,"b":0.0,"s":0.5,"e":1.0,"t":0.0,"r":0.0,"h":0.8,"cmd":0,"megs":"position update"}
//! ```
//!
//! Replies are JSON objects; `{"status":"ok"}` marks a confirmed command.
//!
//! - [`Command`]: closed set of opcodes with typed parameters
//! - [`CommandResponse`]: reply wrapper with status helpers
//! - [`DeviceAddress`]: opaque device identity (MAC or arm id)
//! - [`JointPose`]: six-joint pose relayed from leader to followers

mod address;
mod command;
mod pose;
mod response;

pub use address::{DeviceAddress, BROADCAST_MAC};
pub use command::{opcodes, Command, Mode};
pub use pose::JointPose;
pub use response::{CommandResponse, STATUS_OK};

/// Telemetry field carrying the reporting arm's identity (set with `T:400`)
pub const IDENTITY_FIELD: &str = "arm_id";
