//! Serial command channel
//!
//! Commands go out as one JSON line. The reply is the next JSON object line
//! that is not a telemetry frame. A follower streams position frames on the
//! same console at 50 Hz, and before `T:400` those frames carry no `arm_id`,
//! so a status-less line is skipped while waiting when it is tagged with
//! `arm_id` or has the position frame shape (joint angles plus Cartesian
//! position and no `T` echo).

use super::CommandChannel;
use crate::error::{Error, Result};
use crate::protocol::{Command, CommandResponse, IDENTITY_FIELD};
use crate::transport::{Console, SerialLink, SerialTransport};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

/// Per-read timeout while waiting for a reply; the overall deadline is the
/// channel timeout.
const REPLY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Keys every position feedback frame carries
const POSITION_FRAME_KEYS: [&str; 6] = ["b", "s", "e", "x", "y", "z"];

/// Command channel over the arm's USB serial console
pub struct SerialChannel<L = SerialLink> {
    link: L,
    timeout: Duration,
}

impl SerialChannel {
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let transport = SerialTransport::open(path, baud_rate, REPLY_POLL_INTERVAL.min(timeout))?;
        Ok(Self::with_link(SerialLink::new(transport), timeout))
    }
}

impl<L: Console> SerialChannel<L> {
    /// Channel over an already open console
    pub fn with_link(link: L, timeout: Duration) -> Self {
        Self { link, timeout }
    }
}

impl<L: Console> CommandChannel for SerialChannel<L> {
    fn send(&mut self, command: &Command) -> Result<CommandResponse> {
        let line = command.to_json_string();
        log::debug!("Serial <- {}", line);

        self.link.discard_input()?;
        self.link.write_line(line.as_bytes())?;

        let deadline = Instant::now() + self.timeout;
        while Instant::now() < deadline {
            let Some(raw) = self.link.next_line()? else {
                continue;
            };
            if let Some(response) = reply_from_line(&raw) {
                log::trace!("Serial -> {}", response);
                return Ok(response);
            }
        }

        log::warn!("No reply to T:{} within {:?}", command.code(), self.timeout);
        Err(Error::Timeout)
    }
}

/// Interpret a console line as a command reply, skipping noise and telemetry
fn reply_from_line(raw: &[u8]) -> Option<CommandResponse> {
    let text = std::str::from_utf8(raw).ok()?;
    let Ok(Value::Object(body)) = serde_json::from_str::<Value>(text.trim()) else {
        return None;
    };
    if is_telemetry(&body) {
        return None;
    }
    Some(CommandResponse::new(body))
}

fn is_telemetry(body: &Map<String, Value>) -> bool {
    if body.contains_key("status") {
        return false;
    }
    if body.contains_key(IDENTITY_FIELD) {
        return true;
    }
    // Feedback replies echo their opcode in `T`; streamed frames never do
    !body.contains_key("T") && POSITION_FRAME_KEYS.iter().all(|key| body.contains_key(*key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ArmDevice;
    use crate::protocol::opcodes;
    use crate::transport::mock::{LinkScript, ScriptedLink, ScriptedOpener};
    use crate::transport::EndpointOpener;

    const POSITION_FRAME: &str =
        r#"{"t":0.01,"b":0.1,"s":0.2,"e":1.57,"r":0.0,"g":3.1,"x":235.1,"y":0.0,"z":234.5}"#;

    fn channel_over(script: LinkScript) -> (SerialChannel<ScriptedLink>, ScriptedOpener) {
        let opener = ScriptedOpener::new(Duration::from_millis(5))
            .endpoint("/dev/ttyUSB0", script);
        let link = opener.open("/dev/ttyUSB0").unwrap();
        (SerialChannel::with_link(link, Duration::from_millis(300)), opener)
    }

    #[test]
    fn test_reply_skips_telemetry_and_noise() {
        assert!(reply_from_line(b"boot: esp32 ready").is_none());
        assert!(reply_from_line(&[0xff, 0xfe, b'{']).is_none());
        assert!(reply_from_line(br#"{"arm_id":"follower_left","b":0.1}"#).is_none());
        assert!(reply_from_line(POSITION_FRAME.as_bytes()).is_none());

        let reply = reply_from_line(br#"{"status":"ok","arm_id":"follower_left"}"#).unwrap();
        assert!(reply.is_ok());

        let mac = reply_from_line(br#"{"mac":"AA:BB"}"#).unwrap();
        assert_eq!(mac.str_field("mac"), Some("AA:BB"));
    }

    #[test]
    fn test_feedback_reply_with_opcode_is_kept() {
        let reply = reply_from_line(
            br#"{"T":1051,"x":235.1,"y":0.0,"z":234.5,"b":0.1,"s":0.2,"e":1.57,"r":0.0,"g":3.1}"#,
        )
        .unwrap();
        assert_eq!(reply.body().get("x").and_then(Value::as_f64), Some(235.1));
    }

    #[test]
    fn test_send_skips_unidentified_frames_before_reply() {
        let (mut channel, opener) = channel_over(
            LinkScript::lines([POSITION_FRAME, POSITION_FRAME])
                .idle(1)
                .line(POSITION_FRAME)
                .line(r#"{"status":"ok"}"#)
                .line(POSITION_FRAME),
        );

        let response = channel.send(&Command::GetMacAddress).unwrap();
        assert!(response.is_ok());
        assert!(response.body().get("b").is_none());

        let written = opener.state("/dev/ttyUSB0").written();
        assert_eq!(written.len(), 1);
        let sent: Value = serde_json::from_slice(&written[0]).unwrap();
        assert_eq!(sent["T"], opcodes::GET_MAC_ADDRESS);
    }

    #[test]
    fn test_set_identity_on_streaming_follower() {
        let (channel, _opener) = channel_over(LinkScript::lines([
            POSITION_FRAME,
            POSITION_FRAME,
            r#"{"status":"ok"}"#,
        ]));
        let mut arm = ArmDevice::new(channel);

        assert!(arm.set_arm_identity("follower_left").unwrap().is_ok());
    }

    #[test]
    fn test_only_frames_times_out() {
        let (mut channel, _opener) =
            channel_over(LinkScript::lines([POSITION_FRAME]).idle(1).repeating());

        let started = Instant::now();
        let err = channel.send(&Command::QueryEspNowMode).unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert!(err.is_transport());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
