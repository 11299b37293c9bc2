//! Scripted command channel for testing

use super::CommandChannel;
use crate::error::{Error, Result};
use crate::protocol::{Command, CommandResponse};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;

enum Reply {
    Body(Value),
    TransportFailure,
}

struct ScriptedChannelInner {
    replies: VecDeque<Reply>,
    default_reply: Value,
    sent: Vec<Command>,
}

/// Command channel that records every command and answers from a script.
///
/// Clones share state, so a test can keep one handle for inspection while the
/// coordinator owns another. Once the script is exhausted every command is
/// answered with `{"status":"ok"}` (or the configured default).
#[derive(Clone)]
pub struct ScriptedChannel {
    inner: Arc<Mutex<ScriptedChannelInner>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptedChannelInner {
                replies: VecDeque::new(),
                default_reply: json!({ "status": "ok" }),
                sent: Vec::new(),
            })),
        }
    }

    /// Queue a reply body
    pub fn reply(&self, body: Value) -> &Self {
        self.inner.lock().replies.push_back(Reply::Body(body));
        self
    }

    /// Queue a transport failure (timeout)
    pub fn fail(&self) -> &Self {
        self.inner.lock().replies.push_back(Reply::TransportFailure);
        self
    }

    /// Reply used once the script runs out
    pub fn set_default_reply(&self, body: Value) {
        self.inner.lock().default_reply = body;
    }

    /// Every command sent so far, in order
    pub fn sent(&self) -> Vec<Command> {
        self.inner.lock().sent.clone()
    }

    /// Opcodes sent so far, in order
    pub fn sent_codes(&self) -> Vec<u16> {
        self.inner.lock().sent.iter().map(Command::code).collect()
    }

    pub fn clear_sent(&self) {
        self.inner.lock().sent.clear();
    }
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChannel for ScriptedChannel {
    fn send(&mut self, command: &Command) -> Result<CommandResponse> {
        let mut inner = self.inner.lock();
        inner.sent.push(command.clone());

        let body = match inner.replies.pop_front() {
            Some(Reply::Body(body)) => body,
            Some(Reply::TransportFailure) => return Err(Error::Timeout),
            None => inner.default_reply.clone(),
        };
        CommandResponse::parse(&body.to_string())
    }
}
