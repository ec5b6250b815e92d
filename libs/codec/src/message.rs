//! # Message Encoding and Decoding
//!
//! Stateless translation between one protocol line and a [`Message`]. The
//! payload is only trimmed, never interpreted: turning `"1+ 0+ 2+30"` into
//! numbers is the job of [`crate::SystemProperty`], applied by callers that
//! want structured values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{ACK_ERROR, ACK_OK, MESSAGE_END, MESSAGE_START, PAYLOAD_START};
use crate::error::{CodecError, CodecResult};
use crate::keys::DataKey;

/// Acknowledgement context of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageContext {
    /// Unsolicited report or outgoing command
    #[default]
    None,
    /// The unit accepted a previously sent command
    AckOk,
    /// The unit rejected a previously sent command
    AckError,
}

impl MessageContext {
    /// Character written after `#` for this context, if any
    pub fn marker(&self) -> Option<char> {
        match self {
            MessageContext::None => None,
            MessageContext::AckOk => Some(ACK_OK),
            MessageContext::AckError => Some(ACK_ERROR),
        }
    }

    fn from_marker(c: char) -> Option<Self> {
        match c {
            ACK_OK => Some(MessageContext::AckOk),
            ACK_ERROR => Some(MessageContext::AckError),
            _ => None,
        }
    }
}

/// One decoded protocol line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Property the line refers to
    pub key: DataKey,
    /// Raw payload, whitespace trimmed
    pub payload: String,
    /// Acknowledgement context
    pub context: MessageContext,
}

impl Message {
    /// Create a message without acknowledgement context
    pub fn new(key: DataKey, payload: impl Into<String>) -> Self {
        Self::with_context(key, payload, MessageContext::None)
    }

    /// Create a message with an explicit context
    pub fn with_context(key: DataKey, payload: impl Into<String>, context: MessageContext) -> Self {
        Self {
            key,
            payload: payload.into(),
            context,
        }
    }

    /// Decode one protocol line.
    ///
    /// The trailing `\r` is optional since some transports strip it. Fails
    /// with [`CodecError::MalformedMessage`] when the line lacks the `#` start
    /// or the `:` separator, and with [`CodecError::UnrecognizedKey`] when
    /// the key is outside the vocabulary.
    pub fn decode(raw: &str) -> CodecResult<Self> {
        let line = raw.trim_end_matches(|c: char| c == MESSAGE_END || c == '\n');

        let body = line
            .strip_prefix(MESSAGE_START)
            .ok_or_else(|| CodecError::malformed(raw, "missing '#' message start"))?;

        let mut chars = body.chars();
        let (context, body) = match chars.next().and_then(MessageContext::from_marker) {
            Some(context) => (context, chars.as_str()),
            None => (MessageContext::None, body),
        };

        let (key, payload) = body
            .split_once(PAYLOAD_START)
            .ok_or_else(|| CodecError::malformed(raw, "missing ':' payload separator"))?;

        Ok(Self {
            key: key.parse()?,
            payload: payload.trim().to_string(),
            context,
        })
    }

    /// Encode to wire text, including the `\r` terminator
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.payload.len() + 8);
        out.push(MESSAGE_START);
        if let Some(marker) = self.context.marker() {
            out.push(marker);
        }
        out.push_str(self.key.as_str());
        out.push(PAYLOAD_START);
        out.push_str(&self.payload);
        out.push(MESSAGE_END);
        out
    }

    /// Whether this line acknowledges a command
    pub fn is_ack(&self) -> bool {
        self.context != MessageContext::None
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Message {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
