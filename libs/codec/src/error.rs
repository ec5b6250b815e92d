//! Protocol-level errors for HRV line decoding
//!
//! Decoding failures are local: a bad line is logged and skipped by the
//! caller, it never takes the connection down. The two variants are kept
//! distinct because an unknown key is routine (firmware revisions add keys)
//! while a malformed line usually points at transport noise.

use thiserror::Error;

/// Line decoding errors with the offending input attached
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Line does not follow `#[$|!]key:payload`
    #[error("Malformed message {raw:?}: {reason}")]
    MalformedMessage {
        /// The raw line as received
        raw: String,
        /// What the decoder expected to find
        reason: &'static str,
    },

    /// Line is well formed but the key is outside the known vocabulary
    #[error("Unrecognized key {key:?}")]
    UnrecognizedKey {
        /// The key exactly as it appeared on the wire (trimmed)
        key: String,
    },
}

impl CodecError {
    /// Construct a malformed-message error
    pub fn malformed(raw: impl Into<String>, reason: &'static str) -> Self {
        Self::MalformedMessage {
            raw: raw.into(),
            reason,
        }
    }

    /// Whether this error only signals a key the vocabulary does not cover
    pub fn is_unrecognized_key(&self) -> bool {
        matches!(self, Self::UnrecognizedKey { .. })
    }
}

/// Result type for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;
