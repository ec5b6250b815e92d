//! # Protocol Constants
//!
//! Separators and fixed lines of the HRV unit's text protocol. The grammar is
//! dictated by the unit firmware and must not drift:
//!
//! ```text
//! message := '#' [ '$' | '!' ] key ':' payload '\r'
//! ```

/// First character of every message
pub const MESSAGE_START: char = '#';

/// Context marker for a successful command acknowledgement
pub const ACK_OK: char = '$';

/// Context marker for a rejected command acknowledgement
pub const ACK_ERROR: char = '!';

/// Separates the key from the payload
pub const PAYLOAD_START: char = ':';

/// Line terminator (may already be stripped by the transport)
pub const MESSAGE_END: char = '\r';

/// Separates `value+min+max[+extra]` positions in vector payloads
pub const VECTOR_SEPARATOR: char = '+';

/// Prefix that marks scalar keys in the vocabulary
pub const SCALAR_PREFIX: char = '*';

/// Sent right after the handshake; the unit streams nothing until it sees this
pub const START_STREAMING: &str = "#:\r";

/// Periodic keepalive line expected by the unit
pub const KEEPALIVE: &str = "PONG\r";

/// Number of positions a vector payload carries at most
pub const MAX_VECTOR_POSITIONS: usize = 4;
