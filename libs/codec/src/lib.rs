//! # HRV Protocol Codec
//!
//! ## Purpose
//!
//! The "rules" layer of the HRV client: the fixed key vocabulary of the unit,
//! the line grammar and the structured view of vector payloads. Everything in
//! here is pure and stateless; connection handling lives in `hrv-client`.
//!
//! ## Wire Format
//!
//! ```text
//! #MF: 1+ 0+ 2+30\r     report      key=MF payload="1+ 0+ 2+30"
//! #$MF:1\r              ack ok      context=AckOk
//! #!MF:\r               ack error   context=AckError, empty payload
//! #:\r                  start sentinel sent by the client after connecting
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Socket management or reconnection
//! - Interpretation of payloads beyond trimming (see [`SystemProperty`])
//!
//! ## Example
//!
//! ```rust
//! use hrv_codec::{DataKey, Message, MessageContext, PropertyValue, SystemProperty};
//!
//! let message = Message::decode("#MF: 1+ 0+ 2+30\r").unwrap();
//! assert_eq!(message.key, DataKey::ModeFan);
//! assert_eq!(message.context, MessageContext::None);
//!
//! let property = SystemProperty::from(&message);
//! assert_eq!(property.extra, Some(PropertyValue::Integer(30)));
//! ```

#![warn(missing_docs)]

pub mod constants;
pub mod error;
pub mod keys;
pub mod message;
pub mod property;

pub use constants::{KEEPALIVE, START_STREAMING};
pub use error::{CodecError, CodecResult};
pub use keys::DataKey;
pub use message::{Message, MessageContext};
pub use property::{PropertyValue, SystemProperty};
