//! Structured decoding of `value+min+max[+extra]` payloads

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_VECTOR_POSITIONS, VECTOR_SEPARATOR};
use crate::keys::DataKey;
use crate::message::Message;

/// One coerced payload position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Digits, optionally signed
    Integer(i64),
    /// Digits with exactly one decimal point, optionally signed
    Float(f64),
    /// Anything non-numeric, kept verbatim
    Text(String),
}

impl PropertyValue {
    /// Coerce a single trimmed field. Empty fields carry no value.
    pub fn coerce(field: &str) -> Option<Self> {
        let field = field.trim();
        if field.is_empty() {
            return None;
        }

        let digits = field.strip_prefix('-').unwrap_or(field);
        let value = if is_ascii_digits(digits) {
            field.parse().map(PropertyValue::Integer).ok()
        } else if digits.matches('.').count() == 1 && is_ascii_digits(&digits.replacen('.', "", 1))
        {
            field.parse().map(PropertyValue::Float).ok()
        } else {
            None
        };

        Some(value.unwrap_or_else(|| PropertyValue::Text(field.to_string())))
    }

    /// Integer view, if this position is integral
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view covering both integers and floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Integer(v) => Some(*v as f64),
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Text(_) => None,
        }
    }

    /// Text view, if the position did not coerce to a number
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Integer(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

fn is_ascii_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Structured view of a property payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemProperty {
    /// Property the payload belongs to
    pub key: DataKey,
    /// Current value
    pub value: Option<PropertyValue>,
    /// Lower bound accepted by the unit
    pub min: Option<PropertyValue>,
    /// Upper bound accepted by the unit
    pub max: Option<PropertyValue>,
    /// Fourth position, e.g. minutes left for timed modes
    pub extra: Option<PropertyValue>,
}

impl SystemProperty {
    /// Split `payload` on `+` and coerce each position independently.
    ///
    /// Positions past the fourth are dropped; missing ones stay unset.
    pub fn from_payload(key: DataKey, payload: &str) -> Self {
        let mut positions = payload
            .split(VECTOR_SEPARATOR)
            .take(MAX_VECTOR_POSITIONS)
            .map(PropertyValue::coerce);

        Self {
            key,
            value: positions.next().flatten(),
            min: positions.next().flatten(),
            max: positions.next().flatten(),
            extra: positions.next().flatten(),
        }
    }
}

impl From<&Message> for SystemProperty {
    fn from(message: &Message) -> Self {
        Self::from_payload(message.key, &message.payload)
    }
}
