//! # HRV Codec Integration Tests
//!
//! Public API checks plus property tests for the line grammar:
//! - encode/decode round-trips for every key in the vocabulary
//! - vector payload coercion for arbitrary integer positions
//! - decoding never panics on arbitrary input

use hrv_codec::{
    CodecError, DataKey, Message, MessageContext, PropertyValue, SystemProperty, KEEPALIVE,
    START_STREAMING,
};
use proptest::prelude::*;

fn any_key() -> impl Strategy<Value = DataKey> {
    prop::sample::select(DataKey::all().to_vec())
}

fn any_context() -> impl Strategy<Value = MessageContext> {
    prop_oneof![
        Just(MessageContext::None),
        Just(MessageContext::AckOk),
        Just(MessageContext::AckError),
    ]
}

/// Payloads free of the separator and terminator characters
fn wire_safe_payload() -> impl Strategy<Value = String> {
    "[A-Za-z0-9+. -]{0,24}"
}

proptest! {
    /// Property: decode(encode(m)) reproduces key and trimmed payload
    #[test]
    fn round_trip_preserves_key_and_payload(
        key in any_key(),
        payload in wire_safe_payload(),
    ) {
        let message = Message::new(key, payload.clone());
        let decoded = Message::decode(&message.encode()).unwrap();

        prop_assert_eq!(decoded.key, key);
        prop_assert_eq!(decoded.payload, payload.trim());
        prop_assert_eq!(decoded.context, MessageContext::None);
    }

    /// Property: acknowledgement markers survive a round trip
    #[test]
    fn round_trip_preserves_context(
        key in any_key(),
        context in any_context(),
        payload in "[0-9]{1,3}",
    ) {
        let message = Message::with_context(key, payload, context);
        let decoded: Message = message.encode().parse().unwrap();
        prop_assert_eq!(decoded, message);
    }

    /// Property: integer vectors decode position by position
    #[test]
    fn integer_vectors_decode_positionally(
        positions in prop::collection::vec(0i64..10_000, 1..6),
    ) {
        let payload = positions
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join("+ ");
        let property = SystemProperty::from_payload(DataKey::ModeFan, &payload);
        let decoded = [property.value, property.min, property.max, property.extra];

        for (index, slot) in decoded.iter().enumerate() {
            let expected = positions.get(index).map(|p| PropertyValue::Integer(*p));
            prop_assert_eq!(slot.clone(), expected);
        }
    }

    /// Property: arbitrary input never panics the decoder
    #[test]
    fn decode_is_total(raw in "\\PC{0,32}") {
        let _ = Message::decode(&raw);
    }
}

#[test]
fn test_protocol_sentinels() {
    assert_eq!(START_STREAMING, "#:\r");
    assert_eq!(KEEPALIVE, "PONG\r");

    // Neither sentinel is a data message
    assert!(Message::decode(START_STREAMING).is_err());
    assert!(matches!(
        Message::decode(KEEPALIVE),
        Err(CodecError::MalformedMessage { .. })
    ));
}

#[test]
fn test_end_to_end_examples() {
    let report = Message::decode("#MF: 1+ 0+ 2+30\r").unwrap();
    assert_eq!(report.key, DataKey::ModeFan);
    assert_eq!(report.payload, "1+ 0+ 2+30");
    assert_eq!(report.context, MessageContext::None);

    let property = SystemProperty::from(&report);
    assert_eq!(property.value, Some(PropertyValue::Integer(1)));
    assert_eq!(property.min, Some(PropertyValue::Integer(0)));
    assert_eq!(property.max, Some(PropertyValue::Integer(2)));
    assert_eq!(property.extra, Some(PropertyValue::Integer(30)));

    let ack = Message::decode("#$MF:1\r").unwrap();
    assert_eq!(ack.context, MessageContext::AckOk);
    assert_eq!(ack.payload, "1");

    let nack = Message::decode("#!MF:\r").unwrap();
    assert_eq!(nack.context, MessageContext::AckError);
    assert_eq!(nack.payload, "");
}

#[test]
fn test_error_messages_carry_input() {
    let err = Message::decode("garbage").unwrap_err();
    assert!(err.to_string().contains("garbage"));

    let err = Message::decode("#XX:1").unwrap_err();
    assert_eq!(err.to_string(), "Unrecognized key \"XX\"");
}
