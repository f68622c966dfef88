//! Codec for encoding and decoding roomcast messages.
//!
//! Messages travel as JSON text. Outbound messages are encoded once into
//! [`Bytes`] so the same buffer can be handed to every recipient.

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::messages::{fields, types, ClientMessage, RelayMessage, ServerMessage};

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The text is not valid JSON, or encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The message is valid JSON but not an object.
    #[error("Message is not a JSON object")]
    NotAnObject,

    /// The `type` field is missing or not a string.
    #[error("Message has no string `type` field")]
    MissingType,

    /// A `setTopic` message without a `payload`.
    #[error("`{0}` message has no `payload` field")]
    MissingPayload(&'static str),

}

/// Encode a server message.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(message: &ServerMessage) -> Result<Bytes, ProtocolError> {
    Ok(Bytes::from(serde_json::to_vec(message)?))
}

/// Encode a relay message.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_relay(message: &RelayMessage) -> Result<Bytes, ProtocolError> {
    Ok(Bytes::from(serde_json::to_vec(message)?))
}

/// Decode a message received from a client.
///
/// # Errors
///
/// Returns an error if the text is not a JSON object with a string `type`,
/// or if it is a `setTopic` without a `payload`.
pub fn decode(text: &str) -> Result<ClientMessage, ProtocolError> {
    let Value::Object(mut object) = serde_json::from_str::<Value>(text)? else {
        return Err(ProtocolError::NotAnObject);
    };

    let is_set_topic = match object.get(fields::TYPE) {
        Some(Value::String(kind)) => kind == types::SET_TOPIC,
        _ => return Err(ProtocolError::MissingType),
    };

    if is_set_topic {
        return object
            .remove(fields::PAYLOAD)
            .map(ClientMessage::SetTopic)
            .ok_or(ProtocolError::MissingPayload(types::SET_TOPIC));
    }

    Ok(ClientMessage::Relay(RelayMessage::from_fields(object)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Target;
    use serde_json::json;

    #[test]
    fn test_decode_set_topic() {
        let msg = decode(r#"{"type":"setTopic","payload":{"title":"t2"}}"#).unwrap();
        assert_eq!(msg, ClientMessage::SetTopic(json!({"title": "t2"})));
    }

    #[test]
    fn test_decode_set_topic_null_payload() {
        let msg = decode(r#"{"type":"setTopic","payload":null}"#).unwrap();
        assert_eq!(msg, ClientMessage::SetTopic(Value::Null));
    }

    #[test]
    fn test_decode_relay_keeps_fields() {
        let msg = decode(r#"{"type":"offer","target":"b","payload":"sdp","extra":1}"#).unwrap();
        let ClientMessage::Relay(relay) = msg else {
            panic!("expected relay message");
        };
        assert_eq!(relay.kind(), "offer");
        assert_eq!(relay.target(), Target::Client("b"));
        let value = serde_json::to_value(&relay).unwrap();
        assert_eq!(value["payload"], "sdp");
        assert_eq!(value["extra"], 1);
    }

    #[test]
    fn test_decode_relay_without_payload() {
        let msg = decode(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg.kind(), "ping");
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        assert!(matches!(decode("{not json"), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(matches!(decode("[1,2]"), Err(ProtocolError::NotAnObject)));
        assert!(matches!(decode("\"ping\""), Err(ProtocolError::NotAnObject)));
    }

    #[test]
    fn test_decode_rejects_missing_type() {
        assert!(matches!(
            decode(r#"{"payload":1}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            decode(r#"{"type":7}"#),
            Err(ProtocolError::MissingType)
        ));
    }

    #[test]
    fn test_decode_rejects_set_topic_without_payload() {
        assert!(matches!(
            decode(r#"{"type":"setTopic"}"#),
            Err(ProtocolError::MissingPayload("setTopic"))
        ));
    }

    #[test]
    fn test_decode_accepts_non_string_target() {
        for text in [
            r#"{"type":"ping","target":42}"#,
            r#"{"type":"ping","target":null}"#,
            r#"{"type":"ping","target":{"id":"b"}}"#,
        ] {
            let ClientMessage::Relay(relay) = decode(text).unwrap() else {
                panic!("expected relay message");
            };
            assert_eq!(relay.target(), Target::Unaddressable);
        }
    }

    #[test]
    fn test_encode_relay_with_stamp() {
        let ClientMessage::Relay(mut relay) = decode(r#"{"type":"ping"}"#).unwrap() else {
            panic!("expected relay message");
        };
        relay.stamp_sender("a");

        let encoded = encode_relay(&relay).unwrap();
        let value: Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(value, json!({"type": "ping", "clientid": "a"}));
    }

    #[test]
    fn test_encode_server_message() {
        let encoded = encode(&ServerMessage::client_join("b")).unwrap();
        let value: Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(value, json!({"type": "clientJoin", "payload": "b"}));
    }
}
