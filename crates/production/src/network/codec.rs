//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! Token messages are plain JSON objects:
//!
//! ```text
//! {"type":"FD_MESSAGE","sender":<id>,"data":{"token":<u64>,"owner_id":<id>}}
//! ```
//!
//! The `type` tag is checked on decode, so a payload meant for another
//! module on the same link never reaches the detector.

use echofd_types::FdMessage;
use thiserror::Error;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Message too short")]
    MessageTooShort,

    #[error("JSON decode error: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("JSON encode error: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Encode a token message to wire format.
pub fn encode_message(message: &FdMessage) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(message).map_err(CodecError::Encode)
}

/// Decode a token message from wire format.
pub fn decode_message(data: &[u8]) -> Result<FdMessage, CodecError> {
    if data.is_empty() {
        return Err(CodecError::MessageTooShort);
    }
    serde_json::from_slice(data).map_err(CodecError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use echofd_types::{EpochToken, NodeId};

    #[test]
    fn test_encode_matches_wire_shape() {
        let message = FdMessage::new(NodeId(2), EpochToken(1_700_000_000), NodeId(0));
        let bytes = encode_message(&message).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "type": "FD_MESSAGE",
                "sender": 2,
                "data": { "token": 1_700_000_000u64, "owner_id": 0 }
            })
        );
        assert_eq!(decode_message(&bytes).unwrap(), message);
    }

    #[test]
    fn test_decode_accepts_foreign_encoder() {
        let raw = br#"{"data":{"owner_id":4,"token":99},"sender":1,"type":"FD_MESSAGE"}"#;
        let message = decode_message(raw).unwrap();

        assert_eq!(message.sender, NodeId(1));
        assert_eq!(message.token(), EpochToken(99));
        assert_eq!(message.owner_id(), NodeId(4));
    }

    #[test]
    fn test_decode_rejects_other_message_types() {
        let raw = br#"{"type":"CONSENSUS_MESSAGE","sender":1,"data":{"token":1,"owner_id":1}}"#;
        assert!(matches!(decode_message(raw), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        assert!(matches!(decode_message(b""), Err(CodecError::MessageTooShort)));
        assert!(matches!(
            decode_message(br#"{"type":"FD_MESSAGE","sender":1}"#),
            Err(CodecError::Decode(_))
        ));
        assert!(matches!(
            decode_message(br#"{"type":"FD_MESSAGE","sender":-1,"data":{"token":1,"owner_id":1}}"#),
            Err(CodecError::Decode(_))
        ));
    }
}
