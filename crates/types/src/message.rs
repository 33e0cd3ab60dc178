//! The failure-detector wire message.
//!
//! ```text
//! {"type": "FD_MESSAGE", "sender": 3, "data": {"token": 1700000000, "owner_id": 0}}
//! ```

use crate::{EpochToken, NodeId};
use serde::{Deserialize, Serialize};

/// Message type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Token broadcast or echo.
    #[serde(rename = "FD_MESSAGE")]
    FdMessage,
}

/// Token payload: the token and the node that minted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenData {
    /// The epoch token.
    pub token: EpochToken,
    /// Node that minted `token`.
    pub owner_id: NodeId,
}

/// Token broadcast or echo exchanged between failure detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FdMessage {
    /// Always [`MessageType::FdMessage`].
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    /// Node that sent this copy of the token.
    pub sender: NodeId,
    /// Token and owner.
    pub data: TokenData,
}

impl FdMessage {
    /// Create a token message.
    pub fn new(sender: NodeId, token: EpochToken, owner_id: NodeId) -> Self {
        Self {
            msg_type: MessageType::FdMessage,
            sender,
            data: TokenData { token, owner_id },
        }
    }

    /// Get the token.
    pub fn token(&self) -> EpochToken {
        self.data.token
    }

    /// Get the token owner.
    pub fn owner_id(&self) -> NodeId {
        self.data.owner_id
    }

    /// Check if `node` minted this token.
    pub fn is_owned_by(&self, node: NodeId) -> bool {
        self.data.owner_id == node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let msg = FdMessage::new(NodeId(3), EpochToken(17), NodeId(0));
        let value = serde_json::to_value(msg).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "FD_MESSAGE",
                "sender": 3,
                "data": { "token": 17, "owner_id": 0 }
            })
        );
    }
}
