//! The transport collaborator the detector sends through.

use super::CodecError;
use async_trait::async_trait;
use echofd_types::{FdMessage, NodeId};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by a single send.
///
/// None of these are fatal to the detector: a failed send is logged and
/// counted, and the round keeps waiting on the other peers.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Peer {0} is unreachable")]
    Unreachable(NodeId),

    #[error("Send to {peer} timed out after {timeout:?}")]
    Timeout { peer: NodeId, timeout: Duration },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport closed")]
    Closed,
}

/// Point-to-point delivery of token messages.
///
/// Implementations own connection management. The detector only ever
/// addresses peers by id and never retries a failed send itself.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send one message to one peer.
    async fn send_to_node(
        &self,
        to: NodeId,
        message: FdMessage,
        reliable: bool,
    ) -> Result<(), TransportError>;

    /// Whether the surrounding system is up. Only consulted before the
    /// first round starts.
    fn system_running(&self) -> bool;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send_to_node(
        &self,
        to: NodeId,
        message: FdMessage,
        reliable: bool,
    ) -> Result<(), TransportError> {
        (**self).send_to_node(to, message, reliable).await
    }

    fn system_running(&self) -> bool {
        (**self).system_running()
    }
}
