//! In-process network over tokio channels.
//!
//! Every node gets an unbounded inbox of encoded frames. Messages go
//! through the wire codec on both ends so the in-process cluster
//! exercises the same encoding as a real link.

use super::{decode_message, encode_message, Transport, TransportError};
use crate::FailureDetector;
use async_trait::async_trait;
use echofd_types::{FdMessage, NodeId};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Inbound frames for one node.
pub type Inbox = mpsc::UnboundedReceiver<Vec<u8>>;

#[derive(Debug)]
struct Shared {
    senders: Vec<mpsc::UnboundedSender<Vec<u8>>>,
    running: AtomicBool,
    /// Nodes whose links are cut in both directions.
    disconnected: RwLock<BTreeSet<NodeId>>,
}

/// Handle to an in-process network of `n` nodes.
#[derive(Debug, Clone)]
pub struct InMemoryNetwork {
    shared: Arc<Shared>,
}

impl InMemoryNetwork {
    /// Create a network and the inbox of every node, indexed by node id.
    ///
    /// The network starts in the running state.
    pub fn new(n: usize) -> (Self, Vec<Inbox>) {
        let (senders, inboxes): (Vec<_>, Vec<_>) = (0..n)
            .map(|_| mpsc::unbounded_channel::<Vec<u8>>())
            .unzip();
        let network = Self {
            shared: Arc::new(Shared {
                senders,
                running: AtomicBool::new(true),
                disconnected: RwLock::new(BTreeSet::new()),
            }),
        };
        (network, inboxes)
    }

    /// Get the transport a node sends through.
    pub fn transport(&self, local: NodeId) -> InMemoryTransport {
        InMemoryTransport {
            local,
            shared: self.shared.clone(),
        }
    }

    /// Set what `system_running` reports to every node.
    pub fn set_running(&self, running: bool) {
        self.shared.running.store(running, Ordering::SeqCst);
    }

    /// Cut every link to and from `node`.
    pub fn disconnect(&self, node: NodeId) {
        self.shared.disconnected.write().insert(node);
    }

    /// Restore the links of `node`.
    pub fn reconnect(&self, node: NodeId) {
        self.shared.disconnected.write().remove(&node);
    }
}

/// One node's view of an [`InMemoryNetwork`].
#[derive(Debug, Clone)]
pub struct InMemoryTransport {
    local: NodeId,
    shared: Arc<Shared>,
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send_to_node(
        &self,
        to: NodeId,
        message: FdMessage,
        _reliable: bool,
    ) -> Result<(), TransportError> {
        {
            let disconnected = self.shared.disconnected.read();
            if disconnected.contains(&self.local) || disconnected.contains(&to) {
                return Err(TransportError::Unreachable(to));
            }
        }
        let sender = self
            .shared
            .senders
            .get(to.index())
            .ok_or(TransportError::Unreachable(to))?;
        let frame = encode_message(&message)?;
        sender.send(frame).map_err(|_| TransportError::Closed)
    }

    fn system_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

/// Feed a node's inbox into its detector until cancelled or the inbox
/// closes. Each message is handled on its own task.
pub async fn pump_inbox<T: Transport>(
    detector: FailureDetector<T>,
    mut inbox: Inbox,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = inbox.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        match decode_message(&frame) {
            Ok(message) => detector.spawn_on_msg_recv(message),
            Err(e) => warn!(
                node = detector.local_id().0,
                error = %e,
                "Dropping undecodable frame"
            ),
        }
    }
    debug!(node = detector.local_id().0, "Inbox pump stopped");
}
