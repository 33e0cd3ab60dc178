//! Artificial response latency for fault-injection scenarios.

use echofd_types::NodeId;
use std::collections::BTreeMap;
use std::time::Duration;

/// Per-node artificial delay applied to every reply that node sends.
///
/// Used to emulate slow or partially faulty peers. Nodes without an
/// entry reply immediately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseDelayPolicy {
    delays: BTreeMap<NodeId, Duration>,
}

impl ResponseDelayPolicy {
    /// A policy that never delays.
    pub fn none() -> Self {
        Self::default()
    }

    /// Delay every reply sent by `node`.
    pub fn with_delay(mut self, node: NodeId, delay: Duration) -> Self {
        if delay.is_zero() {
            self.delays.remove(&node);
        } else {
            self.delays.insert(node, delay);
        }
        self
    }

    /// Delay applied to replies sent by `node`.
    pub fn delay_for(&self, node: NodeId) -> Duration {
        self.delays.get(&node).copied().unwrap_or(Duration::ZERO)
    }

    /// Check if no node is delayed.
    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }
}

impl FromIterator<(NodeId, Duration)> for ResponseDelayPolicy {
    fn from_iter<T: IntoIterator<Item = (NodeId, Duration)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::none(), |policy, (node, delay)| policy.with_delay(node, delay))
    }
}
