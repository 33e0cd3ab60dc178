//! Ordering key for the simulation event queue.

use crate::NodeIndex;
use std::time::Duration;

/// Processing priority for events scheduled at the same instant.
///
/// Lower values run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventPriority {
    /// Events a node enqueued for itself.
    Internal = 0,
    /// Timer expirations.
    Timer = 1,
    /// Message deliveries.
    Network = 2,
}

/// Key for ordering events in the simulation queue.
///
/// Events are ordered by time, then priority, then node, then insertion
/// sequence, which makes the run fully deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    /// When the event fires.
    pub time: Duration,
    /// Tie-break between event kinds.
    pub priority: EventPriority,
    /// Node that processes the event.
    pub node: NodeIndex,
    /// Insertion order.
    pub sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_ordering() {
        let at = |ms, priority, node, sequence| EventKey {
            time: Duration::from_millis(ms),
            priority,
            node,
            sequence,
        };

        let mut queue = BTreeMap::new();
        queue.insert(at(5, EventPriority::Network, 0, 0), "late");
        queue.insert(at(1, EventPriority::Network, 1, 1), "net");
        queue.insert(at(1, EventPriority::Timer, 2, 2), "timer");
        queue.insert(at(1, EventPriority::Internal, 3, 3), "internal");

        let order: Vec<_> = queue.values().copied().collect();
        assert_eq!(order, vec!["internal", "timer", "net", "late"]);
    }
}
