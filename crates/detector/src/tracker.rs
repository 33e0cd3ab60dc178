//! Per-epoch echo counters and the quorum predicates over them.

use echofd_types::{NodeId, QuorumParams};
use std::collections::{BTreeMap, BTreeSet};

/// Tracks how often each peer echoed the current token.
///
/// Holds exactly one counter per peer (`n - 1` entries). Two distinct
/// predicates are derived from the counters:
///
/// 1. **Admissible**: a peer echoed at least `K` times. Completion of a
///    round requires `n - 2f` admissible nodes (self included).
/// 2. **Responsive**: a peer echoed at least once. This lenient set is
///    what gets published as the round's correct processors.
#[derive(Debug, Clone)]
pub struct QuorumTracker {
    local_id: NodeId,
    params: QuorumParams,
    /// peer -> echoes of the current token
    counters: BTreeMap<NodeId, u64>,
}

impl QuorumTracker {
    /// Create a tracker with all counters at zero.
    pub fn new(local_id: NodeId, params: QuorumParams) -> Self {
        let counters = params.peers_of(local_id).map(|peer| (peer, 0)).collect();
        Self {
            local_id,
            params,
            counters,
        }
    }

    /// Record one echo from `peer`.
    ///
    /// Returns the new count, or `None` if `peer` is not tracked (self or
    /// outside the cluster). Untracked peers never enter the map.
    pub fn record_echo(&mut self, peer: NodeId) -> Option<u64> {
        let count = self.counters.get_mut(&peer)?;
        *count = count.saturating_add(1);
        Some(*count)
    }

    /// Echo count of `peer` in the current epoch.
    pub fn count(&self, peer: NodeId) -> Option<u64> {
        self.counters.get(&peer).copied()
    }

    /// Check if `peer` reached the admissibility threshold.
    pub fn admissible(&self, peer: NodeId) -> bool {
        self.count(peer).is_some_and(|count| count >= self.params.k())
    }

    /// Peers that reached the admissibility threshold.
    pub fn admissible_peers(&self) -> BTreeSet<NodeId> {
        self.counters
            .iter()
            .filter(|(_, count)| **count >= self.params.k())
            .map(|(peer, _)| *peer)
            .collect()
    }

    /// Check if admissible peers plus self reach `n - 2f`.
    pub fn quorum_met(&self) -> bool {
        let admissible = self
            .counters
            .values()
            .filter(|count| **count >= self.params.k())
            .count();
        admissible + 1 >= self.params.quorum_size()
    }

    /// Peers that echoed at least once, plus self.
    pub fn responsive_peers(&self) -> BTreeSet<NodeId> {
        self.counters
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(peer, _)| *peer)
            .chain(std::iter::once(self.local_id))
            .collect()
    }

    /// Zero every counter for a new epoch.
    pub fn reset(&mut self) {
        self.counters.values_mut().for_each(|count| *count = 0);
    }

    /// All counters.
    pub fn counters(&self) -> &BTreeMap<NodeId, u64> {
        &self.counters
    }

    /// Number of tracked peers.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Check if there are no peers (single-node cluster).
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
