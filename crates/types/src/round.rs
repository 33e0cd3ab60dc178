//! Round results and diagnostic snapshots.

use crate::{EpochToken, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of the most recently completed round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    /// Token that was active during the round.
    pub token: EpochToken,
    /// Peers that echoed at least once during the round, plus self.
    pub correct_processors: BTreeSet<NodeId>,
}

impl RoundResult {
    /// Check if the result is at least as fresh as `timestamp`.
    pub fn is_fresh_as_of(&self, timestamp: EpochToken) -> bool {
        self.token >= timestamp
    }
}

/// Diagnostic view of a detector. Not used for protocol decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorSnapshot {
    /// Local node.
    pub self_id: NodeId,
    /// Token of the round in progress.
    pub current_token: EpochToken,
    /// Echo count per peer for the round in progress.
    pub counters: BTreeMap<NodeId, u64>,
    /// Last published round, if any.
    pub last_result: Option<RoundResult>,
    /// Admissibility threshold K.
    pub admissibility_threshold: u64,
    /// Total nodes.
    pub n: usize,
    /// Byzantine bound.
    pub f: usize,
    /// `n - 2f`.
    pub quorum_size: usize,
    /// Rounds completed since start.
    pub rounds_completed: u64,
}
