//! Byzantine quorum parameters.

use crate::NodeId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Echo count a peer must reach within one round to be admissible.
pub const DEFAULT_ADMISSIBILITY_THRESHOLD: u64 = 3;

/// Errors that can occur when validating quorum parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    /// A cluster needs at least one node.
    #[error("cluster must contain at least one node")]
    EmptyCluster,

    /// The admissibility threshold must be positive.
    #[error("admissibility threshold must be at least 1")]
    ZeroThreshold,

    /// `n - 2f` must leave a non-empty quorum.
    #[error("byzantine bound f={f} leaves no quorum for n={n} (need 2f < n)")]
    ByzantineBoundTooLarge { n: usize, f: usize },
}

/// Fixed protocol parameters: cluster size, Byzantine bound and
/// admissibility threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumParams {
    n: usize,
    f: usize,
    k: u64,
}

impl QuorumParams {
    /// Validate and build quorum parameters.
    pub fn new(n: usize, f: usize, k: u64) -> Result<Self, ParamsError> {
        if n == 0 {
            return Err(ParamsError::EmptyCluster);
        }
        if k == 0 {
            return Err(ParamsError::ZeroThreshold);
        }
        if f.saturating_mul(2) >= n {
            return Err(ParamsError::ByzantineBoundTooLarge { n, f });
        }
        Ok(Self { n, f, k })
    }

    /// Parameters with the default admissibility threshold.
    pub fn with_default_threshold(n: usize, f: usize) -> Result<Self, ParamsError> {
        Self::new(n, f, DEFAULT_ADMISSIBILITY_THRESHOLD)
    }

    /// Total number of nodes.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Maximum tolerated Byzantine nodes.
    pub fn f(&self) -> usize {
        self.f
    }

    /// Admissibility threshold K.
    pub fn k(&self) -> u64 {
        self.k
    }

    /// Nodes (self included) that must be admissible to finish a round: `n - 2f`.
    pub fn quorum_size(&self) -> usize {
        self.n - 2 * self.f
    }

    /// Check whether `id` names a node of this cluster.
    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.n as u64
    }

    /// Every node id except `local`.
    pub fn peers_of(&self, local: NodeId) -> impl Iterator<Item = NodeId> {
        (0..self.n as u64).map(NodeId).filter(move |id| *id != local)
    }
}
