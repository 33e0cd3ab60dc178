//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Node identifier.
///
/// Nodes of an `n`-node cluster are numbered `0..n`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Get the raw value.
    pub fn get(&self) -> u64 {
        self.0
    }

    /// Index form, for iteration over `0..n`.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Epoch token identifying one failure-detector round.
///
/// The value is a clock reading in nanoseconds taken when the owning
/// node started the round. Tokens are only comparable with tokens and
/// timestamps taken from the same clock.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EpochToken(pub u64);

impl EpochToken {
    /// The zero token. Never minted by a running detector.
    pub const ZERO: Self = EpochToken(0);

    /// Token for a clock reading.
    pub fn from_duration(now: Duration) -> Self {
        EpochToken(u64::try_from(now.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Mint the token following `self` for a round starting at `now`.
    ///
    /// The result is strictly greater than `self` even if the clock did
    /// not advance (or went backwards).
    pub fn next_after(self, now: Duration) -> Self {
        let candidate = Self::from_duration(now);
        if candidate > self {
            candidate
        } else {
            EpochToken(self.0.saturating_add(1))
        }
    }

    /// Get the raw value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EpochToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.0)
    }
}
