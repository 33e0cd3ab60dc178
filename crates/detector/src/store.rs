//! Last published round result and its freshness queries.

use echofd_types::{EpochToken, NodeId, RoundResult};
use std::collections::BTreeSet;

/// Holds the most recently completed round.
///
/// Empty until the first round completes. Each publish overwrites the
/// previous result; results never merge across rounds.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    last: Option<RoundResult>,
}

impl ResultStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored result.
    pub fn publish(&mut self, result: RoundResult) {
        self.last = Some(result);
    }

    /// The last published result.
    pub fn last(&self) -> Option<&RoundResult> {
        self.last.as_ref()
    }

    /// Correct processors of the last completed round, or empty.
    pub fn last_correct_processors(&self) -> BTreeSet<NodeId> {
        self.last
            .as_ref()
            .map(|result| result.correct_processors.clone())
            .unwrap_or_default()
    }

    /// Correct processors of the last round if its token is at least
    /// `timestamp`; empty otherwise.
    pub fn correct_processors_as_of(&self, timestamp: EpochToken) -> BTreeSet<NodeId> {
        match &self.last {
            Some(result) if result.is_fresh_as_of(timestamp) => {
                result.correct_processors.clone()
            }
            _ => BTreeSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(token: u64, ids: &[u64]) -> RoundResult {
        RoundResult {
            token: EpochToken(token),
            correct_processors: ids.iter().copied().map(NodeId).collect(),
        }
    }

    #[test]
    fn test_empty_before_first_round() {
        let store = ResultStore::new();
        assert!(store.last().is_none());
        assert!(store.last_correct_processors().is_empty());
        assert!(store.correct_processors_as_of(EpochToken::ZERO).is_empty());
    }

    #[test]
    fn test_freshness() {
        let mut store = ResultStore::new();
        store.publish(result(10, &[0, 1, 2, 3, 4]));

        assert_eq!(store.correct_processors_as_of(EpochToken(9)).len(), 5);
        assert_eq!(store.correct_processors_as_of(EpochToken(10)).len(), 5);
        assert!(store.correct_processors_as_of(EpochToken(11)).is_empty());
    }

    #[test]
    fn test_publish_overwrites() {
        let mut store = ResultStore::new();
        store.publish(result(10, &[0, 1, 2, 3, 4]));
        store.publish(result(20, &[0, 2]));

        let expected: BTreeSet<_> = [0, 2].into_iter().map(NodeId).collect();
        assert_eq!(store.last_correct_processors(), expected);
        assert_eq!(store.last().unwrap().token, EpochToken(20));
    }
}
