//! Detector configuration.

use crate::ResponseDelayPolicy;
use echofd_types::{NodeId, ParamsError, QuorumParams};
use std::time::Duration;
use thiserror::Error;

/// Default interval between quorum re-checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default interval between "system ready" checks before the first round.
pub const DEFAULT_READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors that can occur when validating a detector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Invalid quorum parameters.
    #[error(transparent)]
    Params(#[from] ParamsError),

    /// The local node is not part of the cluster.
    #[error("local node {id} is outside the cluster of {n} nodes")]
    UnknownLocalNode { id: NodeId, n: usize },

    /// A zero poll interval would busy-loop.
    #[error("poll interval must be non-zero")]
    ZeroPollInterval,
}

/// Configuration for one node's failure detector.
///
/// Everything here is fixed at construction.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// This node.
    pub local_id: NodeId,

    /// Cluster size, Byzantine bound and admissibility threshold.
    pub params: QuorumParams,

    /// Upper bound on how long the round driver waits between quorum checks.
    pub poll_interval: Duration,

    /// Interval between "system ready" checks before the first round.
    pub ready_poll_interval: Duration,

    /// Artificial reply latency per node.
    pub response_delay: ResponseDelayPolicy,
}

impl DetectorConfig {
    /// Create a config with default intervals and no response delay.
    pub fn new(local_id: NodeId, params: QuorumParams) -> Self {
        Self {
            local_id,
            params,
            poll_interval: DEFAULT_POLL_INTERVAL,
            ready_poll_interval: DEFAULT_READY_POLL_INTERVAL,
            response_delay: ResponseDelayPolicy::none(),
        }
    }

    /// Set the quorum poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the ready poll interval.
    pub fn with_ready_poll_interval(mut self, interval: Duration) -> Self {
        self.ready_poll_interval = interval;
        self
    }

    /// Set the response delay policy.
    pub fn with_response_delay(mut self, policy: ResponseDelayPolicy) -> Self {
        self.response_delay = policy;
        self
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.params.contains(self.local_id) {
            return Err(ConfigError::UnknownLocalNode {
                id: self.local_id,
                n: self.params.n(),
            });
        }
        if self.poll_interval.is_zero() || self.ready_poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let params = QuorumParams::new(4, 1, 3).unwrap();
        assert!(DetectorConfig::new(NodeId(3), params).validate().is_ok());

        assert_eq!(
            DetectorConfig::new(NodeId(4), params).validate(),
            Err(ConfigError::UnknownLocalNode { id: NodeId(4), n: 4 })
        );

        assert_eq!(
            DetectorConfig::new(NodeId(0), params)
                .with_poll_interval(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroPollInterval)
        );
    }
}
