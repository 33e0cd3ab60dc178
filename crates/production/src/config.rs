//! Cluster configuration for the production runner.
//!
//! Loaded from TOML:
//!
//! ```toml
//! n = 6
//! f = 1
//! k = 3
//! poll_interval_ms = 100
//! duration_secs = 10
//!
//! [[slow_nodes]]
//! node = 0
//! delay_ms = 1000
//! ```

use echofd_detector::{
    ConfigError, DetectorConfig, ResponseDelayPolicy, DEFAULT_POLL_INTERVAL,
    DEFAULT_READY_POLL_INTERVAL,
};
use echofd_types::{NodeId, ParamsError, QuorumParams, DEFAULT_ADMISSIBILITY_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default bound on a single send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors loading a cluster configuration.
#[derive(Debug, Error)]
pub enum ClusterConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error(transparent)]
    Detector(#[from] ConfigError),
}

/// An artificial reply delay for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowNode {
    pub node: u64,
    pub delay_ms: u64,
}

/// Settings shared by every node of a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Cluster size.
    pub n: usize,
    /// Byzantine bound.
    pub f: usize,
    /// Admissibility threshold.
    pub k: u64,
    pub poll_interval_ms: u64,
    pub ready_poll_interval_ms: u64,
    pub send_timeout_ms: u64,
    /// How long the demo cluster runs.
    pub duration_secs: u64,
    pub slow_nodes: Vec<SlowNode>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            n: 4,
            f: 1,
            k: DEFAULT_ADMISSIBILITY_THRESHOLD,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            ready_poll_interval_ms: DEFAULT_READY_POLL_INTERVAL.as_millis() as u64,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT.as_millis() as u64,
            duration_secs: 10,
            slow_nodes: Vec::new(),
        }
    }
}

impl ClusterConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ClusterConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ClusterConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ClusterConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Validated quorum parameters.
    pub fn params(&self) -> Result<QuorumParams, ParamsError> {
        QuorumParams::new(self.n, self.f, self.k)
    }

    /// Reply delays keyed by node.
    pub fn response_delay(&self) -> ResponseDelayPolicy {
        self.slow_nodes
            .iter()
            .map(|slow| (NodeId(slow.node), Duration::from_millis(slow.delay_ms)))
            .collect()
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Detector configuration for one node of this cluster.
    pub fn detector_config(
        &self,
        local_id: NodeId,
    ) -> Result<DetectorConfig, ClusterConfigError> {
        let config = DetectorConfig::new(local_id, self.params()?)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_ready_poll_interval(Duration::from_millis(self.ready_poll_interval_ms))
            .with_response_delay(self.response_delay());
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = ClusterConfig::from_toml_str("n = 6\nf = 1\n").unwrap();

        assert_eq!(config.n, 6);
        assert_eq!(config.k, DEFAULT_ADMISSIBILITY_THRESHOLD);
        assert_eq!(config.poll_interval_ms, 100);
        assert!(config.slow_nodes.is_empty());
        assert_eq!(config.params().unwrap().quorum_size(), 4);
    }

    #[test]
    fn test_slow_nodes_become_delay_policy() {
        let text = r#"
            n = 6
            f = 1

            [[slow_nodes]]
            node = 0
            delay_ms = 1000
        "#;
        let config = ClusterConfig::from_toml_str(text).unwrap();
        let policy = config.response_delay();

        assert_eq!(policy.delay_for(NodeId(0)), Duration::from_secs(1));
        assert_eq!(policy.delay_for(NodeId(1)), Duration::ZERO);

        let node0 = config.detector_config(NodeId(0)).unwrap();
        assert_eq!(node0.response_delay.delay_for(NodeId(0)), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_cluster_rejected() {
        let config = ClusterConfig::from_toml_str("n = 4\nf = 2\n").unwrap();
        assert!(matches!(
            config.detector_config(NodeId(0)),
            Err(ClusterConfigError::Params(_))
        ));

        let config = ClusterConfig::default();
        assert!(matches!(
            config.detector_config(NodeId(9)),
            Err(ClusterConfigError::Detector(ConfigError::UnknownLocalNode { .. }))
        ));

        assert!(matches!(
            ClusterConfig::from_toml_str("n = \"six\""),
            Err(ClusterConfigError::Parse(_))
        ));
    }
}
