//! Simulated point-to-point network.

use crate::NodeIndex;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::time::Duration;

/// Latency and loss model for the simulated network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Minimum one-way latency.
    pub base_latency: Duration,
    /// Uniform extra latency in `[0, jitter]`.
    pub jitter: Duration,
    /// Probability that a message is lost, in `[0, 1]`.
    pub packet_loss_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_latency: Duration::from_millis(10),
            jitter: Duration::from_millis(5),
            packet_loss_rate: 0.0,
        }
    }
}

impl NetworkConfig {
    /// Set the base latency.
    pub fn with_base_latency(mut self, latency: Duration) -> Self {
        self.base_latency = latency;
        self
    }

    /// Set the jitter.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the packet loss rate.
    pub fn with_packet_loss(mut self, rate: f64) -> Self {
        self.packet_loss_rate = rate.clamp(0.0, 1.0);
        self
    }
}

/// Simulated network with seeded randomness and per-node isolation.
#[derive(Debug)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    rng: ChaCha8Rng,
    /// Nodes that neither send nor receive.
    isolated: BTreeSet<NodeIndex>,
}

impl SimulatedNetwork {
    /// Create a network using `rng` for latency and loss sampling.
    pub fn new(config: NetworkConfig, rng: ChaCha8Rng) -> Self {
        Self {
            config,
            rng,
            isolated: BTreeSet::new(),
        }
    }

    /// Get the network configuration.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Cut a node off from every other node.
    pub fn isolate(&mut self, node: NodeIndex) {
        self.isolated.insert(node);
    }

    /// Reconnect an isolated node.
    pub fn heal(&mut self, node: NodeIndex) {
        self.isolated.remove(&node);
    }

    /// Check if a node is isolated.
    pub fn is_isolated(&self, node: NodeIndex) -> bool {
        self.isolated.contains(&node)
    }

    /// Sample the one-way latency for a message, or `None` if it is lost.
    pub fn delivery_latency(&mut self, from: NodeIndex, to: NodeIndex) -> Option<Duration> {
        if self.is_isolated(from) || self.is_isolated(to) {
            return None;
        }
        if self.config.packet_loss_rate > 0.0 && self.rng.gen_bool(self.config.packet_loss_rate) {
            return None;
        }
        let jitter_nanos = self.config.jitter.as_nanos() as u64;
        let extra = if jitter_nanos == 0 {
            0
        } else {
            self.rng.gen_range(0..=jitter_nanos)
        };
        Some(self.config.base_latency + Duration::from_nanos(extra))
    }
}
