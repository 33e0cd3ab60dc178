//! Deterministic event loop driving a cluster of detectors.

use crate::event_queue::{EventKey, EventPriority};
use crate::network::{NetworkConfig, SimulatedNetwork};
use crate::NodeIndex;
use echofd_core::{Action, Event, StateMachine, TimerId};
use echofd_detector::{ConfigError, DetectorConfig, DetectorState, ResponseDelayPolicy};
use echofd_types::{NodeId, QuorumParams, RoundResult};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors that can occur when building a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// A node's detector configuration was rejected.
    #[error("invalid detector config for node {node}: {source}")]
    Config {
        node: NodeIndex,
        #[source]
        source: ConfigError,
    },
}

/// Counters collected over a simulation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationStats {
    /// Events handed to a state machine.
    pub events_processed: u64,
    /// `SendToNode` actions executed.
    pub messages_sent: u64,
    /// Messages lost to isolation or packet loss.
    pub messages_dropped: u64,
    /// Rounds completed across all nodes.
    pub rounds_completed: u64,
}

/// Runs `n` detectors against a simulated network in virtual time.
pub struct SimulationRunner {
    nodes: Vec<DetectorState>,
    queue: BTreeMap<EventKey, Event>,
    /// Armed timers, so re-arming replaces the pending expiry.
    timers: HashMap<(NodeIndex, TimerId), EventKey>,
    network: SimulatedNetwork,
    /// Published results per node, oldest first.
    history: Vec<Vec<RoundResult>>,
    stats: SimulationStats,
    now: Duration,
    sequence: u64,
}

impl SimulationRunner {
    /// Create a simulation where no node delays its replies.
    pub fn new(
        params: QuorumParams,
        network_config: NetworkConfig,
        seed: u64,
    ) -> Result<Self, SimulationError> {
        Self::with_response_delay(params, network_config, ResponseDelayPolicy::none(), seed)
    }

    /// Create a simulation with a response delay policy shared by all nodes.
    pub fn with_response_delay(
        params: QuorumParams,
        network_config: NetworkConfig,
        response_delay: ResponseDelayPolicy,
        seed: u64,
    ) -> Result<Self, SimulationError> {
        let nodes = (0..params.n() as NodeIndex)
            .map(|node| {
                let config = DetectorConfig::new(NodeId(node as u64), params)
                    .with_response_delay(response_delay.clone());
                DetectorState::new(config)
                    .map_err(|source| SimulationError::Config { node, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rng = ChaCha8Rng::seed_from_u64(seed);
        Ok(Self {
            history: vec![Vec::new(); nodes.len()],
            nodes,
            queue: BTreeMap::new(),
            timers: HashMap::new(),
            network: SimulatedNetwork::new(network_config, rng),
            stats: SimulationStats::default(),
            now: Duration::ZERO,
            sequence: 0,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get the number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Get a node's detector.
    pub fn node(&self, node: NodeIndex) -> &DetectorState {
        &self.nodes[node as usize]
    }

    /// Get every result a node published, oldest first.
    pub fn history(&self, node: NodeIndex) -> &[RoundResult] {
        &self.history[node as usize]
    }

    /// Get the simulated network.
    pub fn network_mut(&mut self) -> &mut SimulatedNetwork {
        &mut self.network
    }

    /// Get run statistics.
    pub fn stats(&self) -> SimulationStats {
        self.stats
    }

    /// Get the current simulated time.
    pub fn now(&self) -> Duration {
        self.now
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Driving
    // ═══════════════════════════════════════════════════════════════════════════

    /// Start every node's first round at the current time.
    pub fn start(&mut self) {
        for node in 0..self.nodes.len() as NodeIndex {
            self.start_node(node, Duration::ZERO);
        }
    }

    /// Start one node's first round after `after`.
    pub fn start_node(&mut self, node: NodeIndex, after: Duration) {
        let key = self.schedule(node, after, EventPriority::Timer, Event::RoundTimer);
        self.timers.insert((node, TimerId::Round), key);
    }

    /// Process the next event. Returns false if the queue is empty.
    pub fn step(&mut self) -> bool {
        let Some((key, event)) = self.queue.pop_first() else {
            return false;
        };
        self.now = key.time;

        if let Some(timer) = event.timer_id() {
            if self.timers.get(&(key.node, timer)) == Some(&key) {
                self.timers.remove(&(key.node, timer));
            }
        }

        trace!(node = key.node, event = event.type_name(), now = ?self.now, "Processing event");

        let state = &mut self.nodes[key.node as usize];
        state.set_time(self.now);
        let actions = state.handle(event);
        self.stats.events_processed += 1;

        for action in actions {
            if action.is_network() {
                self.stats.messages_sent += 1;
            }
            self.process_action(key.node, action);
        }
        true
    }

    /// Process every event scheduled at or before `deadline`.
    pub fn run_until(&mut self, deadline: Duration) {
        while let Some((key, _)) = self.queue.first_key_value() {
            if key.time > deadline {
                break;
            }
            self.step();
        }
        self.now = self.now.max(deadline);
    }

    /// Process events for `duration` of simulated time.
    pub fn run_for(&mut self, duration: Duration) {
        self.run_until(self.now + duration);
    }

    fn process_action(&mut self, from: NodeIndex, action: Action) {
        match action {
            Action::SendToNode {
                to, message, delay, ..
            } => {
                let to = to.0 as NodeIndex;
                if to as usize >= self.nodes.len() {
                    self.stats.messages_dropped += 1;
                    return;
                }
                match self.network.delivery_latency(from, to) {
                    Some(latency) => {
                        self.schedule(
                            to,
                            delay + latency,
                            EventPriority::Network,
                            Event::FdMessageReceived { message },
                        );
                    }
                    None => self.stats.messages_dropped += 1,
                }
            }

            Action::SetTimer { id, duration } => {
                if let Some(previous) = self.timers.remove(&(from, id)) {
                    self.queue.remove(&previous);
                }
                let key = self.schedule(from, duration, EventPriority::Timer, Event::for_timer(id));
                self.timers.insert((from, id), key);
            }

            Action::EnqueueInternal { event } => {
                self.schedule(from, Duration::ZERO, EventPriority::Internal, event);
            }

            Action::RoundCompleted { result } => {
                debug!(
                    node = from,
                    token = result.token.0,
                    correct = result.correct_processors.len(),
                    now = ?self.now,
                    "Simulated round completed"
                );
                self.stats.rounds_completed += 1;
                self.history[from as usize].push(result);
            }
        }
    }

    fn schedule(
        &mut self,
        node: NodeIndex,
        after: Duration,
        priority: EventPriority,
        event: Event,
    ) -> EventKey {
        let key = EventKey {
            time: self.now + after,
            priority,
            node,
            sequence: self.sequence,
        };
        self.sequence += 1;
        self.queue.insert(key, event);
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_rearming_replaces_pending_timer() {
        let params = QuorumParams::new(4, 1, 3).unwrap();
        let mut runner = SimulationRunner::new(params, NetworkConfig::default(), 1).unwrap();
        runner.network_mut().isolate(0);
        runner.start_node(0, Duration::ZERO);

        runner.run_for(Duration::from_secs(1));

        // One armed poll timer, never duplicated by re-arming
        let polls = runner
            .queue
            .values()
            .filter(|event| matches!(event, Event::QuorumPollTimer))
            .count();
        assert_eq!(polls, 1);
        assert_eq!(runner.node(0).rounds_completed(), 0);
    }
}
