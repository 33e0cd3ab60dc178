//! Prometheus metrics for one failure detector.
//!
//! Metrics live on a caller-supplied [`Registry`] so several detectors
//! can run in one process, each on its own registry (or one registry
//! with a per-node prefix).

use echofd_detector::{DetectorState, DropStats};
use echofd_types::RoundResult;
use prometheus::{IntCounter, IntGauge, IntGaugeVec, Opts, Registry};

/// Handles to the detector's metrics.
#[derive(Debug, Clone)]
pub struct FdMetrics {
    current_token: IntGauge,
    rounds_completed: IntCounter,
    correct_processors: IntGauge,
    peer_echo_count: IntGaugeVec,
    stale_messages: IntCounter,
    rejected_messages: IntCounter,
    send_failures: IntCounter,
}

impl FdMetrics {
    /// Create the metrics and register them on `registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let current_token = IntGauge::new(
            "fd_current_token",
            "Epoch token of the round in progress",
        )?;
        let rounds_completed = IntCounter::new(
            "fd_rounds_completed_total",
            "Rounds that reached quorum",
        )?;
        let correct_processors = IntGauge::new(
            "fd_correct_processors",
            "Size of the last published correct-processor set",
        )?;
        let peer_echo_count = IntGaugeVec::new(
            Opts::new(
                "fd_peer_echo_count",
                "Echoes counted from each peer in the current round",
            ),
            &["peer"],
        )?;
        let stale_messages = IntCounter::new(
            "fd_stale_messages_total",
            "Own tokens dropped because their round had ended",
        )?;
        let rejected_messages = IntCounter::new(
            "fd_rejected_messages_total",
            "Messages dropped for naming an unknown sender or owner",
        )?;
        let send_failures = IntCounter::new(
            "fd_send_failures_total",
            "Sends that failed or timed out",
        )?;

        registry.register(Box::new(current_token.clone()))?;
        registry.register(Box::new(rounds_completed.clone()))?;
        registry.register(Box::new(correct_processors.clone()))?;
        registry.register(Box::new(peer_echo_count.clone()))?;
        registry.register(Box::new(stale_messages.clone()))?;
        registry.register(Box::new(rejected_messages.clone()))?;
        registry.register(Box::new(send_failures.clone()))?;

        Ok(Self {
            current_token,
            rounds_completed,
            correct_processors,
            peer_echo_count,
            stale_messages,
            rejected_messages,
            send_failures,
        })
    }

    /// Refresh the gauges that mirror detector state.
    pub fn observe_state(&self, state: &DetectorState) {
        self.current_token
            .set(i64::try_from(state.current_token().get()).unwrap_or(i64::MAX));
        for (peer, count) in state.tracker().counters() {
            self.peer_echo_count
                .with_label_values(&[&peer.get().to_string()])
                .set(i64::try_from(*count).unwrap_or(i64::MAX));
        }
    }

    /// Count messages dropped between two readings of the drop stats.
    pub fn observe_drops(&self, before: DropStats, after: DropStats) {
        self.stale_messages
            .inc_by(after.stale.saturating_sub(before.stale));
        self.rejected_messages
            .inc_by(after.rejected.saturating_sub(before.rejected));
    }

    /// Record a published round.
    pub fn round_completed(&self, result: &RoundResult) {
        self.rounds_completed.inc();
        self.correct_processors
            .set(result.correct_processors.len() as i64);
    }

    /// Record a failed send.
    pub fn send_failed(&self) {
        self.send_failures.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echofd_detector::DetectorConfig;
    use echofd_types::{EpochToken, NodeId, QuorumParams};
    use prometheus::TextEncoder;
    use std::collections::BTreeSet;

    /// Read one sample from the text exposition of `registry`.
    fn sample(registry: &Registry, series: &str) -> f64 {
        let text = TextEncoder::new()
            .encode_to_string(&registry.gather())
            .unwrap();
        text.lines()
            .filter(|line| !line.starts_with('#'))
            .find_map(|line| {
                let (name, value) = line.rsplit_once(' ')?;
                (name == series).then(|| value.parse().unwrap())
            })
            .unwrap()
    }

    #[test]
    fn test_registering_twice_fails() {
        let registry = Registry::new();
        FdMetrics::register(&registry).unwrap();
        assert!(FdMetrics::register(&registry).is_err());
    }

    #[test]
    fn test_round_and_drop_counters() {
        let registry = Registry::new();
        let metrics = FdMetrics::register(&registry).unwrap();

        let result = RoundResult {
            token: EpochToken(10),
            correct_processors: BTreeSet::from([NodeId(0), NodeId(2), NodeId(3)]),
        };
        metrics.round_completed(&result);
        metrics.observe_drops(
            DropStats::default(),
            DropStats {
                stale: 4,
                rejected: 1,
            },
        );
        metrics.send_failed();

        assert_eq!(sample(&registry, "fd_rounds_completed_total"), 1.0);
        assert_eq!(sample(&registry, "fd_correct_processors"), 3.0);
        assert_eq!(sample(&registry, "fd_stale_messages_total"), 4.0);
        assert_eq!(sample(&registry, "fd_rejected_messages_total"), 1.0);
        assert_eq!(sample(&registry, "fd_send_failures_total"), 1.0);
    }

    #[test]
    fn test_observe_state_exports_counters() {
        let registry = Registry::new();
        let metrics = FdMetrics::register(&registry).unwrap();

        let params = QuorumParams::new(3, 1, 3).unwrap();
        let state = DetectorState::new(DetectorConfig::new(NodeId(1), params)).unwrap();
        metrics.observe_state(&state);

        assert_eq!(sample(&registry, "fd_current_token"), 0.0);
        assert_eq!(sample(&registry, "fd_peer_echo_count{peer=\"0\"}"), 0.0);
        assert_eq!(sample(&registry, "fd_peer_echo_count{peer=\"2\"}"), 0.0);
    }
}
