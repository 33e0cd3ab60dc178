//! In-process clusters over the in-memory transport.

use echofd_production::{
    pump_inbox, ClusterConfig, FailureDetector, InMemoryNetwork, InMemoryTransport,
};
use echofd_types::{EpochToken, NodeId};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

struct Cluster {
    network: InMemoryNetwork,
    detectors: Vec<FailureDetector<InMemoryTransport>>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl Cluster {
    fn start(config: &ClusterConfig, disconnected: &[u64], running: bool) -> Self {
        let (network, inboxes) = InMemoryNetwork::new(config.n);
        network.set_running(running);
        for node in disconnected {
            network.disconnect(NodeId(*node));
        }
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let mut detectors = Vec::new();

        for (index, inbox) in inboxes.into_iter().enumerate() {
            let id = NodeId(index as u64);
            let detector = FailureDetector::new(
                config.detector_config(id).unwrap(),
                network.transport(id),
            )
            .unwrap();
            tasks.spawn(pump_inbox(detector.clone(), inbox, cancel.clone()));
            tasks.spawn({
                let detector = detector.clone();
                async move { detector.run().await }
            });
            detectors.push(detector);
        }

        Self {
            network,
            detectors,
            cancel,
            tasks,
        }
    }

    async fn stop(mut self) -> Vec<FailureDetector<InMemoryTransport>> {
        self.cancel.cancel();
        for detector in &self.detectors {
            detector.shutdown().await;
        }
        while let Some(joined) = self.tasks.join_next().await {
            joined.unwrap();
        }
        self.detectors
    }
}

fn config(n: usize, f: usize) -> ClusterConfig {
    ClusterConfig {
        n,
        f,
        poll_interval_ms: 10,
        ready_poll_interval_ms: 10,
        ..ClusterConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cluster_completes_rounds() {
    let config = config(4, 1);
    let cluster = Cluster::start(&config, &[], true);
    tokio::time::sleep(Duration::from_millis(500)).await;
    let detectors = cluster.stop().await;

    for detector in &detectors {
        let snapshot = detector.snapshot();
        assert!(snapshot.rounds_completed > 0, "{:?}", snapshot);

        let last = snapshot.last_result.unwrap();
        assert!(last.correct_processors.contains(&snapshot.self_id));
        assert!(last.correct_processors.len() >= snapshot.quorum_size);
        assert!(snapshot.current_token > last.token);
        assert!(detector.current_timestamp() >= last.token);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disconnected_node_is_excluded() {
    let config = config(6, 1);
    let cluster = Cluster::start(&config, &[5], true);
    tokio::time::sleep(Duration::from_millis(500)).await;
    let detectors = cluster.stop().await;

    for detector in &detectors[..5] {
        let correct = detector.last_correct_processors();
        assert!(correct.len() >= 4);
        assert!(!correct.contains(&NodeId(5)));
    }

    let isolated = detectors[5].snapshot();
    assert_eq!(isolated.rounds_completed, 0);
    assert!(isolated.last_result.is_none());
    assert!(isolated.counters.values().all(|count| *count == 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cluster_waits_for_system_running() {
    let config = config(4, 1);
    let cluster = Cluster::start(&config, &[], false);
    tokio::time::sleep(Duration::from_millis(200)).await;

    for detector in &cluster.detectors {
        let snapshot = detector.snapshot();
        assert_eq!(snapshot.rounds_completed, 0);
        assert_eq!(snapshot.current_token, EpochToken::ZERO);
    }

    cluster.network.set_running(true);
    tokio::time::sleep(Duration::from_millis(500)).await;
    let detectors = cluster.stop().await;

    for detector in &detectors {
        assert!(detector.rounds_completed() > 0);
    }
}
