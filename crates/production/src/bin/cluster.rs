//! Failure Detector Cluster CLI
//!
//! Runs `n` detectors in one process over an in-memory network and
//! prints what each node last judged correct.

use anyhow::Context;
use clap::Parser;
use echofd_production::{
    pump_inbox, telemetry, ClusterConfig, FailureDetector, FdMetrics, InMemoryNetwork,
    RunnerOptions, SlowNode,
};
use echofd_types::NodeId;
use prometheus::{Registry, TextEncoder};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "echofd-cluster")]
#[command(about = "Run an in-process failure detector cluster")]
#[command(version)]
struct Cli {
    /// TOML cluster configuration. Flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of nodes
    #[arg(short)]
    n: Option<usize>,

    /// Byzantine bound
    #[arg(short)]
    f: Option<usize>,

    /// Admissibility threshold
    #[arg(short)]
    k: Option<u64>,

    /// Quorum poll interval (e.g., "100ms")
    #[arg(long)]
    poll_interval: Option<humantime::Duration>,

    /// Duration to run (e.g., "30s", "5m")
    #[arg(short, long)]
    duration: Option<humantime::Duration>,

    /// Delay every reply of a node, as NODE=DELAY (e.g., "0=1s")
    #[arg(long = "slow", value_parser = parse_slow_node)]
    slow: Vec<SlowNode>,

    /// Print node 0's metrics on exit
    #[arg(long)]
    metrics: bool,
}

fn parse_slow_node(s: &str) -> Result<SlowNode, String> {
    let (node, delay) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected NODE=DELAY, got: {}", s))?;
    let node = node
        .trim()
        .parse()
        .map_err(|_| format!("Invalid node id: {}", node))?;
    let delay = humantime::parse_duration(delay.trim()).map_err(|e| e.to_string())?;
    Ok(SlowNode {
        node,
        delay_ms: delay.as_millis() as u64,
    })
}

fn cluster_config(cli: &Cli) -> anyhow::Result<ClusterConfig> {
    let mut config = match &cli.config {
        Some(path) => ClusterConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClusterConfig::default(),
    };
    if let Some(n) = cli.n {
        config.n = n;
    }
    if let Some(f) = cli.f {
        config.f = f;
    }
    if let Some(k) = cli.k {
        config.k = k;
    }
    if let Some(interval) = cli.poll_interval {
        config.poll_interval_ms = interval.as_millis() as u64;
    }
    config.slow_nodes.extend(cli.slow.iter().copied());
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("info")?;

    let cli = Cli::parse();
    let config = cluster_config(&cli)?;
    let params = config.params()?;
    let run_for: Duration = cli
        .duration
        .map(Into::into)
        .unwrap_or_else(|| config.duration());

    let (network, inboxes) = InMemoryNetwork::new(params.n());
    let cancel = CancellationToken::new();
    let registry = Registry::new();
    let mut tasks = JoinSet::new();
    let mut detectors = Vec::with_capacity(params.n());

    for (index, inbox) in inboxes.into_iter().enumerate() {
        let id = NodeId(index as u64);
        let mut options = RunnerOptions::default().with_send_timeout(config.send_timeout());
        if index == 0 {
            options = options.with_metrics(FdMetrics::register(&registry)?);
        }
        let detector = FailureDetector::with_options(
            config.detector_config(id)?,
            network.transport(id),
            options,
        )?;

        tasks.spawn(pump_inbox(detector.clone(), inbox, cancel.clone()));
        tasks.spawn({
            let detector = detector.clone();
            async move { detector.run().await }
        });
        detectors.push(detector);
    }

    info!(
        nodes = params.n(),
        f = params.f(),
        k = params.k(),
        quorum = params.quorum_size(),
        duration = ?run_for,
        "Cluster started"
    );

    tokio::select! {
        _ = tokio::time::sleep(run_for) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    cancel.cancel();
    for detector in &detectors {
        detector.shutdown().await;
    }
    while let Some(joined) = tasks.join_next().await {
        joined?;
    }

    for detector in &detectors {
        let snapshot = detector.snapshot();
        println!(
            "{}: rounds={} token={} correct={:?}",
            snapshot.self_id,
            snapshot.rounds_completed,
            snapshot.current_token,
            detector.last_correct_processors()
        );
    }

    if cli.metrics {
        print!("{}", TextEncoder::new().encode_to_string(&registry.gather())?);
    }

    Ok(())
}
