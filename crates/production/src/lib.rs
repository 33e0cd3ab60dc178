//! Production runner for the failure detector.
//!
//! Wraps the synchronous detector state machine in a tokio runtime:
//!
//! - [`FailureDetector`]: round driver loop, concurrent message handler
//!   and the query surface used by the consensus layer
//! - [`Transport`]: the send collaborator, with an in-process
//!   implementation in [`InMemoryNetwork`]
//! - [`FdMetrics`]: Prometheus metrics on a caller-supplied registry
//! - [`ClusterConfig`]: TOML configuration for a whole cluster
//!
//! # Example
//!
//! ```no_run
//! use echofd_production::{ClusterConfig, FailureDetector, InMemoryNetwork};
//! use echofd_types::NodeId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClusterConfig::default();
//! let (network, _inboxes) = InMemoryNetwork::new(config.n);
//! let detector = FailureDetector::new(
//!     config.detector_config(NodeId(0))?,
//!     network.transport(NodeId(0)),
//! )?;
//! tokio::spawn({
//!     let detector = detector.clone();
//!     async move { detector.run().await }
//! });
//! let correct = detector.last_correct_processors();
//! # Ok(())
//! # }
//! ```

mod config;
mod metrics;
mod network;
mod runner;
pub mod telemetry;

pub use config::{ClusterConfig, ClusterConfigError, SlowNode, DEFAULT_SEND_TIMEOUT};
pub use metrics::FdMetrics;
pub use network::{
    decode_message, encode_message, pump_inbox, CodecError, InMemoryNetwork, InMemoryTransport,
    Inbox, Transport, TransportError,
};
pub use runner::{FailureDetector, RunnerOptions};
