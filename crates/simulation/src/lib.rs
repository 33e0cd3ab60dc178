//! Deterministic simulation runner.
//!
//! This crate drives a cluster of failure-detector state machines over a
//! simulated network. Given the same seed, it produces identical results
//! every run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SimulationRunner                       │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Event Queue (BTreeMap<EventKey, Event>)        │ │
//! │  │     Ordered by: time, priority, node, sequence     │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     nodes: Vec<DetectorState>                      │ │
//! │  │     Each processes events sequentially             │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Actions → schedule new events                  │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod event_queue;
mod network;
mod runner;

pub use event_queue::{EventKey, EventPriority};
pub use network::{NetworkConfig, SimulatedNetwork};
pub use runner::{SimulationError, SimulationRunner, SimulationStats};

/// Type alias for deterministic node indexing in simulation.
///
/// Index `i` hosts the detector for `NodeId(i)`.
pub type NodeIndex = u32;
