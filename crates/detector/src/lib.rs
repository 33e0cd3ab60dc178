//! Event-driven failure detector state machine.
//!
//! Each node repeatedly broadcasts an epoch token and counts how often
//! every peer echoes it back. A round finishes once at least `n - 2f`
//! nodes (self included) have echoed the current token `K` times; the
//! node then publishes every peer that echoed at all, resets its
//! counters and mints a fresh token.
//!
//! # Architecture
//!
//! The state machine processes events synchronously:
//!
//! - `Event::RoundTimer` → Mint the first token and broadcast it (re-broadcast once started)
//! - `Event::FdMessageReceived` → Count echoes of our token, echo foreign tokens back
//! - `Event::QuorumReached` → Finish the round as soon as an echo completes the quorum
//! - `Event::QuorumPollTimer` → Bounded re-check of the quorum predicate
//!
//! All I/O is performed by the runner via returned `Action`s.

mod config;
mod delay;
mod state;
mod store;
mod tracker;

pub use config::{ConfigError, DetectorConfig, DEFAULT_POLL_INTERVAL, DEFAULT_READY_POLL_INTERVAL};
pub use delay::ResponseDelayPolicy;
pub use state::{DetectorState, DropStats};
pub use store::ResultStore;
pub use tracker::QuorumTracker;
