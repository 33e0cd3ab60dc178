//! Core types for the echo-token failure detector.
//!
//! These types are shared by the synchronous detector state machine and
//! by every runner that drives it (simulation and production).

mod identifiers;
mod message;
mod params;
mod round;

pub use identifiers::{EpochToken, NodeId};
pub use message::{FdMessage, MessageType, TokenData};
pub use params::{ParamsError, QuorumParams, DEFAULT_ADMISSIBILITY_THRESHOLD};
pub use round::{DetectorSnapshot, RoundResult};
