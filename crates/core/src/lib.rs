//! Core abstractions shared by the failure detector and its runners.
//!
//! State machines consume [`Event`]s and return [`Action`]s; runners own
//! all I/O (network, timers, clocks) and feed results back as events.

mod action;
mod event;
mod traits;

pub use action::Action;
pub use event::{Event, TimerId};
pub use traits::StateMachine;
