//! The state machine contract between detectors and runners.

use crate::{Action, Event};
use std::time::Duration;

/// A node-local state machine driven by a runner.
///
/// `handle` never blocks and never touches the network or a clock: it
/// mutates `self` and describes the side effects as [`Action`]s. Replaying
/// the same events at the same times yields the same actions, which is
/// what lets the simulation runner reproduce a cluster run from a seed.
///
/// # Example
///
/// ```ignore
/// let mut state = DetectorState::new(config)?;
/// state.set_time(now);
/// for action in state.handle(Event::RoundTimer) {
///     runner.execute(action);
/// }
/// ```
pub trait StateMachine {
    /// Process an event, returning actions for the runner to perform.
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Set the current time. Runners call this before every `handle()`;
    /// epoch tokens are minted from it.
    fn set_time(&mut self, now: Duration);

    /// Get the time that was last set via `set_time()`.
    fn now(&self) -> Duration;
}
