//! Inbound events for the failure-detector state machine.

use echofd_types::FdMessage;

/// Timers a state machine may ask the runner to arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerId {
    /// Start of the first round.
    Round,
    /// Bounded re-check of the quorum predicate.
    QuorumPoll,
}

/// Events delivered to a state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The node is ready; broadcast the current token and start waiting.
    RoundTimer,

    /// Poll the quorum predicate; finish the round if it holds.
    QuorumPollTimer,

    /// A token broadcast or echo arrived from the network.
    FdMessageReceived {
        /// The received message.
        message: FdMessage,
    },

    /// Internal: an echo made the quorum predicate true.
    ///
    /// Enqueued by the message handler so the round completes without
    /// waiting for the next poll.
    QuorumReached,
}

impl Event {
    /// Get a human-readable name for this event type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::RoundTimer => "RoundTimer",
            Event::QuorumPollTimer => "QuorumPollTimer",
            Event::FdMessageReceived { .. } => "FdMessageReceived",
            Event::QuorumReached => "QuorumReached",
        }
    }

    /// The timer that produces this event, if any.
    pub fn timer_id(&self) -> Option<TimerId> {
        match self {
            Event::RoundTimer => Some(TimerId::Round),
            Event::QuorumPollTimer => Some(TimerId::QuorumPoll),
            Event::FdMessageReceived { .. } | Event::QuorumReached => None,
        }
    }

    /// The event a timer produces when it fires.
    pub fn for_timer(id: TimerId) -> Self {
        match id {
            TimerId::Round => Event::RoundTimer,
            TimerId::QuorumPoll => Event::QuorumPollTimer,
        }
    }
}
