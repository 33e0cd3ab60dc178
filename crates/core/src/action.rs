//! Outbound actions requested by a state machine.

use crate::Event;
use crate::TimerId;
use echofd_types::{FdMessage, NodeId, RoundResult};
use std::time::Duration;

/// Actions the runner must perform on behalf of a state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a message to a single node.
    SendToNode {
        /// Destination.
        to: NodeId,
        /// Message to deliver.
        message: FdMessage,
        /// Request reliable delivery from the transport.
        reliable: bool,
        /// Artificial delay to apply before sending (fault injection).
        delay: Duration,
    },

    /// Arm (or re-arm) a timer.
    SetTimer {
        /// Which timer.
        id: TimerId,
        /// Fires after this long.
        duration: Duration,
    },

    /// Feed an event back into the same state machine.
    EnqueueInternal {
        /// The event to enqueue.
        event: Event,
    },

    /// A round finished and its result was published.
    RoundCompleted {
        /// The published result.
        result: RoundResult,
    },
}

impl Action {
    /// Get a human-readable name for this action type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::SendToNode { .. } => "SendToNode",
            Action::SetTimer { .. } => "SetTimer",
            Action::EnqueueInternal { .. } => "EnqueueInternal",
            Action::RoundCompleted { .. } => "RoundCompleted",
        }
    }

    /// Check if this action performs network I/O.
    pub fn is_network(&self) -> bool {
        matches!(self, Action::SendToNode { .. })
    }
}
