//! Failure detector state for one node.

use crate::{ConfigError, DetectorConfig, QuorumTracker, ResultStore};
use echofd_core::{Action, Event, StateMachine, TimerId};
use echofd_types::{DetectorSnapshot, EpochToken, FdMessage, NodeId, RoundResult};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Counts of inbound messages the detector dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropStats {
    /// Our own tokens from a round we already left.
    pub stale: u64,
    /// Messages naming a sender or owner outside the cluster.
    pub rejected: u64,
}

/// Failure detector state machine.
///
/// Owns the current epoch token, the per-peer echo counters and the
/// last published round. Every mutation goes through `&mut self`, so a
/// runner that shares the state across tasks serializes increments,
/// resets and token rotation behind one lock.
pub struct DetectorState {
    config: DetectorConfig,

    /// Token of the round in progress.
    token: EpochToken,

    /// Echo counters for `token`.
    tracker: QuorumTracker,

    /// Last completed round.
    results: ResultStore,

    /// Whether the first round has started.
    started: bool,

    /// Whether `QuorumReached` was already enqueued for this round.
    quorum_signalled: bool,

    rounds_completed: u64,

    drops: DropStats,

    /// Current time, set by the runner.
    now: Duration,
}

impl DetectorState {
    /// Create a detector. No token is minted until the first round starts.
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let tracker = QuorumTracker::new(config.local_id, config.params);
        Ok(Self {
            config,
            token: EpochToken::ZERO,
            tracker,
            results: ResultStore::new(),
            started: false,
            quorum_signalled: false,
            rounds_completed: 0,
            drops: DropStats::default(),
            now: Duration::ZERO,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get the local node ID.
    pub fn local_id(&self) -> NodeId {
        self.config.local_id
    }

    /// Get the configuration.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Get the token of the round in progress.
    pub fn current_token(&self) -> EpochToken {
        self.token
    }

    /// Get the echo counters.
    pub fn tracker(&self) -> &QuorumTracker {
        &self.tracker
    }

    /// Get the result store.
    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    /// Get the number of completed rounds.
    pub fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }

    /// Get the dropped message counts.
    pub fn drop_stats(&self) -> DropStats {
        self.drops
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Round Driver
    // ═══════════════════════════════════════════════════════════════════════════

    /// Start the first round: mint a token and broadcast it.
    ///
    /// Once started, re-broadcasts the current token instead, so a driver
    /// taking over from a single-shot round announces the token it now
    /// waits on.
    pub fn start_round(&mut self) -> Vec<Action> {
        if self.started {
            debug!(
                node = self.local_id().0,
                token = self.token.0,
                "Round already started, re-broadcasting token"
            );
            return self.broadcast();
        }
        self.started = true;
        self.token = self.token.next_after(self.now);

        info!(
            node = self.local_id().0,
            token = self.token.0,
            peers = self.tracker.len(),
            "Starting failure detector"
        );

        self.broadcast()
    }

    /// Send the current token to every peer, as its owner.
    pub fn broadcast(&self) -> Vec<Action> {
        let local = self.local_id();
        self.config
            .params
            .peers_of(local)
            .map(|peer| Action::SendToNode {
                to: peer,
                message: FdMessage::new(local, self.token, local),
                reliable: true,
                delay: Duration::ZERO,
            })
            .collect()
    }

    /// Finish the round if the quorum predicate holds.
    ///
    /// Publishes the responsive peers (plus self) with the finished token,
    /// resets every counter and mints a strictly greater token. Returns
    /// the published result, or `None` if the round must keep waiting.
    pub fn try_complete_round(&mut self) -> Option<RoundResult> {
        if !self.started || !self.tracker.quorum_met() {
            return None;
        }

        let result = RoundResult {
            token: self.token,
            correct_processors: self.tracker.responsive_peers(),
        };
        self.results.publish(result.clone());

        self.tracker.reset();
        self.token = self.token.next_after(self.now);
        self.quorum_signalled = false;
        self.rounds_completed += 1;

        info!(
            node = self.local_id().0,
            round = self.rounds_completed,
            token = result.token.0,
            next_token = self.token.0,
            correct = ?result.correct_processors,
            "Round completed"
        );

        Some(result)
    }

    /// Complete the round if possible and broadcast the next token.
    fn complete_round_actions(&mut self) -> Vec<Action> {
        match self.try_complete_round() {
            Some(result) => {
                let mut actions = vec![Action::RoundCompleted { result }];
                actions.extend(self.broadcast());
                actions
            }
            None => vec![],
        }
    }

    /// Handle the round timer: start the first round and arm the poll timer.
    pub fn on_round_timer(&mut self) -> Vec<Action> {
        let mut actions = self.start_round();
        actions.push(Action::SetTimer {
            id: TimerId::QuorumPoll,
            duration: self.config.poll_interval,
        });
        actions
    }

    /// Handle the quorum poll timer.
    ///
    /// Always re-arms the timer so a stalled round keeps being re-checked.
    pub fn on_quorum_poll(&mut self) -> Vec<Action> {
        let mut actions = self.complete_round_actions();
        if actions.is_empty() && self.started {
            trace!(
                node = self.local_id().0,
                token = self.token.0,
                admissible = self.tracker.admissible_peers().len(),
                quorum = self.config.params.quorum_size(),
                "Quorum not reached yet"
            );
        }
        actions.push(Action::SetTimer {
            id: TimerId::QuorumPoll,
            duration: self.config.poll_interval,
        });
        actions
    }

    /// Handle an internal quorum notification.
    pub fn on_quorum_reached(&mut self) -> Vec<Action> {
        self.complete_round_actions()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Message Handler
    // ═══════════════════════════════════════════════════════════════════════════

    /// Handle a token broadcast or echo.
    ///
    /// - Our own, current token: count the echo and send the token back so
    ///   the exchange with that peer continues.
    /// - Our own, stale token: drop silently, which ends the exchange.
    /// - Someone else's token: echo it back to the sender unchanged.
    pub fn on_fd_message(&mut self, message: FdMessage) -> Vec<Action> {
        let local = self.local_id();
        let sender = message.sender;
        let owner = message.owner_id();
        let params = self.config.params;

        if sender == local || !params.contains(sender) {
            warn!(
                node = local.0,
                sender = sender.0,
                "Rejecting token message from unknown sender"
            );
            self.drops.rejected += 1;
            return vec![];
        }
        if !params.contains(owner) {
            warn!(
                node = local.0,
                sender = sender.0,
                owner = owner.0,
                "Rejecting token message with unknown owner"
            );
            self.drops.rejected += 1;
            return vec![];
        }

        let mut actions = vec![];

        if message.is_owned_by(local) {
            if !self.started || message.token() != self.token {
                debug!(
                    node = local.0,
                    sender = sender.0,
                    token = message.token().0,
                    current_token = self.token.0,
                    "Dropping stale token"
                );
                self.drops.stale += 1;
                return vec![];
            }

            let count = self.tracker.record_echo(sender);
            debug_assert!(count.is_some(), "validated sender has a counter");

            trace!(
                node = local.0,
                sender = sender.0,
                count = ?count,
                token = self.token.0,
                "Echo counted"
            );

            if !self.quorum_signalled && self.tracker.quorum_met() {
                self.quorum_signalled = true;
                debug!(node = local.0, token = self.token.0, "Quorum reached");
                actions.push(Action::EnqueueInternal {
                    event: Event::QuorumReached,
                });
            }
        }

        actions.push(self.reply(sender, message.token(), owner));
        actions
    }

    /// Send `token` back to `to`, as a copy from this node.
    fn reply(&self, to: NodeId, token: EpochToken, owner: NodeId) -> Action {
        let local = self.local_id();
        Action::SendToNode {
            to,
            message: FdMessage::new(local, token, owner),
            reliable: true,
            delay: self.config.response_delay.delay_for(local),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Query Surface
    // ═══════════════════════════════════════════════════════════════════════════

    /// Correct processors of the last completed round, or empty.
    pub fn last_correct_processors(&self) -> BTreeSet<NodeId> {
        self.results.last_correct_processors()
    }

    /// Correct processors of the last completed round if its token is at
    /// least `timestamp`, empty otherwise.
    pub fn correct_processors_as_of(&self, timestamp: EpochToken) -> BTreeSet<NodeId> {
        self.results.correct_processors_as_of(timestamp)
    }

    /// Diagnostic view of the detector.
    pub fn snapshot(&self) -> DetectorSnapshot {
        let params = self.config.params;
        DetectorSnapshot {
            self_id: self.local_id(),
            current_token: self.token,
            counters: self.tracker.counters().clone(),
            last_result: self.results.last().cloned(),
            admissibility_threshold: params.k(),
            n: params.n(),
            f: params.f(),
            quorum_size: params.quorum_size(),
            rounds_completed: self.rounds_completed,
        }
    }
}

impl StateMachine for DetectorState {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::RoundTimer => self.on_round_timer(),
            Event::QuorumPollTimer => self.on_quorum_poll(),
            Event::FdMessageReceived { message } => self.on_fd_message(message),
            Event::QuorumReached => self.on_quorum_reached(),
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn now(&self) -> Duration {
        self.now
    }
}

impl std::fmt::Debug for DetectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorState")
            .field("local_id", &self.local_id())
            .field("token", &self.token)
            .field("counters", self.tracker.counters())
            .field("rounds_completed", &self.rounds_completed)
            .finish()
    }
}
