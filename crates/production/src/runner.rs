//! Async failure detector runner.
//!
//! Drives a [`DetectorState`] on tokio. The round driver and any number
//! of concurrent message handlers share the state behind one mutex, so
//! counter increments, resets and token rotation never interleave. The
//! lock is never held across an `.await`: actions come out of the state
//! machine under the lock and are executed after it is released.

use crate::config::DEFAULT_SEND_TIMEOUT;
use crate::metrics::FdMetrics;
use crate::network::{Transport, TransportError};
use echofd_core::{Action, Event, StateMachine};
use echofd_detector::{ConfigError, DetectorConfig, DetectorState};
use echofd_types::{DetectorSnapshot, EpochToken, FdMessage, NodeId, RoundResult};
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

/// Runner settings that are not part of the protocol.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Bound on a single send.
    pub send_timeout: Duration,
    /// Metrics to update, if any.
    pub metrics: Option<FdMetrics>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            send_timeout: DEFAULT_SEND_TIMEOUT,
            metrics: None,
        }
    }
}

impl RunnerOptions {
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: FdMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Monotonic clock anchored to the UNIX epoch at construction.
///
/// Readings are comparable across nodes started from the same wall
/// clock and never go backwards within one node.
#[derive(Debug, Clone, Copy)]
struct Clock {
    origin: Instant,
    unix_offset: Duration,
}

impl Clock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            unix_offset: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default(),
        }
    }

    fn now(&self) -> Duration {
        self.unix_offset + self.origin.elapsed()
    }
}

struct Inner<T> {
    state: Mutex<DetectorState>,
    transport: T,
    local_id: NodeId,
    poll_interval: Duration,
    ready_poll_interval: Duration,
    /// Signalled when an increment meets quorum.
    quorum: Notify,
    shutdown: CancellationToken,
    /// In-flight message handlers.
    handlers: TaskTracker,
    clock: Clock,
    options: RunnerOptions,
}

/// Handle to a running failure detector. Cheap to clone.
pub struct FailureDetector<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for FailureDetector<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Transport> FailureDetector<T> {
    /// Create a detector with default runner options.
    pub fn new(config: DetectorConfig, transport: T) -> Result<Self, ConfigError> {
        Self::with_options(config, transport, RunnerOptions::default())
    }

    /// Create a detector.
    pub fn with_options(
        config: DetectorConfig,
        transport: T,
        options: RunnerOptions,
    ) -> Result<Self, ConfigError> {
        let local_id = config.local_id;
        let poll_interval = config.poll_interval;
        let ready_poll_interval = config.ready_poll_interval;
        let state = DetectorState::new(config)?;

        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                transport,
                local_id,
                poll_interval,
                ready_poll_interval,
                quorum: Notify::new(),
                shutdown: CancellationToken::new(),
                handlers: TaskTracker::new(),
                clock: Clock::new(),
                options,
            }),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Round Driver
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run rounds until shut down.
    ///
    /// Waits for the transport to report the system running, then
    /// broadcasts the first token and completes a round each time the
    /// quorum predicate holds. The predicate is re-checked when a
    /// handler signals quorum and at least every poll interval.
    pub async fn run(&self) {
        if !self.wait_until_ready().await {
            return;
        }

        let actions = self.step(Event::RoundTimer);
        self.execute(actions).await;

        while let Some(event) = self.next_wakeup().await {
            let actions = self.step(event);
            self.execute(actions).await;
        }

        info!(
            node = self.inner.local_id.0,
            rounds = self.rounds_completed(),
            "Failure detector stopped"
        );
    }

    /// Run exactly one round and return its result.
    ///
    /// The next token is minted but not broadcast; the next `run` or
    /// `run_once` broadcasts it. Returns `None` if shut down first.
    pub async fn run_once(&self) -> Option<RoundResult> {
        if !self.wait_until_ready().await {
            return None;
        }

        let actions = self.with_state(|state| state.start_round());
        self.execute(actions).await;

        loop {
            self.next_wakeup().await?;
            let result = self.with_state(|state| state.try_complete_round());
            if let Some(result) = result {
                if let Some(metrics) = &self.inner.options.metrics {
                    metrics.round_completed(&result);
                }
                return Some(result);
            }
        }
    }

    /// Block until the transport reports the system running.
    ///
    /// Returns false if shut down while waiting.
    pub async fn wait_until_ready(&self) -> bool {
        while !self.inner.transport.system_running() {
            trace!(node = self.inner.local_id.0, "Waiting for system to start");
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => return false,
                _ = tokio::time::sleep(self.inner.ready_poll_interval) => {}
            }
        }
        !self.inner.shutdown.is_cancelled()
    }

    async fn next_wakeup(&self) -> Option<Event> {
        tokio::select! {
            _ = self.inner.shutdown.cancelled() => None,
            _ = self.inner.quorum.notified() => Some(Event::QuorumReached),
            _ = tokio::time::sleep(self.inner.poll_interval) => Some(Event::QuorumPollTimer),
        }
    }

    /// Stop the driver and wait for in-flight handlers to finish.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.handlers.close();
        self.inner.handlers.wait().await;
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Message Handler
    // ═══════════════════════════════════════════════════════════════════════════

    /// Handle one inbound token message.
    pub async fn on_msg_recv(&self, message: FdMessage) {
        trace!(
            node = self.inner.local_id.0,
            sender = message.sender.0,
            owner = message.owner_id().0,
            token = message.token().0,
            "Token received"
        );
        let actions = self.step(Event::FdMessageReceived { message });
        self.execute(actions).await;
    }

    /// Handle one inbound token message on its own task.
    pub fn spawn_on_msg_recv(&self, message: FdMessage) {
        let detector = self.clone();
        self.inner
            .handlers
            .spawn(async move { detector.on_msg_recv(message).await });
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Action execution
    // ═══════════════════════════════════════════════════════════════════════════

    /// Lock the state at the current clock reading.
    fn with_state<R>(&self, f: impl FnOnce(&mut DetectorState) -> R) -> R {
        let mut state = self.inner.state.lock();
        state.set_time(self.inner.clock.now());
        let out = f(&mut state);
        if let Some(metrics) = &self.inner.options.metrics {
            metrics.observe_state(&state);
        }
        out
    }

    fn step(&self, event: Event) -> Vec<Action> {
        let metrics = &self.inner.options.metrics;
        self.with_state(|state| {
            let before = state.drop_stats();
            let actions = state.handle(event);
            if let Some(metrics) = metrics {
                metrics.observe_drops(before, state.drop_stats());
            }
            actions
        })
    }

    async fn execute(&self, actions: Vec<Action>) {
        let mut sends = Vec::new();
        for action in actions {
            match action {
                Action::SendToNode {
                    to,
                    message,
                    reliable,
                    delay,
                } => sends.push(self.send(to, message, reliable, delay)),

                // The driver loop owns the poll cadence.
                Action::SetTimer { .. } => {}

                Action::EnqueueInternal {
                    event: Event::QuorumReached,
                } => self.inner.quorum.notify_one(),

                Action::EnqueueInternal { event } => debug!(
                    node = self.inner.local_id.0,
                    event = event.type_name(),
                    "Ignoring internal event"
                ),

                Action::RoundCompleted { result } => {
                    if let Some(metrics) = &self.inner.options.metrics {
                        metrics.round_completed(&result);
                    }
                }
            }
        }
        join_all(sends).await;
    }

    async fn send(&self, to: NodeId, message: FdMessage, reliable: bool, delay: Duration) {
        if !delay.is_zero() {
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let timeout = self.inner.options.send_timeout;
        let send = self.inner.transport.send_to_node(to, message, reliable);
        let result = match tokio::time::timeout(timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout { peer: to, timeout }),
        };

        if let Err(e) = result {
            warn!(
                node = self.inner.local_id.0,
                peer = to.0,
                token = message.token().0,
                error = %e,
                "Send failed"
            );
            if let Some(metrics) = &self.inner.options.metrics {
                metrics.send_failed();
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn local_id(&self) -> NodeId {
        self.inner.local_id
    }

    /// Correct processors of the last completed round, or empty.
    pub fn last_correct_processors(&self) -> BTreeSet<NodeId> {
        self.inner.state.lock().last_correct_processors()
    }

    /// Correct processors of the last completed round if it is at least
    /// as recent as `timestamp`, empty otherwise.
    pub fn correct_processors_as_of(&self, timestamp: EpochToken) -> BTreeSet<NodeId> {
        self.inner.state.lock().correct_processors_as_of(timestamp)
    }

    /// Diagnostic view of the detector.
    pub fn snapshot(&self) -> DetectorSnapshot {
        self.inner.state.lock().snapshot()
    }

    pub fn rounds_completed(&self) -> u64 {
        self.inner.state.lock().rounds_completed()
    }

    /// A timestamp on the clock tokens are minted from.
    pub fn current_timestamp(&self) -> EpochToken {
        EpochToken::from_duration(self.inner.clock.now())
    }
}

impl<T> std::fmt::Debug for FailureDetector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureDetector")
            .field("local_id", &self.inner.local_id)
            .field("state", &*self.inner.state.lock())
            .finish()
    }
}
