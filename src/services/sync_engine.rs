//! Polling driver keeping the local session view converged with the server.
//!
//! One engine owns the latest snapshot, the score and challenge trackers, the state machine
//! and the team transition overlay of a single screen. Each cycle runs
//! fetch → reconcile → transition → notify, in that order, under a gate that keeps cycles
//! from overlapping.

use std::{
    sync::{
        Arc, Mutex as StdMutex, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use time::OffsetDateTime;
use tokio::{
    sync::{Mutex, RwLock, broadcast},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::{
    api::SessionApi,
    config::AppConfig,
    error::ServiceError,
    services::{
        challenge_tracker::{ChallengeCounts, ChallengeLifecycleTracker, PlayerChallengeProgress},
        events::{
            broadcast_challenges_updated, broadcast_scores_changed, broadcast_session_changed,
            broadcast_transition,
        },
        score_tracker::{ScoreEvent, ScoreTracker},
    },
    state::{
        notify::{EventHub, SessionEvent},
        overlay::TransitionOverlay,
        session::{Challenge, Session, SessionStatus, TeamColor, TeamScores},
        state_machine::{GameState, GameStateMachine, Snapshot},
    },
};

/// Shortest delay accepted between two polls.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Everything a cycle reconciles, guarded together so a cycle applies atomically.
struct EngineState {
    snapshot: Option<Arc<Session>>,
    machine: GameStateMachine,
    scores: ScoreTracker,
    challenges: ChallengeLifecycleTracker,
    overlay: TransitionOverlay,
}

/// Periodic fetch-and-reconcile driver for one session.
pub struct SessionSyncEngine {
    api: Arc<dyn SessionApi>,
    config: AppConfig,
    hub: EventHub,
    state: RwLock<EngineState>,
    cycle_gate: Mutex<()>,
    epoch: AtomicU64,
    poller: StdMutex<Option<JoinHandle<()>>>,
}

impl SessionSyncEngine {
    /// Build an idle engine. Nothing is fetched until [`start_polling`](Self::start_polling)
    /// or [`refresh_once`](Self::refresh_once) is called.
    pub fn new(api: Arc<dyn SessionApi>, config: AppConfig) -> Arc<Self> {
        Arc::new(Self {
            api,
            hub: EventHub::new(config.event_capacity),
            state: RwLock::new(EngineState {
                snapshot: None,
                machine: GameStateMachine::new(config.round_duration),
                scores: ScoreTracker::new(),
                challenges: ChallengeLifecycleTracker::new(),
                overlay: TransitionOverlay::new(config.overlay_expiry),
            }),
            cycle_gate: Mutex::new(()),
            epoch: AtomicU64::new(0),
            poller: StdMutex::new(None),
            config,
        })
    }

    /// Remote API this engine fetches from.
    pub fn api(&self) -> Arc<dyn SessionApi> {
        Arc::clone(&self.api)
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Start polling `session_id` every `interval`, replacing any running poller.
    ///
    /// The first fetch happens immediately. Intervals below [`MIN_POLL_INTERVAL`] are raised
    /// to it.
    pub fn start_polling(self: &Arc<Self>, session_id: impl Into<String>, interval: Duration) {
        let session_id = session_id.into();
        if interval < MIN_POLL_INTERVAL {
            warn!(
                session_id = %session_id,
                interval_ms = interval.as_millis() as u64,
                "poll interval too short; using the minimum"
            );
        }
        let interval = interval.max(MIN_POLL_INTERVAL);
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        info!(session_id = %session_id, interval_ms = interval.as_millis() as u64, "starting session polling");

        let handle = tokio::spawn(poll_loop(Arc::downgrade(self), session_id, interval, epoch));
        let previous = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Cancel the poller. A fetch still in flight completes as a no-op.
    pub fn stop(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let handle = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            info!("stopped session polling");
        }
    }

    /// Stop polling and close every subscription.
    pub fn shutdown(&self) {
        self.stop();
        self.hub.close();
    }

    /// Whether a poller is currently running.
    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Run one fetch-and-reconcile cycle now and surface its failure, if any.
    ///
    /// Waits for an in-flight cycle instead of overlapping it.
    pub async fn refresh_once(&self, session_id: &str) -> Result<Arc<Session>, ServiceError> {
        let _gate = self.cycle_gate.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.run_cycle(session_id, epoch).await
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.hub.subscribe()
    }

    /// Subscribe as a `Stream`.
    pub fn events(&self) -> BroadcastStream<SessionEvent> {
        self.hub.stream()
    }

    /// Latest stored snapshot.
    pub async fn snapshot(&self) -> Option<Arc<Session>> {
        self.state.read().await.snapshot.clone()
    }

    /// Current state of the game state machine.
    pub async fn game_state(&self) -> GameState {
        self.state.read().await.machine.state()
    }

    /// Snapshot of the state machine including its confirmation flag.
    pub async fn machine_snapshot(&self) -> Snapshot {
        self.state.read().await.machine.snapshot()
    }

    /// Current team scores, optimistic values included.
    pub async fn scores(&self) -> TeamScores {
        self.state.read().await.scores.scores()
    }

    /// Latest challenge counts.
    pub async fn challenge_counts(&self) -> ChallengeCounts {
        self.state.read().await.challenges.counts()
    }

    /// Latest challenge counts of one player.
    pub async fn player_progress(&self, player_id: &str) -> PlayerChallengeProgress {
        self.state.read().await.challenges.player_progress(player_id)
    }

    /// Apply a scoring event locally and notify subscribers. Returns the new team score.
    pub async fn record_score(&self, team: TeamColor, event: ScoreEvent) -> u32 {
        self.apply_score_delta(team, event.delta()).await
    }

    /// Apply a raw delta locally and notify subscribers. Returns the new team score.
    pub async fn apply_score_delta(&self, team: TeamColor, delta: i32) -> u32 {
        let mut state = self.state.write().await;
        let before = state.scores.scores();
        let value = state.scores.apply_delta(team, delta);
        let after = state.scores.scores();
        if after != before {
            broadcast_scores_changed(&self.hub, after);
        }
        value
    }

    /// Mark `player_id` as moving to `team` until a snapshot confirms it.
    pub async fn record_transition(&self, player_id: &str, team: TeamColor) {
        self.state.write().await.overlay.record(player_id, team);
    }

    /// Drop the pending move of `player_id`.
    pub async fn clear_transition(&self, player_id: &str) -> Option<TeamColor> {
        self.state.write().await.overlay.clear(player_id)
    }

    /// Team `player_id` is moving to, if any.
    pub async fn pending_transition(&self, player_id: &str) -> Option<TeamColor> {
        self.state.read().await.overlay.target(player_id)
    }

    /// Team to display for `player_id`, pending moves first.
    pub async fn effective_team(&self, player_id: &str) -> Option<TeamColor> {
        let state = self.state.read().await;
        match state.snapshot.as_deref() {
            Some(session) => state.overlay.effective_team(session, player_id),
            None => state.overlay.target(player_id),
        }
    }

    /// Tick handler: skip when a cycle is already in flight, swallow failures.
    async fn poll_tick(&self, session_id: &str, epoch: u64) {
        let Ok(_gate) = self.cycle_gate.try_lock() else {
            debug!(session_id, "sync cycle still in flight; skipping tick");
            return;
        };

        match self.run_cycle(session_id, epoch).await {
            Ok(_) | Err(ServiceError::Stopped) => {}
            Err(err) if err.is_transient() => {
                debug!(session_id, error = %err, "poll failed; retrying on next tick");
            }
            Err(err) => {
                warn!(session_id, error = %err, "poll failed; retrying on next tick");
            }
        }
    }

    /// Fetch the snapshot (and challenges once they exist), then reconcile.
    ///
    /// Callers must hold the cycle gate.
    async fn run_cycle(&self, session_id: &str, epoch: u64) -> Result<Arc<Session>, ServiceError> {
        let session = self.api.get_session(session_id).await?;
        let challenges = if session.status >= SessionStatus::Challenge {
            Some(self.api.list_challenges(session_id).await?)
        } else {
            None
        };

        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(session_id, "discarding fetch completed after stop");
            return Err(ServiceError::Stopped);
        }

        Ok(self.reconcile(session, challenges.as_deref()).await)
    }

    async fn reconcile(&self, session: Session, challenges: Option<&[Challenge]>) -> Arc<Session> {
        let session = Arc::new(session);
        let now = OffsetDateTime::now_utc();
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let previous = state.snapshot.replace(Arc::clone(&session));
        if previous.as_ref().is_some_and(|previous| previous.id != session.id) {
            info!(session_id = %session.id, "switched to a new session");
            state.scores.reset();
            state.challenges.reset();
        }

        let session_changed = previous
            .as_deref()
            .is_none_or(|previous| !previous.same_view(&session));
        let scores_changed = state.scores.reconcile(&session);
        let counts_changed = challenges.is_some_and(|list| state.challenges.update(list));

        let confirmed = state.overlay.prune(&session);
        if !confirmed.is_empty() {
            debug!(session_id = %session.id, players = ?confirmed, "team moves settled");
        }

        let transition = state
            .machine
            .observe(&session, state.challenges.counts(), now);

        if session_changed {
            broadcast_session_changed(&self.hub, previous.as_deref(), &session);
        }
        if scores_changed {
            broadcast_scores_changed(&self.hub, state.scores.scores());
        }
        if counts_changed {
            broadcast_challenges_updated(&self.hub, state.challenges.counts());
        }
        if let Some(transition) = transition {
            info!(
                session_id = %session.id,
                from = ?transition.from,
                to = ?transition.to,
                source = ?transition.source,
                "game state changed"
            );
            broadcast_transition(&self.hub, &transition);
        }

        session
    }
}

impl Drop for SessionSyncEngine {
    fn drop(&mut self) {
        let handle = self
            .poller
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// Supervised polling task. Holds a weak handle so dropping the engine ends the loop.
async fn poll_loop(
    engine: Weak<SessionSyncEngine>,
    session_id: String,
    interval: Duration,
    epoch: u64,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(engine) = engine.upgrade() else {
            break;
        };
        if engine.epoch.load(Ordering::SeqCst) != epoch {
            break;
        }
        engine.poll_tick(&session_id, epoch).await;
    }
}
