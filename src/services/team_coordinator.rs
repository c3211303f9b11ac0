//! Team selection: capacity checks, single-flight moves and recovery from stale server state.

use std::{
    sync::{
        Arc, Mutex as StdMutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    api::{ApiError, ErrorCategory},
    error::ServiceError,
    services::sync_engine::SessionSyncEngine,
    state::session::{Session, TeamColor},
};

/// How a team request ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamChangeOutcome {
    /// The server accepted the move.
    Applied,
    /// The player already sits in the requested team; nothing was sent.
    AlreadyInTeam,
    /// Collapsed into a click made within the debounce window.
    Debounced,
    /// Another team operation of this coordinator was still in flight.
    Skipped,
    /// A network hiccup interrupted the move; the next poll settles it.
    Deferred,
}

/// Resets the single-flight flag when the operation ends, however it ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Serialises the team moves of one player and keeps the overlay honest.
pub struct TeamAssignmentCoordinator {
    engine: Arc<SessionSyncEngine>,
    player_id: String,
    in_flight: AtomicBool,
    last_click: StdMutex<Option<Instant>>,
    debounce: Duration,
    capacity: usize,
}

impl TeamAssignmentCoordinator {
    /// Build a coordinator acting for `player_id` through `engine`.
    pub fn new(engine: Arc<SessionSyncEngine>, player_id: impl Into<String>) -> Self {
        let debounce = engine.config().team_debounce;
        let capacity = engine.config().team_capacity;
        Self {
            engine,
            player_id: player_id.into(),
            in_flight: AtomicBool::new(false),
            last_click: StdMutex::new(None),
            debounce,
            capacity,
        }
    }

    /// Player this coordinator moves around.
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Whether a team operation is currently running.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Move the player to `team` with leave-then-join.
    pub async fn change_team(
        &self,
        session_id: &str,
        team: TeamColor,
    ) -> Result<TeamChangeOutcome, ServiceError> {
        if !self.accept_click() {
            debug!(session_id, team = %team, "team click debounced");
            return Ok(TeamChangeOutcome::Debounced);
        }
        let Some(_flight) = self.begin() else {
            debug!(session_id, team = %team, "team change already in flight; ignoring");
            return Ok(TeamChangeOutcome::Skipped);
        };

        let session = self.latest_snapshot(session_id).await?;
        if session.team_of(&self.player_id) == Some(team) {
            return Ok(TeamChangeOutcome::AlreadyInTeam);
        }
        self.ensure_capacity(&session, team)?;

        let origin = session.team_of(&self.player_id);
        self.engine.record_transition(&self.player_id, team).await;
        info!(session_id, player_id = %self.player_id, team = %team, "changing team");

        let api = self.engine.api();
        let (left, moved) = match api.leave_session(session_id).await {
            Ok(()) => (true, api.join_session(session_id, team).await),
            Err(err) => (false, Err(err)),
        };
        let moved = match moved {
            Ok(()) => Ok(()),
            Err(err) => self.recover_move(session_id, team, err).await,
        };

        // Losing a join race after leaving must not leave the player without a seat.
        if let (true, Err(err), Some(origin)) = (left, &moved, origin) {
            if !err.is_transient() {
                self.rejoin(session_id, origin).await;
            }
        }

        let outcome = self.settle(session_id, &self.player_id, team, moved).await;
        self.refresh_quietly(session_id).await;
        outcome
    }

    /// Join whichever team has fewer players, red on a tie.
    pub async fn join_available_team(
        &self,
        session_id: &str,
        player_id: &str,
    ) -> Result<TeamChangeOutcome, ServiceError> {
        let Some(_flight) = self.begin() else {
            debug!(session_id, "team operation already in flight; ignoring");
            return Ok(TeamChangeOutcome::Skipped);
        };

        let session = self.latest_snapshot(session_id).await?;
        if session.team_of(player_id).is_some() {
            return Ok(TeamChangeOutcome::AlreadyInTeam);
        }
        let team = pick_available_team(&session, self.capacity).ok_or(ServiceError::TeamsFull)?;

        self.engine.record_transition(player_id, team).await;
        info!(session_id, player_id, team = %team, "joining available team");

        let joined = self.safe_join(session_id, team).await;
        let outcome = self.settle(session_id, player_id, team, joined).await;

        match self.engine.refresh_once(session_id).await {
            Ok(session) if session.player(player_id).is_none() => {
                warn!(session_id, player_id, "joined player not visible in session yet");
            }
            Ok(_) => {}
            Err(err) => warn!(session_id, error = %err, "refresh after join failed"),
        }
        outcome
    }

    /// Join `team` directly.
    pub async fn join_team(
        &self,
        session_id: &str,
        team: TeamColor,
    ) -> Result<TeamChangeOutcome, ServiceError> {
        if !self.accept_click() {
            debug!(session_id, team = %team, "team click debounced");
            return Ok(TeamChangeOutcome::Debounced);
        }
        let Some(_flight) = self.begin() else {
            debug!(session_id, team = %team, "team operation already in flight; ignoring");
            return Ok(TeamChangeOutcome::Skipped);
        };

        let session = self.latest_snapshot(session_id).await?;
        if session.team_of(&self.player_id) == Some(team) {
            return Ok(TeamChangeOutcome::AlreadyInTeam);
        }
        self.ensure_capacity(&session, team)?;

        self.engine.record_transition(&self.player_id, team).await;
        info!(session_id, player_id = %self.player_id, team = %team, "joining team");

        let joined = self.safe_join(session_id, team).await;
        let outcome = self.settle(session_id, &self.player_id, team, joined).await;

        self.refresh_quietly(session_id).await;
        outcome
    }

    /// Second attempt after the leave-then-join of [`change_team`](Self::change_team) failed.
    async fn recover_move(
        &self,
        session_id: &str,
        team: TeamColor,
        err: ApiError,
    ) -> Result<(), ServiceError> {
        match err.category() {
            ErrorCategory::Conflict => {
                debug!(session_id, error = %err, "still seated; joining directly");
                match self.engine.api().join_session(session_id, team).await {
                    Ok(()) => Ok(()),
                    Err(_) => self.safe_join(session_id, team).await,
                }
            }
            ErrorCategory::Absence => {
                debug!(session_id, error = %err, "not seated; refreshing before join");
                self.refresh_quietly(session_id).await;
                self.engine.api().join_session(session_id, team).await?;
                Ok(())
            }
            _ => Err(err.into()),
        }
    }

    /// Join, repairing the two ways the server view can disagree with ours.
    ///
    /// Once the server accepted the join the result is `Ok`; follow-up refreshes only log.
    async fn safe_join(&self, session_id: &str, team: TeamColor) -> Result<(), ServiceError> {
        let api = self.engine.api();
        let Err(err) = api.join_session(session_id, team).await else {
            return Ok(());
        };

        match err.category() {
            ErrorCategory::Conflict => {
                debug!(session_id, error = %err, "server still seats the player; leaving first");
                match api.leave_session(session_id).await {
                    Err(leave_err) if leave_err.category() != ErrorCategory::Absence => {
                        return Err(leave_err.into());
                    }
                    _ => {}
                }
                api.join_session(session_id, team).await?;
                self.refresh_quietly(session_id).await;
                Ok(())
            }
            ErrorCategory::Absence => {
                debug!(session_id, error = %err, "session view stale; refreshing before join");
                self.refresh_quietly(session_id).await;
                api.join_session(session_id, team).await?;
                self.refresh_quietly(session_id).await;
                Ok(())
            }
            _ => Err(err.into()),
        }
    }

    /// Take the seat back in `origin` after a failed move.
    async fn rejoin(&self, session_id: &str, origin: TeamColor) {
        match self.engine.api().join_session(session_id, origin).await {
            Ok(()) => info!(session_id, player_id = %self.player_id, team = %origin, "returned to previous team"),
            Err(err) => warn!(
                session_id,
                player_id = %self.player_id,
                team = %origin,
                error = %err,
                "could not return to previous team"
            ),
        }
    }

    /// Map the remote result to an outcome and fix the overlay accordingly.
    async fn settle(
        &self,
        session_id: &str,
        player_id: &str,
        team: TeamColor,
        result: Result<(), ServiceError>,
    ) -> Result<TeamChangeOutcome, ServiceError> {
        match result {
            Ok(()) => Ok(TeamChangeOutcome::Applied),
            Err(err) if err.is_transient() => {
                debug!(session_id, error = %err, "team move interrupted; leaving it to the next poll");
                Ok(TeamChangeOutcome::Deferred)
            }
            Err(err) => {
                warn!(session_id, error = %err, "team move failed; reverting");
                self.engine.clear_transition(player_id).await;
                match err {
                    ServiceError::Api(api_err) if api_err.is_capacity_rejection() => {
                        Err(ServiceError::TeamFull(team))
                    }
                    other => Err(other),
                }
            }
        }
    }

    fn ensure_capacity(&self, session: &Session, team: TeamColor) -> Result<(), ServiceError> {
        if session.occupancy(team) >= self.capacity {
            info!(session_id = %session.id, team = %team, "team is full");
            return Err(ServiceError::TeamFull(team));
        }
        Ok(())
    }

    async fn latest_snapshot(&self, session_id: &str) -> Result<Arc<Session>, ServiceError> {
        match self.engine.snapshot().await {
            Some(session) if session.id == session_id => Ok(session),
            _ => self.engine.refresh_once(session_id).await,
        }
    }

    async fn refresh_quietly(&self, session_id: &str) {
        if let Err(err) = self.engine.refresh_once(session_id).await {
            warn!(session_id, error = %err, "refresh after team operation failed");
        }
    }

    /// Leading-edge debounce shared by every click-driven operation.
    fn accept_click(&self) -> bool {
        let now = Instant::now();
        let mut last = self
            .last_click
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if last.is_some_and(|at| now.duration_since(at) < self.debounce) {
            return false;
        }
        *last = Some(now);
        true
    }

    fn begin(&self) -> Option<FlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(&self.in_flight))
    }
}

/// Team with fewer players and a free slot, red on a tie.
fn pick_available_team(session: &Session, capacity: usize) -> Option<TeamColor> {
    let red = session.occupancy(TeamColor::Red);
    let blue = session.occupancy(TeamColor::Blue);
    let preferred = if blue < red {
        TeamColor::Blue
    } else {
        TeamColor::Red
    };
    [preferred, preferred.other()]
        .into_iter()
        .find(|team| session.occupancy(*team) < capacity)
}
