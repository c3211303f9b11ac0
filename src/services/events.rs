use std::sync::Arc;

use tracing::debug;

use crate::{
    services::challenge_tracker::ChallengeCounts,
    state::{
        notify::{EventHub, SessionEvent},
        session::{Session, TeamScores},
        state_machine::Transition,
    },
};

/// Broadcast a structurally new snapshot, followed by roster changes against `previous`.
pub fn broadcast_session_changed(
    hub: &EventHub,
    previous: Option<&Session>,
    session: &Arc<Session>,
) {
    debug!(session_id = %session.id, status = ?session.status, "session snapshot changed");
    hub.broadcast(SessionEvent::SessionChanged(Arc::clone(session)));

    let Some(previous) = previous.filter(|previous| previous.id == session.id) else {
        return;
    };

    for player in &session.players {
        if previous.player(&player.id).is_none() {
            hub.broadcast(SessionEvent::PlayerJoined(player.clone()));
        }
    }
    for player in &previous.players {
        if session.player(&player.id).is_none() {
            hub.broadcast(SessionEvent::PlayerLeft {
                player_id: player.id.clone(),
            });
        }
    }
}

/// Broadcast new team scores.
pub fn broadcast_scores_changed(hub: &EventHub, scores: TeamScores) {
    hub.broadcast(SessionEvent::ScoresChanged(scores));
}

/// Broadcast new challenge counts.
pub fn broadcast_challenges_updated(hub: &EventHub, counts: ChallengeCounts) {
    hub.broadcast(SessionEvent::ChallengesUpdated(counts));
}

/// Broadcast the status and/or phase carried by an accepted transition.
///
/// Only the parts that actually changed are sent.
pub fn broadcast_transition(hub: &EventHub, transition: &Transition) {
    if transition.status_changed() {
        hub.broadcast(SessionEvent::StatusChanged(transition.to.status()));
    }
    if transition.phase_changed() {
        hub.broadcast(SessionEvent::PhaseChanged(transition.to.phase()));
    }
}
