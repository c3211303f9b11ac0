use std::time::Duration;

use time::OffsetDateTime;
use tracing::debug;

use crate::{
    services::challenge_tracker::ChallengeCounts,
    state::session::{GamePhase, Session, SessionStatus},
};

/// How long the playing status lasts before the client ends it on its own.
pub const DEFAULT_ROUND_DURATION: Duration = Duration::from_secs(5 * 60);

/// Status/phase pair held by the machine.
///
/// The phase is always [`GamePhase::None`] outside of [`SessionStatus::Playing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameState {
    status: SessionStatus,
    phase: GamePhase,
}

impl Default for GameState {
    fn default() -> Self {
        Self::LOBBY
    }
}

impl GameState {
    /// Initial state.
    pub const LOBBY: GameState = GameState {
        status: SessionStatus::Lobby,
        phase: GamePhase::None,
    };
    /// Challenge writing.
    pub const CHALLENGE: GameState = GameState {
        status: SessionStatus::Challenge,
        phase: GamePhase::None,
    };
    /// Drawing round.
    pub const DRAWING: GameState = GameState {
        status: SessionStatus::Playing,
        phase: GamePhase::Drawing,
    };
    /// Guessing round.
    pub const GUESSING: GameState = GameState {
        status: SessionStatus::Playing,
        phase: GamePhase::Guessing,
    };
    /// Terminal state.
    pub const FINISHED: GameState = GameState {
        status: SessionStatus::Finished,
        phase: GamePhase::None,
    };

    /// Build a state, clearing the phase when the status is not playing.
    pub fn new(status: SessionStatus, phase: GamePhase) -> Self {
        let phase = match status {
            SessionStatus::Playing => phase,
            _ => GamePhase::None,
        };
        Self { status, phase }
    }

    /// State reported by a snapshot.
    pub fn of(session: &Session) -> Self {
        Self::new(session.status, session.phase)
    }

    /// Session status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Gameplay phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Whether no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        self.status == SessionStatus::Finished
    }

    /// Position in the single-pass game flow.
    fn rank(&self) -> u8 {
        match (self.status, self.phase) {
            (SessionStatus::Lobby, _) => 0,
            (SessionStatus::Challenge, _) => 1,
            (SessionStatus::Playing, GamePhase::None) => 2,
            (SessionStatus::Playing, GamePhase::Drawing) => 3,
            (SessionStatus::Playing, GamePhase::Guessing) => 4,
            (SessionStatus::Finished, _) => 5,
        }
    }
}

/// Local signal that justified an inferred transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceReason {
    /// Every player sent all their challenges.
    AllChallengesSent,
    /// Every challenge has an image.
    AllImagesReady,
    /// Every challenge is resolved.
    AllChallengesResolved,
    /// The round ran out of time.
    RoundTimeElapsed,
}

/// Who decided a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionSource {
    /// The snapshot reported a state ahead of the local one.
    Server,
    /// The client inferred it before the server caught up.
    Inferred(InferenceReason),
}

/// Accepted state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before the change.
    pub from: GameState,
    /// State after the change.
    pub to: GameState,
    /// Origin of the change.
    pub source: TransitionSource,
}

impl Transition {
    /// Whether the session status differs between both ends.
    pub fn status_changed(&self) -> bool {
        self.from.status != self.to.status
    }

    /// Whether the phase differs between both ends.
    pub fn phase_changed(&self) -> bool {
        self.from.phase != self.to.phase
    }
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current state.
    pub state: GameState,
    /// Number of accepted transitions.
    pub version: usize,
    /// Whether the current state was inferred locally and not yet reported by the server.
    pub awaiting_confirmation: bool,
}

/// Client-side game flow: `lobby → challenge → playing/drawing → playing/guessing → finished`.
///
/// Server-reported states win whenever they are ahead of the local state. Reports that lag
/// behind a local inference are ignored so the observed status never moves backward.
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    state: GameState,
    session_id: Option<String>,
    round_duration: Duration,
    version: usize,
    awaiting_confirmation: bool,
}

impl Default for GameStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_ROUND_DURATION)
    }
}

impl GameStateMachine {
    /// Create a new state machine initialised in the lobby.
    pub fn new(round_duration: Duration) -> Self {
        Self {
            state: GameState::LOBBY,
            session_id: None,
            round_duration,
            version: 0,
            awaiting_confirmation: false,
        }
    }

    /// Inspect the current state.
    pub fn state(&self) -> GameState {
        self.state
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            version: self.version,
            awaiting_confirmation: self.awaiting_confirmation,
        }
    }

    /// Forget everything and go back to the lobby.
    pub fn reset(&mut self) {
        self.state = GameState::LOBBY;
        self.session_id = None;
        self.version = 0;
        self.awaiting_confirmation = false;
    }

    /// Evaluate a new snapshot and return the accepted transition, if any.
    ///
    /// At most one transition is accepted per call.
    pub fn observe(
        &mut self,
        session: &Session,
        counts: ChallengeCounts,
        now: OffsetDateTime,
    ) -> Option<Transition> {
        let reported = GameState::of(session);

        if self.session_id.as_deref() != Some(session.id.as_str()) {
            let switched_from = self.session_id.is_some().then_some(self.state);
            if switched_from.is_some() {
                debug!(session_id = %session.id, "new session observed; resetting state machine");
            }
            self.reset();
            self.session_id = Some(session.id.clone());

            // A switch is a server-side change even when it lands back in the lobby.
            if let Some(previous) = switched_from {
                self.state = previous;
                if previous != reported {
                    return Some(self.accept(reported, TransitionSource::Server));
                }
            }
        }

        if reported == self.state {
            self.awaiting_confirmation = false;
        } else if reported.rank() > self.state.rank() {
            return Some(self.accept(reported, TransitionSource::Server));
        } else {
            debug!(
                session_id = %session.id,
                local = ?self.state,
                reported = ?reported,
                "ignoring snapshot behind local state"
            );
        }

        let (next, reason) = self.infer(session, counts, now)?;
        Some(self.accept(next, TransitionSource::Inferred(reason)))
    }

    fn infer(
        &self,
        session: &Session,
        counts: ChallengeCounts,
        now: OffsetDateTime,
    ) -> Option<(GameState, InferenceReason)> {
        match self.state.status {
            SessionStatus::Challenge if session.all_challenges_sent() => {
                Some((GameState::DRAWING, InferenceReason::AllChallengesSent))
            }
            SessionStatus::Playing if self.round_elapsed(session, now) => {
                Some((GameState::FINISHED, InferenceReason::RoundTimeElapsed))
            }
            SessionStatus::Playing => match self.state.phase {
                GamePhase::Drawing if counts.all_have_images() => {
                    Some((GameState::GUESSING, InferenceReason::AllImagesReady))
                }
                GamePhase::Guessing if counts.all_resolved() => {
                    Some((GameState::FINISHED, InferenceReason::AllChallengesResolved))
                }
                _ => None,
            },
            _ => None,
        }
    }

    fn round_elapsed(&self, session: &Session, now: OffsetDateTime) -> bool {
        session
            .started_at
            .is_some_and(|started_at| now - started_at >= self.round_duration)
    }

    fn accept(&mut self, to: GameState, source: TransitionSource) -> Transition {
        let transition = Transition {
            from: self.state,
            to,
            source,
        };
        self.state = to;
        self.version += 1;
        self.awaiting_confirmation = matches!(source, TransitionSource::Inferred(_));
        debug!(from = ?transition.from, to = ?to, source = ?source, "game state transition");
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::{Player, Role, TeamColor};

    fn at(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(seconds)
    }

    fn session(state: GameState, challenges_sent: u8) -> Session {
        let mut session = Session::new("s1");
        session.status = state.status();
        session.phase = state.phase();
        session.players = ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(i, id)| Player {
                id: id.to_string(),
                name: id.to_uppercase(),
                team: Some(if i < 2 { TeamColor::Red } else { TeamColor::Blue }),
                role: Role::None,
                is_host: i == 0,
                challenges_sent,
            })
            .collect();
        session
    }

    fn counts(total: usize, with_image: usize, resolved: usize) -> ChallengeCounts {
        ChallengeCounts {
            total,
            with_image,
            resolved,
        }
    }

    fn machine_at(state: GameState) -> GameStateMachine {
        let mut sm = GameStateMachine::default();
        sm.observe(&session(state, 0), ChallengeCounts::default(), at(0));
        assert_eq!(sm.state(), state);
        sm
    }

    #[test]
    fn initial_state_is_lobby() {
        let sm = GameStateMachine::default();
        assert_eq!(sm.state(), GameState::LOBBY);
        assert_eq!(sm.snapshot().version, 0);
    }

    #[test]
    fn server_state_is_adopted_without_inference() {
        let mut sm = GameStateMachine::default();
        // Every challenge sent, but the server reports the jump to challenge first.
        let transition = sm
            .observe(&session(GameState::CHALLENGE, 3), counts(12, 0, 0), at(0))
            .unwrap();
        assert_eq!(transition.source, TransitionSource::Server);
        assert_eq!(sm.state(), GameState::CHALLENGE);

        // Next identical snapshot: local inference may now run.
        let transition = sm
            .observe(&session(GameState::CHALLENGE, 3), counts(12, 0, 0), at(1))
            .unwrap();
        assert_eq!(
            transition.source,
            TransitionSource::Inferred(InferenceReason::AllChallengesSent)
        );
        assert_eq!(sm.state(), GameState::DRAWING);
        assert!(sm.snapshot().awaiting_confirmation);
    }

    #[test]
    fn stale_snapshot_keeps_local_inference_until_confirmed() {
        let mut sm = machine_at(GameState::CHALLENGE);
        sm.observe(&session(GameState::CHALLENGE, 3), counts(12, 0, 0), at(1));
        assert_eq!(sm.state(), GameState::DRAWING);

        assert_eq!(
            sm.observe(&session(GameState::CHALLENGE, 3), counts(12, 0, 0), at(2)),
            None
        );
        assert_eq!(sm.state(), GameState::DRAWING);
        assert!(sm.snapshot().awaiting_confirmation);

        assert_eq!(
            sm.observe(&session(GameState::DRAWING, 3), counts(12, 0, 0), at(3)),
            None
        );
        assert!(!sm.snapshot().awaiting_confirmation);
    }

    #[test]
    fn all_images_ready_moves_to_guessing() {
        let mut sm = machine_at(GameState::DRAWING);
        assert_eq!(
            sm.observe(&session(GameState::DRAWING, 3), counts(12, 11, 0), at(1)),
            None
        );
        let transition = sm
            .observe(&session(GameState::DRAWING, 3), counts(12, 12, 0), at(2))
            .unwrap();
        assert!(transition.phase_changed());
        assert!(!transition.status_changed());
        assert_eq!(sm.state(), GameState::GUESSING);
    }

    #[test]
    fn all_challenges_resolved_finishes_the_game() {
        let mut sm = machine_at(GameState::GUESSING);
        let transition = sm
            .observe(&session(GameState::GUESSING, 3), counts(12, 12, 12), at(1))
            .unwrap();
        assert_eq!(
            transition.source,
            TransitionSource::Inferred(InferenceReason::AllChallengesResolved)
        );
        assert!(transition.status_changed());
        assert!(transition.phase_changed());
        assert_eq!(sm.state(), GameState::FINISHED);
        assert!(sm.state().is_terminal());
    }

    #[test]
    fn round_timeout_finishes_any_playing_phase() {
        for phase in [GameState::DRAWING, GameState::GUESSING] {
            let mut sm = machine_at(phase);
            let mut snapshot = session(phase, 3);
            snapshot.started_at = Some(at(0));

            assert_eq!(sm.observe(&snapshot, counts(12, 0, 0), at(299)), None);
            let transition = sm.observe(&snapshot, counts(12, 0, 0), at(300)).unwrap();
            assert_eq!(
                transition.source,
                TransitionSource::Inferred(InferenceReason::RoundTimeElapsed)
            );
            assert_eq!(sm.state(), GameState::FINISHED);
        }
    }

    #[test]
    fn new_session_id_resets_the_machine() {
        let mut sm = machine_at(GameState::GUESSING);
        let mut other = session(GameState::LOBBY, 0);
        other.id = "s2".into();
        let transition = sm
            .observe(&other, ChallengeCounts::default(), at(1))
            .unwrap();
        assert_eq!(transition.from, GameState::GUESSING);
        assert_eq!(transition.to, GameState::LOBBY);
        assert_eq!(transition.source, TransitionSource::Server);
        assert!(transition.status_changed());
        assert!(transition.phase_changed());
        assert_eq!(sm.state(), GameState::LOBBY);
        assert_eq!(sm.snapshot().version, 1);
        assert!(!sm.snapshot().awaiting_confirmation);
    }

    #[test]
    fn switching_to_a_session_in_the_same_state_is_silent() {
        let mut sm = machine_at(GameState::CHALLENGE);
        let mut other = session(GameState::CHALLENGE, 0);
        other.id = "s2".into();
        assert_eq!(sm.observe(&other, ChallengeCounts::default(), at(1)), None);
        assert_eq!(sm.state(), GameState::CHALLENGE);
    }

    #[test]
    fn observed_status_never_decreases_and_guessing_never_returns_to_drawing() {
        let states = [
            GameState::LOBBY,
            GameState::CHALLENGE,
            GameState::new(SessionStatus::Playing, GamePhase::None),
            GameState::DRAWING,
            GameState::GUESSING,
            GameState::FINISHED,
        ];
        let count_options = [counts(0, 0, 0), counts(4, 4, 0), counts(4, 4, 4)];

        // Every sequence of four snapshots over every state, with varying local signals.
        for a in states {
            for b in states {
                for c in states {
                    for d in states {
                        for (i, signals) in count_options.iter().enumerate() {
                            let mut sm = GameStateMachine::default();
                            let mut observed = vec![sm.state()];
                            for (step, state) in [a, b, c, d].into_iter().enumerate() {
                                let snapshot = session(state, if i > 0 { 3 } else { 0 });
                                sm.observe(&snapshot, *signals, at(step as i64));
                                observed.push(sm.state());
                            }
                            for pair in observed.windows(2) {
                                assert!(pair[0].status() <= pair[1].status(), "{observed:?}");
                                assert!(
                                    !(pair[0].phase() == GamePhase::Guessing
                                        && pair[1].phase() == GamePhase::Drawing),
                                    "{observed:?}"
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}
