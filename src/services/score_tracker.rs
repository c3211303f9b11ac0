//! Optimistic team scores reconciled against the server.

use tracing::debug;

use crate::state::session::{Session, TeamColor, TeamScores};

/// Points awarded for a correct guess.
pub const CORRECT_GUESS_POINTS: i32 = 25;
/// Points lost on a wrong guess.
pub const WRONG_GUESS_PENALTY: i32 = -1;
/// Points lost when a drawer regenerates an image.
pub const IMAGE_REGENERATION_PENALTY: i32 = -10;

/// Scoring events the client can apply before the server confirms them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreEvent {
    /// A guesser found the target words.
    CorrectGuess,
    /// A guesser answered wrong.
    WrongGuess,
    /// A drawer asked for a new image.
    ImageRegeneration,
}

impl ScoreEvent {
    /// Signed delta applied by this event.
    pub fn delta(self) -> i32 {
        match self {
            ScoreEvent::CorrectGuess => CORRECT_GUESS_POINTS,
            ScoreEvent::WrongGuess => WRONG_GUESS_PENALTY,
            ScoreEvent::ImageRegeneration => IMAGE_REGENERATION_PENALTY,
        }
    }
}

/// Holds both team scores and applies local deltas immediately.
#[derive(Debug, Clone, Default)]
pub struct ScoreTracker {
    scores: TeamScores,
}

impl ScoreTracker {
    /// Start both teams at the initial score.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current scores.
    pub fn scores(&self) -> TeamScores {
        self.scores
    }

    /// Apply `delta` to `team`, never going below zero. Returns the new team score.
    pub fn apply_delta(&mut self, team: TeamColor, delta: i32) -> u32 {
        let current = self.scores.get(team);
        let next = if delta >= 0 {
            current.saturating_add(delta.unsigned_abs())
        } else {
            current.saturating_sub(delta.unsigned_abs())
        };
        self.scores.set(team, next);
        next
    }

    /// Apply a scoring event to `team`.
    pub fn record(&mut self, team: TeamColor, event: ScoreEvent) -> u32 {
        self.apply_delta(team, event.delta())
    }

    /// Adopt server scores once the server reports anything but the initial values.
    ///
    /// A server still reporting 100/100 has not processed any scoring event yet, so local
    /// optimistic values are kept. Returns `true` when local scores changed.
    pub fn reconcile(&mut self, session: &Session) -> bool {
        let reported = session.team_scores;
        if reported.is_initial() || reported == self.scores {
            return false;
        }
        debug!(
            session_id = %session.id,
            red = reported.red,
            blue = reported.blue,
            "adopting server team scores"
        );
        self.scores = reported;
        true
    }

    /// Back to the initial score, e.g. when the engine switches sessions.
    pub fn reset(&mut self) {
        self.scores = TeamScores::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_scores(red: u32, blue: u32) -> Session {
        let mut session = Session::new("s1");
        session.team_scores = TeamScores { red, blue };
        session
    }

    #[test]
    fn convenience_deltas_match_game_rules() {
        let mut tracker = ScoreTracker::new();
        assert_eq!(tracker.record(TeamColor::Red, ScoreEvent::CorrectGuess), 125);
        assert_eq!(tracker.record(TeamColor::Red, ScoreEvent::WrongGuess), 124);
        assert_eq!(tracker.record(TeamColor::Blue, ScoreEvent::ImageRegeneration), 90);
    }

    #[test]
    fn scores_never_go_negative() {
        let mut tracker = ScoreTracker::new();
        let deltas = [-10, -60, 25, -1, -200, -10, 3, -1, -1, -1, -1];
        let (mut red, mut blue) = (100_i64, 100_i64);
        for delta in deltas {
            tracker.apply_delta(TeamColor::Blue, delta);
            tracker.apply_delta(TeamColor::Red, delta * 3);
            blue = (blue + i64::from(delta)).max(0);
            red = (red + i64::from(delta * 3)).max(0);
            let scores = tracker.scores();
            assert_eq!(i64::from(scores.blue), blue);
            assert_eq!(i64::from(scores.red), red);
        }
        assert_eq!(tracker.scores().blue, 0);
        assert_eq!(tracker.scores().red, 0);
        assert_eq!(tracker.apply_delta(TeamColor::Red, i32::MIN), 0);
    }

    #[test]
    fn default_server_scores_keep_optimistic_values() {
        let mut tracker = ScoreTracker::new();
        tracker.record(TeamColor::Red, ScoreEvent::CorrectGuess);
        assert!(!tracker.reconcile(&session_with_scores(100, 100)));
        assert_eq!(tracker.scores().red, 125);
    }

    #[test]
    fn non_default_server_scores_replace_local_values() {
        let mut tracker = ScoreTracker::new();
        tracker.record(TeamColor::Red, ScoreEvent::CorrectGuess);
        assert!(tracker.reconcile(&session_with_scores(124, 99)));
        assert_eq!(tracker.scores(), TeamScores { red: 124, blue: 99 });
        assert!(!tracker.reconcile(&session_with_scores(124, 99)));
    }
}
