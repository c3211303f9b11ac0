//! Read-only aggregation of challenge progress for a session.

use indexmap::IndexMap;

use crate::state::session::{CHALLENGES_PER_PLAYER, Challenge, Session};

/// Session-wide challenge counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChallengeCounts {
    /// Challenges known to the server.
    pub total: usize,
    /// Challenges with a non-empty image reference.
    pub with_image: usize,
    /// Challenges marked resolved.
    pub resolved: usize,
}

impl ChallengeCounts {
    /// Aggregate a challenge list.
    pub fn from_challenges(challenges: &[Challenge]) -> Self {
        challenges
            .iter()
            .fold(Self::default(), |mut counts, challenge| {
                counts.total += 1;
                counts.with_image += usize::from(challenge.has_image());
                counts.resolved += usize::from(challenge.resolved);
                counts
            })
    }

    /// Every challenge has an image. False when there are no challenges.
    pub fn all_have_images(&self) -> bool {
        self.total > 0 && self.with_image == self.total
    }

    /// Every challenge is resolved. False when there are no challenges.
    pub fn all_resolved(&self) -> bool {
        self.total > 0 && self.resolved == self.total
    }
}

/// Per-player slice of [`ChallengeCounts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerChallengeProgress {
    /// Challenges written by the player.
    pub sent: usize,
    /// Of those, challenges with an image.
    pub with_image: usize,
    /// Of those, challenges resolved.
    pub resolved: usize,
}

/// Progress of the challenge-writing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritingProgress {
    /// Challenges sent so far, as reported per player.
    pub sent: usize,
    /// Challenges expected from the whole roster.
    pub expected: usize,
}

/// Recomputes challenge counts from every fetched challenge list.
#[derive(Debug, Default)]
pub struct ChallengeLifecycleTracker {
    counts: ChallengeCounts,
    per_player: IndexMap<String, PlayerChallengeProgress>,
}

impl ChallengeLifecycleTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the aggregation with one computed from `challenges`.
    ///
    /// Returns `true` when the session-wide counts changed.
    pub fn update(&mut self, challenges: &[Challenge]) -> bool {
        let counts = ChallengeCounts::from_challenges(challenges);

        let mut per_player: IndexMap<String, PlayerChallengeProgress> = IndexMap::new();
        for challenge in challenges {
            let progress = per_player.entry(challenge.player_id.clone()).or_default();
            progress.sent += 1;
            progress.with_image += usize::from(challenge.has_image());
            progress.resolved += usize::from(challenge.resolved);
        }
        self.per_player = per_player;

        let changed = counts != self.counts;
        self.counts = counts;
        changed
    }

    /// Drop every count, e.g. when the engine switches sessions.
    pub fn reset(&mut self) {
        self.counts = ChallengeCounts::default();
        self.per_player.clear();
    }

    /// Latest session-wide counts.
    pub fn counts(&self) -> ChallengeCounts {
        self.counts
    }

    /// Latest counts for one player; zero when they wrote nothing yet.
    pub fn player_progress(&self, player_id: &str) -> PlayerChallengeProgress {
        self.per_player
            .get(player_id)
            .copied()
            .unwrap_or_default()
    }

    /// How far the roster is through writing challenges.
    pub fn writing_progress(session: &Session) -> WritingProgress {
        WritingProgress {
            sent: session
                .players
                .iter()
                .map(|player| usize::from(player.challenges_sent))
                .sum(),
            expected: session.players.len() * usize::from(CHALLENGES_PER_PLAYER),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::{Player, Role, TeamColor};

    fn challenge(id: &str, owner: &str, image: Option<&str>, resolved: bool) -> Challenge {
        Challenge {
            id: id.into(),
            session_id: "s1".into(),
            player_id: owner.into(),
            target_words: vec!["moon".into()],
            forbidden_words: vec![],
            image_url: image.map(str::to_string),
            prompt: None,
            resolved,
        }
    }

    #[test]
    fn counts_images_and_resolutions() {
        let mut tracker = ChallengeLifecycleTracker::new();
        let challenges = vec![
            challenge("c1", "a", Some("https://img/1"), true),
            challenge("c2", "a", Some(""), false),
            challenge("c3", "b", None, false),
        ];

        assert!(tracker.update(&challenges));
        assert_eq!(
            tracker.counts(),
            ChallengeCounts {
                total: 3,
                with_image: 1,
                resolved: 1
            }
        );
        assert_eq!(
            tracker.player_progress("a"),
            PlayerChallengeProgress {
                sent: 2,
                with_image: 1,
                resolved: 1
            }
        );
        assert_eq!(tracker.player_progress("z"), PlayerChallengeProgress::default());
    }

    #[test]
    fn unchanged_list_reports_no_change() {
        let mut tracker = ChallengeLifecycleTracker::new();
        let challenges = vec![challenge("c1", "a", None, false)];
        assert!(tracker.update(&challenges));
        assert!(!tracker.update(&challenges));
    }

    #[test]
    fn empty_list_is_never_complete() {
        let counts = ChallengeCounts::from_challenges(&[]);
        assert!(!counts.all_have_images());
        assert!(!counts.all_resolved());
    }

    #[test]
    fn writing_progress_uses_roster_size() {
        let mut session = Session::new("s1");
        session.players = (0..4)
            .map(|i| Player {
                id: format!("p{i}"),
                name: format!("P{i}"),
                team: Some(if i % 2 == 0 { TeamColor::Red } else { TeamColor::Blue }),
                role: Role::None,
                is_host: i == 0,
                challenges_sent: i,
            })
            .collect();

        let progress = ChallengeLifecycleTracker::writing_progress(&session);
        assert_eq!(progress, WritingProgress { sent: 6, expected: 12 });
    }
}
