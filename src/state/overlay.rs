//! Client-only markers for team changes the server has not confirmed yet.

use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::Instant;

use crate::state::session::{Session, TeamColor};

#[derive(Debug, Clone, Copy)]
struct PendingMove {
    target: TeamColor,
    recorded_at: Instant,
}

/// Map of player id to the team they are moving to.
///
/// Holds at most one entry per player; recording a new move replaces the previous one.
#[derive(Debug)]
pub struct TransitionOverlay {
    entries: IndexMap<String, PendingMove>,
    expiry: Duration,
}

impl TransitionOverlay {
    /// Create an empty overlay whose entries expire after `expiry`.
    pub fn new(expiry: Duration) -> Self {
        Self {
            entries: IndexMap::new(),
            expiry,
        }
    }

    /// Mark `player_id` as moving to `target`.
    pub fn record(&mut self, player_id: &str, target: TeamColor) {
        self.entries.insert(
            player_id.to_string(),
            PendingMove {
                target,
                recorded_at: Instant::now(),
            },
        );
    }

    /// Drop the marker of `player_id`. Returns the team it pointed at.
    pub fn clear(&mut self, player_id: &str) -> Option<TeamColor> {
        self.entries
            .shift_remove(player_id)
            .map(|pending| pending.target)
    }

    /// Team `player_id` is moving to, if any.
    pub fn target(&self, player_id: &str) -> Option<TeamColor> {
        self.entries.get(player_id).map(|pending| pending.target)
    }

    /// Number of pending moves.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no move is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove entries confirmed by `session` and entries older than the expiry.
    ///
    /// Returns the ids of removed players.
    pub fn prune(&mut self, session: &Session) -> Vec<String> {
        let now = Instant::now();
        let expiry = self.expiry;
        let mut removed = Vec::new();
        self.entries.retain(|player_id, pending| {
            let confirmed = session.team_of(player_id) == Some(pending.target);
            let expired = now.duration_since(pending.recorded_at) >= expiry;
            if confirmed || expired {
                removed.push(player_id.clone());
            }
            !(confirmed || expired)
        });
        removed
    }

    /// Team to display for `player_id`: the pending target, else the confirmed team.
    pub fn effective_team(&self, session: &Session, player_id: &str) -> Option<TeamColor> {
        self.target(player_id)
            .or_else(|| session.team_of(player_id))
    }

    /// Occupancy of `team` as the UI should show it, counting pending moves.
    pub fn effective_occupancy(&self, session: &Session, team: TeamColor) -> usize {
        let confirmed = session
            .players
            .iter()
            .filter(|player| self.effective_team(session, &player.id) == Some(team))
            .count();
        let incoming = self
            .entries
            .iter()
            .filter(|(player_id, pending)| {
                pending.target == team && session.player(player_id).is_none()
            })
            .count();
        confirmed + incoming
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::{Player, Role};

    fn session_with(players: &[(&str, Option<TeamColor>)]) -> Session {
        let mut session = Session::new("s1");
        session.players = players
            .iter()
            .map(|(id, team)| Player {
                id: id.to_string(),
                name: id.to_string(),
                team: *team,
                role: Role::None,
                is_host: false,
                challenges_sent: 0,
            })
            .collect();
        session
    }

    #[tokio::test(start_paused = true)]
    async fn one_entry_per_player() {
        let mut overlay = TransitionOverlay::new(Duration::from_secs(10));
        overlay.record("a", TeamColor::Red);
        overlay.record("a", TeamColor::Blue);
        assert_eq!(overlay.len(), 1);
        assert_eq!(overlay.target("a"), Some(TeamColor::Blue));
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_entries_are_pruned() {
        let mut overlay = TransitionOverlay::new(Duration::from_secs(10));
        overlay.record("a", TeamColor::Blue);
        overlay.record("b", TeamColor::Red);

        let session = session_with(&[("a", Some(TeamColor::Blue)), ("b", Some(TeamColor::Blue))]);
        assert_eq!(overlay.prune(&session), vec!["a".to_string()]);
        assert_eq!(overlay.target("b"), Some(TeamColor::Red));
        assert_eq!(overlay.effective_team(&session, "b"), Some(TeamColor::Red));
        assert_eq!(overlay.effective_occupancy(&session, TeamColor::Blue), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entries_expire() {
        let mut overlay = TransitionOverlay::new(Duration::from_secs(10));
        overlay.record("a", TeamColor::Blue);
        let session = session_with(&[("a", Some(TeamColor::Red))]);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(overlay.prune(&session).is_empty());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(overlay.prune(&session), vec!["a".to_string()]);
        assert!(overlay.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn incoming_players_count_towards_occupancy() {
        let mut overlay = TransitionOverlay::new(Duration::from_secs(10));
        overlay.record("new", TeamColor::Red);
        let session = session_with(&[("a", Some(TeamColor::Red))]);
        assert_eq!(overlay.effective_occupancy(&session, TeamColor::Red), 2);
    }
}
