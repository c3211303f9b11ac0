/// Session event fan-out.
pub mod notify;
/// Unconfirmed team moves.
pub mod overlay;
/// Domain model of a session as seen by the client.
pub mod session;
/// Game flow with local inference.
pub mod state_machine;

use std::sync::Arc;

use crate::{
    api::SessionApi,
    config::AppConfig,
    services::{sync_engine::SessionSyncEngine, team_coordinator::TeamAssignmentCoordinator},
};

pub use self::notify::{EventHub, SessionEvent};
pub use self::state_machine::{GameState, Snapshot};

/// Everything one screen needs to follow a session: a sync engine and the team coordinator
/// acting for the local player, both talking to the same API.
pub struct SessionContext {
    engine: Arc<SessionSyncEngine>,
    teams: TeamAssignmentCoordinator,
}

impl SessionContext {
    /// Build a context for `player_id`. Nothing is fetched until polling starts.
    pub fn new(api: Arc<dyn SessionApi>, player_id: impl Into<String>, config: AppConfig) -> Self {
        let engine = SessionSyncEngine::new(api, config);
        let teams = TeamAssignmentCoordinator::new(Arc::clone(&engine), player_id);
        Self { engine, teams }
    }

    /// Sync engine of this screen.
    pub fn engine(&self) -> &Arc<SessionSyncEngine> {
        &self.engine
    }

    /// Team coordinator of the local player.
    pub fn teams(&self) -> &TeamAssignmentCoordinator {
        &self.teams
    }

    /// Start polling `session_id` at the configured interval.
    pub fn watch(&self, session_id: impl Into<String>) {
        let interval = self.engine.config().poll_interval;
        self.engine.start_polling(session_id, interval);
    }

    /// Stop polling and close every subscription.
    pub fn shutdown(&self) {
        self.engine.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        api::mock::MockSessionApi,
        services::team_coordinator::TeamChangeOutcome,
        state::session::{Session, TeamColor},
    };

    #[tokio::test(start_paused = true)]
    async fn context_follows_its_own_moves() {
        let mock = MockSessionApi::new();
        mock.insert_session(Session::new("s1"));
        let context = SessionContext::new(
            Arc::new(mock.as_player("ana", "Ana")),
            "ana",
            AppConfig::default(),
        );
        let mut events = context.engine().subscribe();

        context.watch("s1");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::SessionChanged(_)
        ));

        let outcome = context.teams().join_team("s1", TeamColor::Blue).await.unwrap();
        assert_eq!(outcome, TeamChangeOutcome::Applied);
        assert_eq!(
            context.engine().effective_team("ana").await,
            Some(TeamColor::Blue)
        );

        context.shutdown();
        assert!(!context.engine().is_polling());
        while events.recv().await.is_ok() {}
    }
}
