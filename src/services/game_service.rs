use std::sync::Arc;

use tracing::{debug, info};
use validator::Validate;

use crate::{
    api::SessionApi,
    error::ServiceError,
    services::{score_tracker::ScoreEvent, sync_engine::SessionSyncEngine},
    state::session::{Challenge, ChallengeDraft, Session, TeamColor},
};

/// Result of a submitted guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    /// Whether the guess matched one of the target words.
    pub correct: bool,
    /// Guessing team score after the optimistic update.
    pub team_score: u32,
}

/// Open a new session on the server.
pub async fn create_session(api: &dyn SessionApi) -> Result<Session, ServiceError> {
    let session = api.create_session().await?;
    info!(session_id = %session.id, "created session");
    Ok(session)
}

/// Move the session from the lobby to challenge writing. Only the host may do this.
pub async fn start_session(
    engine: &SessionSyncEngine,
    session_id: &str,
    player_id: &str,
) -> Result<Arc<Session>, ServiceError> {
    let session = match engine.snapshot().await {
        Some(session) if session.id == session_id => session,
        _ => engine.refresh_once(session_id).await?,
    };

    let is_host = session
        .player(player_id)
        .is_some_and(|player| player.is_host);
    if !is_host {
        return Err(ServiceError::InvalidState(
            "only the host can start the game".into(),
        ));
    }

    engine.api().start_session(session_id).await?;
    info!(session_id, player_id, "session started");
    engine.refresh_once(session_id).await
}

/// Validate and send a challenge written by the local player.
pub async fn send_challenge(
    engine: &SessionSyncEngine,
    session_id: &str,
    draft: ChallengeDraft,
) -> Result<Challenge, ServiceError> {
    draft.validate()?;

    let challenge = engine.api().send_challenge(session_id, draft).await?;
    info!(session_id, challenge_id = %challenge.id, "challenge sent");
    engine.refresh_once(session_id).await?;
    Ok(challenge)
}

/// Check a guess against the challenge, score it locally and report it.
///
/// The score moves before the server answers so the UI reacts immediately; the next
/// snapshot carrying non-default scores overrides it.
pub async fn submit_answer(
    engine: &SessionSyncEngine,
    session_id: &str,
    challenge: &Challenge,
    team: TeamColor,
    answer: &str,
) -> Result<AnswerOutcome, ServiceError> {
    let guess = normalize(answer);
    if guess.is_empty() {
        return Err(ServiceError::InvalidInput("answer must not be empty".into()));
    }

    let correct = challenge
        .target_words
        .iter()
        .any(|word| normalize(word) == guess);
    let event = if correct {
        ScoreEvent::CorrectGuess
    } else {
        ScoreEvent::WrongGuess
    };
    let team_score = engine.record_score(team, event).await;
    debug!(session_id, challenge_id = %challenge.id, team = %team, correct, "answer scored");

    engine
        .api()
        .answer_challenge(session_id, &challenge.id, answer.trim(), correct)
        .await?;

    Ok(AnswerOutcome {
        correct,
        team_score,
    })
}

/// Charge `team` for asking for a new image. Returns the new team score.
pub async fn regenerate_image(engine: &SessionSyncEngine, team: TeamColor) -> u32 {
    let score = engine.record_score(team, ScoreEvent::ImageRegeneration).await;
    info!(team = %team, score, "image regeneration charged");
    score
}

/// Lowercase and collapse inner whitespace.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::mock::{ApiOperation, MockSessionApi},
        config::AppConfig,
        state::session::{Player, Role, SessionStatus, TeamScores},
    };

    fn seated(id: &str, team: TeamColor, is_host: bool) -> Player {
        Player {
            id: id.into(),
            name: id.into(),
            team: Some(team),
            role: Role::None,
            is_host,
            challenges_sent: 0,
        }
    }

    fn engine_for(mock: &MockSessionApi, player_id: &str) -> Arc<SessionSyncEngine> {
        SessionSyncEngine::new(
            Arc::new(mock.as_player(player_id, player_id)),
            AppConfig::default(),
        )
    }

    fn setup(status: SessionStatus) -> MockSessionApi {
        let mock = MockSessionApi::new();
        let mut session = Session::new("s1");
        session.status = status;
        session.players = vec![
            seated("ana", TeamColor::Red, true),
            seated("ben", TeamColor::Blue, false),
        ];
        mock.insert_session(session);
        mock
    }

    fn kite_challenge() -> Challenge {
        Challenge {
            id: "c1".into(),
            session_id: "s1".into(),
            player_id: "ana".into(),
            target_words: vec!["Paper Kite".into()],
            forbidden_words: vec![],
            image_url: Some("https://img/1".into()),
            prompt: None,
            resolved: false,
        }
    }

    #[tokio::test]
    async fn create_session_returns_lobby() {
        let mock = MockSessionApi::new();
        let session = create_session(&mock).await.unwrap();
        assert_eq!(session.status, SessionStatus::Lobby);
        assert!(mock.session(&session.id).is_some());
    }

    #[tokio::test]
    async fn only_host_starts_the_game() {
        let mock = setup(SessionStatus::Lobby);

        let guest = engine_for(&mock, "ben");
        let err = start_session(&guest, "s1", "ben").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(mock.count(ApiOperation::StartSession), 0);

        let host = engine_for(&mock, "ana");
        let session = start_session(&host, "s1", "ana").await.unwrap();
        assert_eq!(session.status, SessionStatus::Challenge);
    }

    #[tokio::test]
    async fn invalid_drafts_never_reach_the_server() {
        let mock = setup(SessionStatus::Challenge);
        let engine = engine_for(&mock, "ana");

        let draft = ChallengeDraft::new(["kite"], ["Kite"]);
        let err = send_challenge(&engine, "s1", draft).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(mock.count(ApiOperation::SendChallenge), 0);
    }

    #[tokio::test]
    async fn sent_challenge_is_counted() {
        let mock = setup(SessionStatus::Challenge);
        let engine = engine_for(&mock, "ana");

        let draft = ChallengeDraft::new(["kite", "beach"], ["wind"]);
        let challenge = send_challenge(&engine, "s1", draft).await.unwrap();
        assert_eq!(challenge.target_words, vec!["kite", "beach"]);

        let snapshot = engine.snapshot().await.unwrap();
        assert_eq!(snapshot.player("ana").unwrap().challenges_sent, 1);
        assert_eq!(engine.player_progress("ana").await.sent, 1);
    }

    #[tokio::test]
    async fn answers_ignore_case_and_spacing() {
        let mock = setup(SessionStatus::Playing);
        mock.insert_challenge(kite_challenge());
        let engine = engine_for(&mock, "ben");

        let outcome = submit_answer(&engine, "s1", &kite_challenge(), TeamColor::Blue, "  paper   KITE ")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AnswerOutcome {
                correct: true,
                team_score: 125
            }
        );
        assert_eq!(
            mock.session("s1").unwrap().team_scores,
            TeamScores { red: 100, blue: 125 }
        );
    }

    #[tokio::test]
    async fn wrong_answer_costs_one_point() {
        let mock = setup(SessionStatus::Playing);
        mock.insert_challenge(kite_challenge());
        let engine = engine_for(&mock, "ben");

        let outcome = submit_answer(&engine, "s1", &kite_challenge(), TeamColor::Blue, "kite")
            .await
            .unwrap();
        assert!(!outcome.correct);
        assert_eq!(engine.scores().await.blue, 99);
    }

    #[tokio::test]
    async fn regeneration_is_penalised_down_to_zero() {
        let mock = setup(SessionStatus::Playing);
        let engine = engine_for(&mock, "ana");

        assert_eq!(regenerate_image(&engine, TeamColor::Red).await, 90);
        for _ in 0..20 {
            regenerate_image(&engine, TeamColor::Red).await;
        }
        assert_eq!(engine.scores().await.red, 0);
    }
}
