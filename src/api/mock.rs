//! In-memory game server for tests.
//!
//! Several [`MockSessionApi`] handles can share one server, each acting as a different
//! player. Every call is recorded, failures can be queued per operation and a latency can
//! be injected to exercise overlapping requests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use futures::future::BoxFuture;
use uuid::Uuid;

use super::{ApiError, ApiResult, SessionApi};
use crate::state::session::{
    CHALLENGES_PER_PLAYER, Challenge, ChallengeDraft, Player, Role, Session, SessionStatus,
    TeamColor,
};

const MOCK_TEAM_CAPACITY: usize = 2;
const CORRECT_ANSWER_POINTS: u32 = 25;
const WRONG_ANSWER_PENALTY: u32 = 1;

/// Operations of the [`SessionApi`], used to target recorded calls and injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    CreateSession,
    JoinSession,
    LeaveSession,
    GetSession,
    StartSession,
    ListChallenges,
    SendChallenge,
    AnswerChallenge,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    pub player_id: String,
    pub operation: ApiOperation,
    pub session_id: Option<String>,
    pub team: Option<TeamColor>,
}

#[derive(Debug, Default)]
struct MockServer {
    sessions: HashMap<String, Session>,
    challenges: HashMap<String, Vec<Challenge>>,
    calls: Vec<ApiCall>,
    failures: HashMap<ApiOperation, VecDeque<ApiError>>,
    latency: Duration,
    in_flight: usize,
    peak_in_flight: usize,
}

/// Handle on a shared in-memory server, acting as one player.
#[derive(Debug, Clone)]
pub struct MockSessionApi {
    server: Arc<Mutex<MockServer>>,
    player_id: Arc<str>,
    player_name: Arc<str>,
}

impl Default for MockSessionApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSessionApi {
    /// Create a fresh server with a handle acting as player `host`.
    pub fn new() -> Self {
        Self {
            server: Arc::default(),
            player_id: Arc::from("host"),
            player_name: Arc::from("Host"),
        }
    }

    /// Another handle on the same server acting as a different player.
    pub fn as_player(&self, player_id: &str, name: &str) -> Self {
        Self {
            server: Arc::clone(&self.server),
            player_id: Arc::from(player_id),
            player_name: Arc::from(name),
        }
    }

    /// Player this handle acts as.
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    fn lock(&self) -> MutexGuard<'_, MockServer> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a session as-is, replacing any previous one with the same id.
    pub fn insert_session(&self, session: Session) {
        self.lock().sessions.insert(session.id.clone(), session);
    }

    /// Mutate a stored session in place. Returns `false` when it does not exist.
    pub fn update_session(&self, session_id: &str, update: impl FnOnce(&mut Session)) -> bool {
        match self.lock().sessions.get_mut(session_id) {
            Some(session) => {
                update(session);
                true
            }
            None => false,
        }
    }

    /// Current server-side copy of a session.
    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.lock().sessions.get(session_id).cloned()
    }

    /// Store a challenge for its session.
    pub fn insert_challenge(&self, challenge: Challenge) {
        self.lock()
            .challenges
            .entry(challenge.session_id.clone())
            .or_default()
            .push(challenge);
    }

    /// Mutate the challenges of a session in place.
    pub fn update_challenges(&self, session_id: &str, update: impl FnOnce(&mut Vec<Challenge>)) {
        update(
            self.lock()
                .challenges
                .entry(session_id.to_string())
                .or_default(),
        );
    }

    /// Make the next call of `operation` fail with `error`. Failures queue up in order.
    pub fn fail_next(&self, operation: ApiOperation, error: ApiError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Delay applied to every call before it touches server state.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Every call recorded so far, across all handles.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls of `operation`.
    pub fn count(&self, operation: ApiOperation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Highest number of calls that were waiting on the injected latency at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.lock().peak_in_flight
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Record the call, then run `apply` against the server after latency and injected
    /// failures were honoured.
    fn call<T, F>(
        &self,
        operation: ApiOperation,
        session_id: Option<&str>,
        team: Option<TeamColor>,
        apply: F,
    ) -> BoxFuture<'static, ApiResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut MockServer, &str, &str) -> ApiResult<T> + Send + 'static,
    {
        let (failure, latency) = {
            let mut server = self.lock();
            server.calls.push(ApiCall {
                player_id: self.player_id.to_string(),
                operation,
                session_id: session_id.map(str::to_string),
                team,
            });
            let failure = server
                .failures
                .get_mut(&operation)
                .and_then(VecDeque::pop_front);
            (failure, server.latency)
        };

        let server = Arc::clone(&self.server);
        let player_id = Arc::clone(&self.player_id);
        let player_name = Arc::clone(&self.player_name);
        Box::pin(async move {
            if !latency.is_zero() {
                {
                    let mut guard = server.lock().unwrap_or_else(PoisonError::into_inner);
                    guard.in_flight += 1;
                    guard.peak_in_flight = guard.peak_in_flight.max(guard.in_flight);
                }
                tokio::time::sleep(latency).await;
                server
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .in_flight -= 1;
            }
            if let Some(err) = failure {
                return Err(err);
            }
            let mut server = server.lock().unwrap_or_else(PoisonError::into_inner);
            apply(&mut server, &player_id, &player_name)
        })
    }
}

impl MockServer {
    fn session_mut(&mut self, session_id: &str) -> ApiResult<&mut Session> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| ApiError::absence(format!("session {session_id} not found")))
    }
}

impl SessionApi for MockSessionApi {
    fn create_session(&self) -> BoxFuture<'static, ApiResult<Session>> {
        self.call(ApiOperation::CreateSession, None, None, |server, _, _| {
            let session = Session::new(Uuid::new_v4().to_string());
            server.sessions.insert(session.id.clone(), session.clone());
            Ok(session)
        })
    }

    fn join_session(&self, session_id: &str, team: TeamColor) -> BoxFuture<'static, ApiResult<()>> {
        let id = session_id.to_string();
        self.call(
            ApiOperation::JoinSession,
            Some(session_id),
            Some(team),
            move |server, player_id, player_name| {
                let session = server.session_mut(&id)?;
                if session.player(player_id).is_some() {
                    return Err(ApiError::from_message("Player already in game session"));
                }
                if session.occupancy(team) >= MOCK_TEAM_CAPACITY {
                    return Err(ApiError::from_message(format!("team {team} is full")));
                }
                let is_host = session.players.is_empty();
                session.players.push(Player {
                    id: player_id.to_string(),
                    name: player_name.to_string(),
                    team: Some(team),
                    role: Role::None,
                    is_host,
                    challenges_sent: 0,
                });
                Ok(())
            },
        )
    }

    fn leave_session(&self, session_id: &str) -> BoxFuture<'static, ApiResult<()>> {
        let id = session_id.to_string();
        self.call(
            ApiOperation::LeaveSession,
            Some(session_id),
            None,
            move |server, player_id, _| {
                let session = server.session_mut(&id)?;
                let before = session.players.len();
                session.players.retain(|player| player.id != player_id);
                if session.players.len() == before {
                    return Err(ApiError::from_message("Player not in session"));
                }
                Ok(())
            },
        )
    }

    fn get_session(&self, session_id: &str) -> BoxFuture<'static, ApiResult<Session>> {
        let id = session_id.to_string();
        self.call(ApiOperation::GetSession, Some(session_id), None, move |server, _, _| {
            server.session_mut(&id).map(|session| session.clone())
        })
    }

    fn start_session(&self, session_id: &str) -> BoxFuture<'static, ApiResult<()>> {
        let id = session_id.to_string();
        self.call(
            ApiOperation::StartSession,
            Some(session_id),
            None,
            move |server, player_id, _| {
                let session = server.session_mut(&id)?;
                let is_host = session.player(player_id).is_some_and(|player| player.is_host);
                if !is_host {
                    return Err(ApiError::fatal("only the host can start the session"));
                }
                if session.status == SessionStatus::Lobby {
                    session.status = SessionStatus::Challenge;
                }
                Ok(())
            },
        )
    }

    fn list_challenges(&self, session_id: &str) -> BoxFuture<'static, ApiResult<Vec<Challenge>>> {
        let id = session_id.to_string();
        self.call(
            ApiOperation::ListChallenges,
            Some(session_id),
            None,
            move |server, _, _| {
                server.session_mut(&id)?;
                Ok(server.challenges.get(&id).cloned().unwrap_or_default())
            },
        )
    }

    fn send_challenge(
        &self,
        session_id: &str,
        draft: ChallengeDraft,
    ) -> BoxFuture<'static, ApiResult<Challenge>> {
        let id = session_id.to_string();
        self.call(
            ApiOperation::SendChallenge,
            Some(session_id),
            None,
            move |server, player_id, _| {
                let session = server.session_mut(&id)?;
                let Some(player) = session.players.iter_mut().find(|p| p.id == player_id) else {
                    return Err(ApiError::from_message("Player not in session"));
                };
                if player.challenges_sent >= CHALLENGES_PER_PLAYER {
                    return Err(ApiError::fatal("all challenges already sent"));
                }
                player.challenges_sent += 1;

                let challenge = Challenge {
                    id: Uuid::new_v4().to_string(),
                    session_id: id.clone(),
                    player_id: player_id.to_string(),
                    target_words: draft.target_words,
                    forbidden_words: draft.forbidden_words,
                    image_url: None,
                    prompt: None,
                    resolved: false,
                };
                server
                    .challenges
                    .entry(id)
                    .or_default()
                    .push(challenge.clone());
                Ok(challenge)
            },
        )
    }

    fn answer_challenge(
        &self,
        session_id: &str,
        challenge_id: &str,
        _answer: &str,
        is_correct: bool,
    ) -> BoxFuture<'static, ApiResult<()>> {
        let id = session_id.to_string();
        let challenge_id = challenge_id.to_string();
        self.call(
            ApiOperation::AnswerChallenge,
            Some(session_id),
            None,
            move |server, player_id, _| {
                let challenge = server
                    .challenges
                    .get_mut(&id)
                    .and_then(|list| list.iter_mut().find(|c| c.id == challenge_id))
                    .ok_or_else(|| ApiError::absence(format!("challenge {challenge_id} not found")))?;
                challenge.resolved = true;

                let session = server.session_mut(&id)?;
                let Some(team) = session.team_of(player_id) else {
                    return Err(ApiError::from_message("Player not in session"));
                };
                let current = session.team_scores.get(team);
                let next = if is_correct {
                    current.saturating_add(CORRECT_ANSWER_POINTS)
                } else {
                    current.saturating_sub(WRONG_ANSWER_PENALTY)
                };
                session.team_scores.set(team, next);
                Ok(())
            },
        )
    }
}
