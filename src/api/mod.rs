/// Error type and recovery categories of remote calls.
pub mod error;
/// Reqwest-backed implementation talking to the game server.
#[cfg(feature = "http-api")]
pub mod http;
/// In-memory server emulation used by tests.
#[cfg(any(test, feature = "mock-api"))]
pub mod mock;
/// Wire entities.
pub mod models;

use futures::future::BoxFuture;

pub use self::error::{ApiError, ApiResult, ErrorCategory};
use crate::state::session::{Challenge, ChallengeDraft, Session, TeamColor};

/// Abstraction over the remote session/challenge API.
///
/// The acting player is implied by the transport (auth token), so join and leave calls only
/// name the session.
pub trait SessionApi: Send + Sync {
    fn create_session(&self) -> BoxFuture<'static, ApiResult<Session>>;
    fn join_session(&self, session_id: &str, team: TeamColor) -> BoxFuture<'static, ApiResult<()>>;
    fn leave_session(&self, session_id: &str) -> BoxFuture<'static, ApiResult<()>>;
    fn get_session(&self, session_id: &str) -> BoxFuture<'static, ApiResult<Session>>;
    fn start_session(&self, session_id: &str) -> BoxFuture<'static, ApiResult<()>>;
    fn list_challenges(&self, session_id: &str) -> BoxFuture<'static, ApiResult<Vec<Challenge>>>;
    fn send_challenge(
        &self,
        session_id: &str,
        draft: ChallengeDraft,
    ) -> BoxFuture<'static, ApiResult<Challenge>>;
    fn answer_challenge(
        &self,
        session_id: &str,
        challenge_id: &str,
        answer: &str,
        is_correct: bool,
    ) -> BoxFuture<'static, ApiResult<()>>;
}
