//! Wire entities exchanged with the game server.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Session document as returned by `GET /sessions/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntity {
    pub id: String,
    pub status: StatusEntity,
    #[serde(default)]
    pub phase: Option<PhaseEntity>,
    #[serde(default)]
    pub players: Vec<PlayerEntity>,
    #[serde(default)]
    pub team_scores: Option<TeamScoresEntity>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
}

/// Session status as spelled by the server. `guessing` is sent by some server versions in
/// place of `playing` + `phase = guessing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusEntity {
    Lobby,
    Challenge,
    Playing,
    Guessing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseEntity {
    None,
    Drawing,
    Guessing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamEntity {
    Red,
    Blue,
    #[serde(other)]
    Unassigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleEntity {
    Drawer,
    Guesser,
    #[serde(other)]
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub team: Option<TeamEntity>,
    #[serde(default)]
    pub role: Option<RoleEntity>,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub challenges_sent: u8,
}

/// Scores are signed on the wire; negative values are clamped when decoded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TeamScoresEntity {
    pub red: i64,
    pub blue: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeEntity {
    pub id: String,
    pub session_id: String,
    pub player_id: String,
    #[serde(default)]
    pub target_words: Vec<String>,
    #[serde(default)]
    pub forbidden_words: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub resolved: bool,
}

/// Body of `POST /sessions/{id}/join`.
#[derive(Debug, Clone, Serialize)]
pub struct JoinRequest {
    pub team: TeamEntity,
}

/// Body of `POST /sessions/{id}/challenges`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    pub target_words: Vec<String>,
    pub forbidden_words: Vec<String>,
}

/// Body of `POST /sessions/{id}/challenges/{challenge_id}/answer`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub answer: String,
    pub is_correct: bool,
}

/// Error payload; servers use either key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// First non-empty message carried by the payload.
    pub fn into_message(self) -> Option<String> {
        self.error
            .into_iter()
            .chain(self.message)
            .find(|message| !message.trim().is_empty())
    }
}
