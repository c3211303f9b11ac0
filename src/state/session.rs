use std::fmt;

use time::OffsetDateTime;
use validator::{Validate, ValidationError};

use crate::api::models::{
    ChallengeEntity, PhaseEntity, PlayerEntity, RoleEntity, SessionEntity, StatusEntity,
    TeamEntity, TeamScoresEntity,
};

/// Score every team starts a session with.
pub const INITIAL_TEAM_SCORE: u32 = 100;
/// Number of challenges each player has to send before drawing starts.
pub const CHALLENGES_PER_PLAYER: u8 = 3;

/// Coarse lifecycle of a session, ordered from lobby to finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionStatus {
    /// Players gather and pick their teams.
    Lobby,
    /// Players write the challenges the other team will draw.
    Challenge,
    /// Drawing and guessing rounds are running.
    Playing,
    /// Final scores are shown.
    Finished,
}

/// Gameplay phase, only meaningful while the session is [`SessionStatus::Playing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum GamePhase {
    /// No phase reported.
    #[default]
    None,
    /// Drawers generate images for their challenges.
    Drawing,
    /// Guessers try to find the target words.
    Guessing,
}

/// One of the two teams of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeamColor {
    /// Red team.
    Red,
    /// Blue team.
    Blue,
}

impl TeamColor {
    /// Both colors, red first.
    pub const ALL: [TeamColor; 2] = [TeamColor::Red, TeamColor::Blue];

    /// The opposing team.
    pub fn other(self) -> Self {
        match self {
            TeamColor::Red => TeamColor::Blue,
            TeamColor::Blue => TeamColor::Red,
        }
    }

    /// Lowercase name used on the wire and in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            TeamColor::Red => "red",
            TeamColor::Blue => "blue",
        }
    }
}

impl fmt::Display for TeamColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a player holds during the playing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// Generates images for a challenge.
    Drawer,
    /// Guesses the words behind an image.
    Guesser,
    /// No role assigned yet.
    #[default]
    None,
}

/// Player as seen in a session snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Server-side identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current team, `None` while unassigned.
    pub team: Option<TeamColor>,
    /// Current role.
    pub role: Role,
    /// Whether this player created the session.
    pub is_host: bool,
    /// Challenges this player already sent (0..=3).
    pub challenges_sent: u8,
}

/// Scores of both teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamScores {
    /// Red team score.
    pub red: u32,
    /// Blue team score.
    pub blue: u32,
}

impl Default for TeamScores {
    fn default() -> Self {
        Self {
            red: INITIAL_TEAM_SCORE,
            blue: INITIAL_TEAM_SCORE,
        }
    }
}

impl TeamScores {
    /// Score of the given team.
    pub fn get(&self, team: TeamColor) -> u32 {
        match team {
            TeamColor::Red => self.red,
            TeamColor::Blue => self.blue,
        }
    }

    /// Overwrite the score of the given team.
    pub fn set(&mut self, team: TeamColor, value: u32) {
        match team {
            TeamColor::Red => self.red = value,
            TeamColor::Blue => self.blue = value,
        }
    }

    /// Whether both teams still hold the initial score.
    pub fn is_initial(&self) -> bool {
        *self == Self::default()
    }
}

/// Full session state as returned by one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Server-side identifier.
    pub id: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Gameplay phase; [`GamePhase::None`] outside of the playing status.
    pub phase: GamePhase,
    /// Players in join order.
    pub players: Vec<Player>,
    /// Team scores as recorded by the server.
    pub team_scores: TeamScores,
    /// When the playing status started, if it did.
    pub started_at: Option<OffsetDateTime>,
}

impl Session {
    /// Build an empty lobby session.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: SessionStatus::Lobby,
            phase: GamePhase::None,
            players: Vec::new(),
            team_scores: TeamScores::default(),
            started_at: None,
        }
    }

    /// Look a player up by id.
    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.id == player_id)
    }

    /// Confirmed team of a player, if they are in the session and assigned.
    pub fn team_of(&self, player_id: &str) -> Option<TeamColor> {
        self.player(player_id).and_then(|player| player.team)
    }

    /// Number of players currently in `team`.
    pub fn occupancy(&self, team: TeamColor) -> usize {
        self.players
            .iter()
            .filter(|player| player.team == Some(team))
            .count()
    }

    /// Whether every player sent their full share of challenges.
    ///
    /// An empty roster never counts as complete.
    pub fn all_challenges_sent(&self) -> bool {
        !self.players.is_empty()
            && self
                .players
                .iter()
                .all(|player| player.challenges_sent >= CHALLENGES_PER_PLAYER)
    }

    /// Structural comparison used to decide whether subscribers must hear about a new snapshot.
    ///
    /// Compares player identity, name, team, role and challenge progress, plus the session
    /// status, phase and scores. Timestamps are ignored.
    pub fn same_view(&self, other: &Session) -> bool {
        self.id == other.id
            && self.status == other.status
            && self.phase == other.phase
            && self.team_scores == other.team_scores
            && self.players.len() == other.players.len()
            && self.players.iter().zip(&other.players).all(|(a, b)| {
                a.id == b.id
                    && a.name == b.name
                    && a.team == b.team
                    && a.role == b.role
                    && a.challenges_sent == b.challenges_sent
            })
    }
}

/// Challenge written by one player for the opposing team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Server-side identifier.
    pub id: String,
    /// Session the challenge belongs to.
    pub session_id: String,
    /// Player who wrote the challenge.
    pub player_id: String,
    /// Words the guessers must find.
    pub target_words: Vec<String>,
    /// Words the drawer may not use in a prompt.
    pub forbidden_words: Vec<String>,
    /// Generated image, once a drawer produced one.
    pub image_url: Option<String>,
    /// Prompt used to generate the image.
    pub prompt: Option<String>,
    /// Whether the challenge was answered.
    pub resolved: bool,
}

impl Challenge {
    /// Whether a non-empty image reference is attached.
    pub fn has_image(&self) -> bool {
        self.image_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }
}

/// Challenge as written by a player before the server assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
#[validate(schema(function = "validate_draft_words"))]
pub struct ChallengeDraft {
    /// Words the other team must guess.
    #[validate(length(min = 1, max = 3))]
    pub target_words: Vec<String>,
    /// Words the drawer may not use.
    #[validate(length(max = 5))]
    pub forbidden_words: Vec<String>,
}

impl ChallengeDraft {
    /// Build a draft, trimming every word.
    pub fn new<T, F>(target_words: T, forbidden_words: F) -> Self
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        Self {
            target_words: trimmed(target_words),
            forbidden_words: trimmed(forbidden_words),
        }
    }
}

fn trimmed<I>(words: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    words
        .into_iter()
        .map(|word| word.as_ref().trim().to_string())
        .collect()
}

fn validate_draft_words(draft: &ChallengeDraft) -> Result<(), ValidationError> {
    let all_words = draft.target_words.iter().chain(&draft.forbidden_words);
    if all_words.clone().any(|word| word.trim().is_empty()) {
        let mut err = ValidationError::new("blank_word");
        err.message = Some("challenge words must not be blank".into());
        return Err(err);
    }

    let overlaps = draft.target_words.iter().any(|target| {
        draft
            .forbidden_words
            .iter()
            .any(|forbidden| forbidden.eq_ignore_ascii_case(target))
    });
    if overlaps {
        let mut err = ValidationError::new("forbidden_target");
        err.message = Some("a target word cannot also be forbidden".into());
        return Err(err);
    }

    Ok(())
}

impl From<TeamEntity> for Option<TeamColor> {
    fn from(value: TeamEntity) -> Self {
        match value {
            TeamEntity::Red => Some(TeamColor::Red),
            TeamEntity::Blue => Some(TeamColor::Blue),
            TeamEntity::Unassigned => None,
        }
    }
}

impl From<TeamColor> for TeamEntity {
    fn from(value: TeamColor) -> Self {
        match value {
            TeamColor::Red => TeamEntity::Red,
            TeamColor::Blue => TeamEntity::Blue,
        }
    }
}

impl From<RoleEntity> for Role {
    fn from(value: RoleEntity) -> Self {
        match value {
            RoleEntity::Drawer => Role::Drawer,
            RoleEntity::Guesser => Role::Guesser,
            RoleEntity::None => Role::None,
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            team: value.team.and_then(Into::into),
            role: value.role.map(Into::into).unwrap_or_default(),
            is_host: value.is_host,
            challenges_sent: value.challenges_sent.min(CHALLENGES_PER_PLAYER),
        }
    }
}

impl From<TeamScoresEntity> for TeamScores {
    fn from(value: TeamScoresEntity) -> Self {
        let clamp = |score: i64| u32::try_from(score.max(0)).unwrap_or(u32::MAX);
        Self {
            red: clamp(value.red),
            blue: clamp(value.blue),
        }
    }
}

/// Fold the wire status/phase pair into the domain pair.
///
/// Servers report the guessing round either as `status = guessing` or as
/// `status = playing, phase = guessing`; both decode to the same state.
fn decode_status(status: StatusEntity, phase: Option<PhaseEntity>) -> (SessionStatus, GamePhase) {
    match status {
        StatusEntity::Lobby => (SessionStatus::Lobby, GamePhase::None),
        StatusEntity::Challenge => (SessionStatus::Challenge, GamePhase::None),
        StatusEntity::Guessing => (SessionStatus::Playing, GamePhase::Guessing),
        StatusEntity::Playing => {
            let phase = match phase {
                Some(PhaseEntity::Drawing) => GamePhase::Drawing,
                Some(PhaseEntity::Guessing) => GamePhase::Guessing,
                Some(PhaseEntity::None) | None => GamePhase::None,
            };
            (SessionStatus::Playing, phase)
        }
        StatusEntity::Finished => (SessionStatus::Finished, GamePhase::None),
    }
}

impl From<SessionEntity> for Session {
    fn from(value: SessionEntity) -> Self {
        let (status, phase) = decode_status(value.status, value.phase);
        Self {
            id: value.id,
            status,
            phase,
            players: value.players.into_iter().map(Into::into).collect(),
            team_scores: value.team_scores.map(Into::into).unwrap_or_default(),
            started_at: value.started_at,
        }
    }
}

impl From<ChallengeEntity> for Challenge {
    fn from(value: ChallengeEntity) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            player_id: value.player_id,
            target_words: value.target_words,
            forbidden_words: value.forbidden_words,
            image_url: value.image_url,
            prompt: value.prompt,
            resolved: value.resolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, team: Option<TeamColor>) -> Player {
        Player {
            id: id.into(),
            name: id.to_uppercase(),
            team,
            role: Role::None,
            is_host: false,
            challenges_sent: 0,
        }
    }

    #[test]
    fn guessing_status_decodes_to_playing_guessing() {
        let json = r#"{"id":"s1","status":"guessing","players":[]}"#;
        let entity: SessionEntity = serde_json::from_str(json).unwrap();
        let session: Session = entity.into();
        assert_eq!(session.status, SessionStatus::Playing);
        assert_eq!(session.phase, GamePhase::Guessing);
    }

    #[test]
    fn phase_is_dropped_outside_playing() {
        let json = r#"{"id":"s1","status":"challenge","phase":"drawing"}"#;
        let entity: SessionEntity = serde_json::from_str(json).unwrap();
        let session: Session = entity.into();
        assert_eq!(session.phase, GamePhase::None);
        assert!(session.team_scores.is_initial());
    }

    #[test]
    fn unknown_team_and_negative_scores_are_sanitized() {
        let json = r#"{
            "id": "s1",
            "status": "playing",
            "phase": "drawing",
            "startedAt": "2026-01-01T10:00:00Z",
            "teamScores": {"red": -4, "blue": 130},
            "players": [
                {"id": "p1", "name": "Ana", "team": "green", "role": "drawer", "isHost": true, "challengesSent": 7}
            ]
        }"#;
        let entity: SessionEntity = serde_json::from_str(json).unwrap();
        let session: Session = entity.into();
        assert_eq!(session.team_scores, TeamScores { red: 0, blue: 130 });
        assert_eq!(session.players[0].team, None);
        assert_eq!(session.players[0].role, Role::Drawer);
        assert_eq!(session.players[0].challenges_sent, CHALLENGES_PER_PLAYER);
        assert!(session.started_at.is_some());
    }

    #[test]
    fn occupancy_counts_only_assigned_players() {
        let mut session = Session::new("s1");
        session.players = vec![
            player("a", Some(TeamColor::Red)),
            player("b", Some(TeamColor::Red)),
            player("c", None),
        ];
        assert_eq!(session.occupancy(TeamColor::Red), 2);
        assert_eq!(session.occupancy(TeamColor::Blue), 0);
        assert_eq!(session.team_of("c"), None);
    }

    #[test]
    fn same_view_ignores_timestamps_but_not_teams() {
        let mut a = Session::new("s1");
        a.players = vec![player("a", Some(TeamColor::Red))];
        let mut b = a.clone();
        b.started_at = Some(OffsetDateTime::UNIX_EPOCH);
        assert!(a.same_view(&b));

        b.players[0].team = Some(TeamColor::Blue);
        assert!(!a.same_view(&b));
    }

    #[test]
    fn empty_roster_never_completes_challenges() {
        let session = Session::new("s1");
        assert!(!session.all_challenges_sent());
    }

    #[test]
    fn draft_validation_rejects_blank_and_overlapping_words() {
        assert!(ChallengeDraft::new(["cat", "hat"], ["pet"]).validate().is_ok());
        assert!(ChallengeDraft::new(Vec::<String>::new(), ["pet"]).validate().is_err());
        assert!(ChallengeDraft::new(["cat", " "], ["pet"]).validate().is_err());
        assert!(ChallengeDraft::new(["cat"], ["CAT"]).validate().is_err());
        assert!(ChallengeDraft::new(["a", "b", "c", "d"], ["x"]).validate().is_err());
    }

    #[test]
    fn blank_image_reference_does_not_count() {
        let challenge = Challenge {
            id: "c1".into(),
            session_id: "s1".into(),
            player_id: "p1".into(),
            target_words: vec!["cat".into()],
            forbidden_words: vec![],
            image_url: Some("  ".into()),
            prompt: None,
            resolved: false,
        };
        assert!(!challenge.has_image());
    }
}
