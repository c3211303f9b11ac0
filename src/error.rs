use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    api::{ApiError, ErrorCategory},
    state::session::TeamColor,
};

/// Errors that can occur in user-triggered operations and explicit refreshes.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The destination team already holds its maximum number of players.
    #[error("team {0} is full")]
    TeamFull(TeamColor),
    /// No team has a free slot.
    #[error("both teams are full")]
    TeamsFull,
    /// Invalid input provided by the user.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The engine was stopped while the operation was running.
    #[error("session sync stopped")]
    Stopped,
    /// Remote call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ServiceError {
    /// Recovery class when the failure came from the remote API.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            ServiceError::Api(err) => Some(err.category()),
            _ => None,
        }
    }

    /// Whether the failure is a network hiccup the next poll will absorb.
    pub fn is_transient(&self) -> bool {
        self.category() == Some(ErrorCategory::Transient)
    }

    /// Message to show the user, or `None` when the failure must stay invisible.
    pub fn user_message(&self) -> Option<String> {
        match self {
            ServiceError::TeamFull(_) => Some("team is full".into()),
            ServiceError::TeamsFull => Some("both teams are full".into()),
            ServiceError::Stopped => None,
            ServiceError::Api(err) if err.is_transient() => None,
            ServiceError::Api(err) => Some(err.message().to_string()),
            other => Some(other.to_string()),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_stay_invisible() {
        let err = ServiceError::from(ApiError::transient("connection reset"));
        assert!(err.is_transient());
        assert_eq!(err.user_message(), None);
    }

    #[test]
    fn capacity_rejection_has_specific_message() {
        assert_eq!(
            ServiceError::TeamFull(TeamColor::Blue).user_message().as_deref(),
            Some("team is full")
        );
    }

    #[test]
    fn fatal_failures_show_server_message() {
        let err = ServiceError::from(ApiError::fatal("session closed by host"));
        assert_eq!(err.user_message().as_deref(), Some("session closed by host"));
    }
}
