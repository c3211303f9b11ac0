use std::{error::Error, fmt};

use thiserror::Error;

/// Result alias for remote session API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Recovery class of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The player is already where the request wanted to put them, or the slot is taken.
    Conflict,
    /// The player or session is not in the state the request expected.
    Absence,
    /// Network hiccup or timeout; the next poll will reconcile.
    Transient,
    /// Anything else; shown to the user.
    Fatal,
}

impl ErrorCategory {
    /// Classify a server-provided error message.
    ///
    /// Used by transports that only receive text from the server.
    pub fn from_message(message: &str) -> Self {
        let message = message.to_lowercase();
        if message.contains("already in") {
            ErrorCategory::Conflict
        } else if message.contains("not in") {
            ErrorCategory::Absence
        } else if ["connection", "timeout", "timed out", "network"]
            .iter()
            .any(|needle| message.contains(needle))
        {
            ErrorCategory::Transient
        } else {
            ErrorCategory::Fatal
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Absence => "absence",
            ErrorCategory::Transient => "transient",
            ErrorCategory::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

/// Whether a server message rejects a join because the team has no free slot.
pub fn is_capacity_message(message: &str) -> bool {
    message.to_lowercase().contains("is full")
}

/// Error returned by every [`SessionApi`](super::SessionApi) operation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    category: ErrorCategory,
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl ApiError {
    /// Build an error with an explicit category.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            source: None,
        }
    }

    /// Build an error whose category is derived from the message text.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCategory::from_message(&message), message)
    }

    /// Player already in the session or slot already taken.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Conflict, message)
    }

    /// Player or session missing.
    pub fn absence(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Absence, message)
    }

    /// Network or timeout failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Transient, message)
    }

    /// Unrecoverable failure.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Fatal, message)
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Recovery class of this failure.
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the failure should be left for the next poll cycle.
    pub fn is_transient(&self) -> bool {
        self.category == ErrorCategory::Transient
    }

    /// Whether the server refused a join because the team was already full.
    pub fn is_capacity_rejection(&self) -> bool {
        self.category == ErrorCategory::Fatal && is_capacity_message(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_server_messages() {
        assert_eq!(
            ErrorCategory::from_message("Player already in game session"),
            ErrorCategory::Conflict
        );
        assert_eq!(
            ErrorCategory::from_message("player not in session"),
            ErrorCategory::Absence
        );
        assert_eq!(
            ErrorCategory::from_message("Connection reset by peer"),
            ErrorCategory::Transient
        );
        assert_eq!(
            ErrorCategory::from_message("request timed out"),
            ErrorCategory::Transient
        );
        assert_eq!(
            ErrorCategory::from_message("team is full"),
            ErrorCategory::Fatal
        );
    }

    #[test]
    fn from_message_keeps_text() {
        let err = ApiError::from_message("network unreachable");
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "network unreachable");
    }
}
