//! Error types shared by the HTTP session API implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::api::{ApiError, ErrorCategory, error::is_capacity_message};

/// Convenient result alias returning [`HttpApiError`] failures.
pub type HttpResult<T> = Result<T, HttpApiError>;

/// Failures that can occur while talking to the game server over HTTP.
#[derive(Debug, Error)]
pub enum HttpApiError {
    /// Required environment variable is missing.
    #[error("missing API environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Environment variable holds a value that cannot be parsed.
    #[error("invalid value `{value}` for API environment variable `{var}`")]
    InvalidEnvVar { var: &'static str, value: String },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent or timed out.
    #[error("failed to send request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("server rejected `{path}` with status {status}: {message}")]
    RequestStatus {
        path: String,
        status: StatusCode,
        message: String,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

impl HttpApiError {
    /// Recovery class of this failure.
    pub fn category(&self) -> ErrorCategory {
        match self {
            HttpApiError::RequestSend { .. } => ErrorCategory::Transient,
            HttpApiError::RequestStatus {
                status, message, ..
            } => match *status {
                StatusCode::REQUEST_TIMEOUT
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT => ErrorCategory::Transient,
                StatusCode::NOT_FOUND => ErrorCategory::Absence,
                StatusCode::CONFLICT if !is_capacity_message(message) => ErrorCategory::Conflict,
                _ => ErrorCategory::from_message(message),
            },
            HttpApiError::DecodeResponse { source, .. } if source.is_timeout() => {
                ErrorCategory::Transient
            }
            _ => ErrorCategory::Fatal,
        }
    }
}

impl From<HttpApiError> for ApiError {
    fn from(err: HttpApiError) -> Self {
        let category = err.category();
        let message = match &err {
            HttpApiError::RequestStatus { message, .. } => message.clone(),
            other => other.to_string(),
        };
        ApiError::new(category, message).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: StatusCode, message: &str) -> HttpApiError {
        HttpApiError::RequestStatus {
            path: "sessions/s1/join".into(),
            status,
            message: message.into(),
        }
    }

    #[test]
    fn gateway_failures_are_transient() {
        let err = status_error(StatusCode::SERVICE_UNAVAILABLE, "upstream down");
        assert_eq!(err.category(), ErrorCategory::Transient);
    }

    #[test]
    fn server_messages_keep_their_category() {
        let err: ApiError =
            status_error(StatusCode::CONFLICT, "Player already in game session").into();
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert_eq!(err.message(), "Player already in game session");

        let err: ApiError = status_error(StatusCode::BAD_REQUEST, "team is full").into();
        assert_eq!(err.category(), ErrorCategory::Fatal);
        assert!(err.is_capacity_rejection());
    }

    #[test]
    fn status_codes_classify_before_message_text() {
        let err = status_error(StatusCode::NOT_FOUND, "session s1 not found");
        assert_eq!(err.category(), ErrorCategory::Absence);

        let err = status_error(StatusCode::CONFLICT, "seat taken");
        assert_eq!(err.category(), ErrorCategory::Conflict);

        let err: ApiError = status_error(StatusCode::CONFLICT, "team blue is full").into();
        assert_eq!(err.category(), ErrorCategory::Fatal);
        assert!(err.is_capacity_rejection());
    }
}
