use std::time::Duration;

use super::error::{HttpApiError, HttpResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime configuration describing how to reach the game server.
#[derive(Debug, Clone)]
pub struct HttpApiConfig {
    /// Root URL every request path is appended to.
    pub base_url: String,
    /// Opaque bearer token identifying the acting player.
    pub token: Option<String>,
    /// Per-request timeout; expiries surface as transient failures.
    pub timeout: Duration,
}

impl HttpApiConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Attach the bearer token identifying the acting player.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> HttpResult<Self> {
        let base_url = std::env::var("DRAWDUEL_API_URL").map_err(|_| {
            HttpApiError::MissingEnvVar {
                var: "DRAWDUEL_API_URL",
            }
        })?;

        let mut config = Self::new(base_url);

        if let Some(token) = std::env::var("DRAWDUEL_API_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
        {
            config = config.with_token(token);
        }

        if let Ok(raw) = std::env::var("DRAWDUEL_API_TIMEOUT_MS") {
            let millis = raw
                .parse::<u64>()
                .map_err(|_| HttpApiError::InvalidEnvVar {
                    var: "DRAWDUEL_API_TIMEOUT_MS",
                    value: raw.clone(),
                })?;
            config = config.with_timeout(Duration::from_millis(millis));
        }

        Ok(config)
    }
}
