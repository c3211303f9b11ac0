//! Client configuration loading: polling cadence, team rules and round timing.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the client looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/client.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "DRAWDUEL_CONFIG_PATH";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_TEAM_DEBOUNCE: Duration = Duration::from_millis(300);
const DEFAULT_ROUND_DURATION: Duration = Duration::from_secs(5 * 60);
const DEFAULT_TEAM_CAPACITY: usize = 2;
const DEFAULT_OVERLAY_EXPIRY: Duration = Duration::from_secs(10);
const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared by one session context.
pub struct AppConfig {
    /// Delay between two polls of the session.
    pub poll_interval: Duration,
    /// Window collapsing repeated team clicks.
    pub team_debounce: Duration,
    /// Playing time after which the client ends the round on its own.
    pub round_duration: Duration,
    /// Maximum number of players per team.
    pub team_capacity: usize,
    /// Age after which an unconfirmed team move is dropped.
    pub overlay_expiry: Duration,
    /// Buffered events per subscriber before lagging ones skip ahead.
    pub event_capacity: usize,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        poll_interval_ms = app_config.poll_interval.as_millis() as u64,
                        "loaded client config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            team_debounce: DEFAULT_TEAM_DEBOUNCE,
            round_duration: DEFAULT_ROUND_DURATION,
            team_capacity: DEFAULT_TEAM_CAPACITY,
            overlay_expiry: DEFAULT_OVERLAY_EXPIRY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every field is optional; missing ones keep their default.
struct RawConfig {
    poll_interval_ms: Option<u64>,
    team_debounce_ms: Option<u64>,
    round_duration_secs: Option<u64>,
    team_capacity: Option<usize>,
    overlay_expiry_ms: Option<u64>,
    event_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            poll_interval: value
                .poll_interval_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            team_debounce: value
                .team_debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.team_debounce),
            round_duration: value
                .round_duration_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.round_duration),
            team_capacity: value
                .team_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.team_capacity),
            overlay_expiry: value
                .overlay_expiry_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.overlay_expiry),
            event_capacity: value
                .event_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.event_capacity),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
