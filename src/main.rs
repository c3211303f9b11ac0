//! drawduel-sync binary: follows one game session and logs every change it observes.

use std::{env, sync::Arc};

use anyhow::{Context, bail};
use drawduel_sync::{
    api::http::{HttpApiConfig, HttpSessionApi},
    config::AppConfig,
    state::{SessionContext, SessionEvent, session::TeamColor},
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SESSION_ID_ENV: &str = "DRAWDUEL_SESSION_ID";
const JOIN_TEAM_ENV: &str = "DRAWDUEL_JOIN_TEAM";
const PLAYER_ID_ENV: &str = "DRAWDUEL_PLAYER_ID";

/// Team requested through [`JOIN_TEAM_ENV`].
#[derive(Debug, Clone, Copy)]
enum JoinTarget {
    Team(TeamColor),
    Auto,
}

impl JoinTarget {
    fn parse(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(Self::Team(TeamColor::Red)),
            "blue" => Ok(Self::Team(TeamColor::Blue)),
            "auto" => Ok(Self::Auto),
            other => bail!("{JOIN_TEAM_ENV} must be red, blue or auto, got `{other}`"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let session_id = env::var(SESSION_ID_ENV).with_context(|| format!("reading {SESSION_ID_ENV}"))?;
    let player_id = env::var(PLAYER_ID_ENV).unwrap_or_else(|_| "observer".into());
    let join = env::var(JOIN_TEAM_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(|value| JoinTarget::parse(&value))
        .transpose()?;

    let api_config = HttpApiConfig::from_env().context("loading API configuration")?;
    let api = HttpSessionApi::new(api_config).context("building API client")?;
    let context = SessionContext::new(Arc::new(api), player_id.clone(), config);

    let mut events = context.engine().subscribe();
    context.watch(session_id.clone());
    info!(session_id = %session_id, player_id = %player_id, "watching session");

    if let Some(join) = join {
        let result = match join {
            JoinTarget::Team(team) => context.teams().join_team(&session_id, team).await,
            JoinTarget::Auto => {
                context
                    .teams()
                    .join_available_team(&session_id, &player_id)
                    .await
            }
        };
        match result {
            Ok(outcome) => info!(session_id = %session_id, ?outcome, "team request finished"),
            Err(err) => match err.user_message() {
                Some(message) => warn!(session_id = %session_id, error = %message, "team request failed"),
                None => info!(session_id = %session_id, "team request deferred to the next poll"),
            },
        }
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event subscriber lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("shutting down");
    context.shutdown();
    Ok(())
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::SessionChanged(session) => info!(
            session_id = %session.id,
            status = ?session.status,
            phase = ?session.phase,
            players = session.players.len(),
            "session changed"
        ),
        SessionEvent::PlayerJoined(player) => {
            info!(player_id = %player.id, name = %player.name, team = ?player.team, "player joined")
        }
        SessionEvent::PlayerLeft { player_id } => info!(player_id = %player_id, "player left"),
        SessionEvent::StatusChanged(status) => info!(?status, "status changed"),
        SessionEvent::PhaseChanged(phase) => info!(?phase, "phase changed"),
        SessionEvent::ScoresChanged(scores) => {
            info!(red = scores.red, blue = scores.blue, "scores changed")
        }
        SessionEvent::ChallengesUpdated(counts) => info!(
            total = counts.total,
            with_image = counts.with_image,
            resolved = counts.resolved,
            "challenges updated"
        ),
    }
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
