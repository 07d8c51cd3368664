//! Launch sequence and game completion monitor.
//!
//! The sequence is stateless; callers guarantee it runs at most once per
//! cycle (see [`CycleHandle::claim_launch`](crate::store::CycleHandle::claim_launch)).

use std::error::Error;
use std::fmt;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::core::types::{GameId, LeaderboardEntry};
use crate::io::api::ConsoleApi;
use crate::io::render::RenderSink;
use crate::session::SessionState;

const START_FAILED_FALLBACK: &str = "Failed to start game";

/// Everything the launch sequence needs, taken from the session up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub token_id: u64,
    pub game: GameId,
    pub level: u8,
}

impl LaunchRequest {
    pub fn from_session(session: &SessionState, level: u8) -> Result<Self, LaunchError> {
        let game = session.selected_game().ok_or(LaunchError::NoSelection)?;
        let player = session.player.as_ref().ok_or(LaunchError::NoPlayer)?;
        if !game.info().has_level(level) {
            return Err(LaunchError::InvalidLevel { game, level });
        }
        Ok(Self {
            token_id: player.token_id,
            game,
            level,
        })
    }
}

#[derive(Debug)]
pub enum LaunchError {
    NoSelection,
    NoPlayer,
    InvalidLevel { game: GameId, level: u8 },
    /// The persist-token call failed in transit.
    Persist(anyhow::Error),
    /// The persist-token call was refused by the server.
    PersistRejected(String),
    /// The start-game call failed in transit.
    Start(anyhow::Error),
    /// The server answered the start-game call with `success: false`.
    Rejected(String),
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchError::NoSelection => write!(f, "No game selected"),
            LaunchError::NoPlayer => write!(f, "No player token scanned"),
            LaunchError::InvalidLevel { game, level } => {
                write!(f, "Invalid game/level selection: G{game} L{level}")
            }
            LaunchError::Persist(err) => write!(f, "Could not save player token: {err:#}"),
            LaunchError::PersistRejected(message) => {
                write!(f, "Could not save player token: {message}")
            }
            LaunchError::Start(err) => write!(f, "Could not reach game launcher: {err:#}"),
            LaunchError::Rejected(message) => write!(f, "{message}"),
        }
    }
}

impl Error for LaunchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LaunchError::Persist(err) | LaunchError::Start(err) => Some(&**err),
            _ => None,
        }
    }
}

/// Persist the token, then request the game start. No automatic retry.
#[instrument(skip(api))]
pub async fn launch(api: &dyn ConsoleApi, request: &LaunchRequest) -> Result<(), LaunchError> {
    let ack = api
        .persist_token(request.token_id)
        .await
        .map_err(LaunchError::Persist)?;
    if !ack.success {
        return Err(LaunchError::PersistRejected(
            ack.error
                .unwrap_or_else(|| "token was not saved".to_string()),
        ));
    }
    debug!(token_id = request.token_id, "token persisted");

    let response = api
        .start_game(request.game, request.level)
        .await
        .map_err(LaunchError::Start)?;
    if !response.success {
        let message = response
            .error
            .filter(|msg| !msg.trim().is_empty())
            .unwrap_or_else(|| START_FAILED_FALLBACK.to_string());
        return Err(LaunchError::Rejected(message));
    }
    info!(game = %request.game, level = request.level, "game started");
    Ok(())
}

/// Poll the completion signal until the game reports done, then fetch and
/// render the leaderboard.
///
/// Any poll or fetch failure ends monitoring without retry and returns `None`.
pub async fn monitor_completion(
    api: &dyn ConsoleApi,
    sink: &dyn RenderSink,
    interval: Duration,
) -> Option<Vec<LeaderboardEntry>> {
    loop {
        tokio::time::sleep(interval).await;
        match api.game_done().await {
            Ok(true) => break,
            Ok(false) => debug!("game still running"),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "completion poll failed, monitoring stopped");
                return None;
            }
        }
    }

    info!("game finished, fetching leaderboard");
    match api.leaderboard().await {
        Ok(entries) => {
            sink.on_leaderboard(&entries);
            Some(entries)
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "leaderboard fetch failed");
            None
        }
    }
}
