//! Console backend abstraction.
//!
//! The [`ConsoleApi`] trait decouples orchestration from the HTTP backend.
//! Tests use a scripted implementation that returns queued responses without
//! opening sockets.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::steps::RawStep;
use crate::core::types::{FailureKind, GameId, LeaderboardEntry, Player};

/// Response of the token scan poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub token_id: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ScanResponse {
    /// A scan only identifies a player when it succeeded with both fields.
    pub fn into_player(self) -> Option<Player> {
        if !self.success {
            return None;
        }
        match (self.token_id, self.name) {
            (Some(token_id), Some(name)) => Some(Player { token_id, name }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckRequest {
    pub game_number: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub steps: Vec<RawStep>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersistTokenRequest {
    pub token_id: u64,
}

/// Generic `{success, error}` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct StartGameRequest {
    pub game_number: u8,
    pub level_number: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartGameResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoneResponse {
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    #[serde(default)]
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Network endpoints consumed by the console.
#[async_trait]
pub trait ConsoleApi: Send + Sync {
    async fn scan_token(&self) -> Result<ScanResponse>;

    async fn connection_check(&self, game: GameId) -> Result<CheckResponse>;

    /// Persist the active token id for the game scripts to read.
    async fn persist_token(&self, token_id: u64) -> Result<Ack>;

    async fn start_game(&self, game: GameId, level: u8) -> Result<StartGameResponse>;

    /// Whether the running game reported completion.
    async fn game_done(&self) -> Result<bool>;

    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>>;
}

/// Classify a failed check request: transport or socket errors anywhere in the
/// chain are network failures, everything else is unexpected.
pub fn classify_failure(err: &anyhow::Error) -> FailureKind {
    if err.chain().any(|cause| {
        cause.downcast_ref::<reqwest::Error>().is_some()
            || cause.downcast_ref::<std::io::Error>().is_some()
    }) {
        FailureKind::Network
    } else {
        FailureKind::Unexpected
    }
}
