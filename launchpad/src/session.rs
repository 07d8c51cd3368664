//! Session state for the active play-through.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::core::phase::Phase;
use crate::core::types::{CheckCycleResult, ControllerMode, GameId, InitFlags, Player};

/// The game card the player chose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub game: GameId,
    pub title: String,
    pub desc: String,
}

/// Mutable state of the single active session.
///
/// Readiness flags and the stored result live in the
/// [`ResultStore`](crate::store::ResultStore).
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub selection: Option<Selection>,
    /// Set once per scanned token; cleared when a new scan cycle begins.
    pub player: Option<Player>,
    pub phase: Phase,
    pub last_launch_error: Option<String>,
}

impl SessionState {
    /// Zero everything tied to a game cycle. The scanned player is kept.
    pub fn reset_for_selection(&mut self, selection: Selection) {
        *self = SessionState {
            selection: Some(selection),
            player: self.player.take(),
            ..SessionState::default()
        };
    }

    pub fn selected_game(&self) -> Option<GameId> {
        self.selection.as_ref().map(|selection| selection.game)
    }
}

/// Controller-mode toggle shared with the UI. Read at render time.
#[derive(Debug, Clone, Default)]
pub struct ModeToggle(Arc<RwLock<ControllerMode>>);

impl ModeToggle {
    pub fn new(mode: ControllerMode) -> Self {
        Self(Arc::new(RwLock::new(mode)))
    }

    pub fn get(&self) -> ControllerMode {
        *self.0.read()
    }

    pub fn set(&self, mode: ControllerMode) {
        *self.0.write() = mode;
    }
}

/// Read view of the session for front-ends.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub selection: Option<Selection>,
    pub player: Option<Player>,
    pub phase: Phase,
    pub flags: InitFlags,
    pub result: Option<CheckCycleResult>,
    pub controller_mode: ControllerMode,
    pub last_launch_error: Option<String>,
}
