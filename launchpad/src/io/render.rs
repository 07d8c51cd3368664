//! Render callbacks the console core drives on the surrounding UI.
//!
//! Every callback is expressed as a [`RenderEvent`]; sinks implement
//! [`RenderSink::emit`] and get the named callbacks for free.

use serde::Serialize;
use tracing::{info, warn};

use crate::core::phase::Phase;
use crate::core::types::{LeaderboardEntry, Player};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderEvent {
    StepRevealed {
        label: String,
    },
    StepMarked {
        label: String,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    AllStepsPresented {
        success: bool,
    },
    /// The check itself could not run.
    CheckFailed {
        message: String,
    },
    LaunchFailed {
        message: String,
    },
    LaunchSucceeded,
    Leaderboard {
        entries: Vec<LeaderboardEntry>,
    },
    PhaseChanged {
        phase: Phase,
    },
    PlayerScanned {
        player: Player,
    },
}

pub trait RenderSink: Send + Sync {
    fn emit(&self, event: RenderEvent);

    fn on_step_revealed(&self, label: &str) {
        self.emit(RenderEvent::StepRevealed {
            label: label.to_string(),
        });
    }

    fn on_step_marked(&self, label: &str, ok: bool, message: Option<&str>) {
        self.emit(RenderEvent::StepMarked {
            label: label.to_string(),
            ok,
            message: message.map(str::to_string),
        });
    }

    fn on_all_steps_presented(&self, success: bool) {
        self.emit(RenderEvent::AllStepsPresented { success });
    }

    fn on_check_failed(&self, message: &str) {
        self.emit(RenderEvent::CheckFailed {
            message: message.to_string(),
        });
    }

    fn on_launch_failed(&self, message: &str) {
        self.emit(RenderEvent::LaunchFailed {
            message: message.to_string(),
        });
    }

    fn on_launch_succeeded(&self) {
        self.emit(RenderEvent::LaunchSucceeded);
    }

    fn on_leaderboard(&self, entries: &[LeaderboardEntry]) {
        self.emit(RenderEvent::Leaderboard {
            entries: entries.to_vec(),
        });
    }

    fn on_phase_changed(&self, phase: Phase) {
        self.emit(RenderEvent::PhaseChanged { phase });
    }

    fn on_player_scanned(&self, player: &Player) {
        self.emit(RenderEvent::PlayerScanned {
            player: player.clone(),
        });
    }
}

/// Sink that only logs. Used when no front-end is attached.
pub struct TracingSink;

impl RenderSink for TracingSink {
    fn emit(&self, event: RenderEvent) {
        match event {
            RenderEvent::StepRevealed { label } => info!(label = %label, "checking"),
            RenderEvent::StepMarked { label, ok, message } => {
                info!(label = %label, ok, message = ?message, "step checked");
            }
            RenderEvent::AllStepsPresented { success } => info!(success, "all steps presented"),
            RenderEvent::CheckFailed { message } => warn!(message = %message, "check failed"),
            RenderEvent::LaunchFailed { message } => warn!(message = %message, "launch failed"),
            RenderEvent::LaunchSucceeded => info!("game launched"),
            RenderEvent::Leaderboard { entries } => info!(entries = entries.len(), "leaderboard"),
            RenderEvent::PhaseChanged { phase } => info!(phase = ?phase, "phase changed"),
            RenderEvent::PlayerScanned { player } => {
                info!(token_id = player.token_id, name = %player.name, "player scanned");
            }
        }
    }
}
