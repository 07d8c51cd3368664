//! Shared deterministic types for the launch console.
//!
//! These types define stable contracts between the check, presentation and
//! launch components. They carry no I/O and serialize to the same JSON the
//! console backend and the kiosk front-end exchange.

use std::fmt;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Identifier of a game in the fixed catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct GameId(u8);

impl GameId {
    pub const HOVER_AND_SEEK: GameId = GameId(1);
    /// The only game that drives a physical vehicle.
    pub const HUES_THE_BOSS: GameId = GameId(2);
    pub const COLOUR_CHAOS: GameId = GameId(3);

    /// Validate a raw game number against the catalog.
    pub fn new(number: u8) -> Result<Self> {
        CATALOG
            .iter()
            .find(|game| game.id.0 == number)
            .map(|game| game.id)
            .ok_or_else(|| anyhow!("unknown game number {number}"))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn info(self) -> &'static GameInfo {
        // Every constructed GameId is validated, so the lookup cannot miss.
        CATALOG
            .iter()
            .find(|game| game.id == self)
            .unwrap_or(&CATALOG[0])
    }

    pub fn uses_vehicle(self) -> bool {
        self == Self::HUES_THE_BOSS
    }
}

impl TryFrom<u8> for GameId {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        GameId::new(value)
    }
}

impl From<GameId> for u8 {
    fn from(value: GameId) -> Self {
        value.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static description of a catalog game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameInfo {
    pub id: GameId,
    pub title: &'static str,
    pub levels: &'static [u8],
}

impl GameInfo {
    pub fn has_level(&self, level: u8) -> bool {
        self.levels.contains(&level)
    }
}

pub const CATALOG: [GameInfo; 3] = [
    GameInfo {
        id: GameId::HOVER_AND_SEEK,
        title: "Hover and Seek",
        levels: &[1, 2],
    },
    GameInfo {
        id: GameId::HUES_THE_BOSS,
        title: "Hues the Boss",
        levels: &[1],
    },
    GameInfo {
        id: GameId::COLOUR_CHAOS,
        title: "Colour Chaos",
        levels: &[1, 2],
    },
];

/// Semantic identity of one hardware/subsystem check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Controller,
    Nodes,
    Vehicle,
    Drone,
}

impl StepKind {
    /// Full step catalog in display order.
    pub const CATALOG: [StepKind; 4] = [
        StepKind::Controller,
        StepKind::Nodes,
        StepKind::Vehicle,
        StepKind::Drone,
    ];

    /// Map a step name reported by the check endpoint, accepting legacy aliases.
    pub fn from_wire(name: &str) -> Option<StepKind> {
        match name.trim().to_ascii_lowercase().as_str() {
            "controller" | "joystick/gesture" | "joystick" | "gesture" => Some(StepKind::Controller),
            "nodes" => Some(StepKind::Nodes),
            "vehicle" | "car" => Some(StepKind::Vehicle),
            "drone" => Some(StepKind::Drone),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Controller => "controller",
            StepKind::Nodes => "nodes",
            StepKind::Vehicle => "vehicle",
            StepKind::Drone => "drone",
        }
    }
}

/// Controller wording selected on the kiosk. Read at render time only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerMode {
    #[default]
    Joystick,
    Gesture,
}

/// One check outcome. Display text is not stored; see [`crate::core::labels`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStep {
    pub kind: StepKind,
    pub ok: bool,
    pub message: Option<String>,
}

/// Why a check cycle could not produce step results at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request could not complete.
    Network,
    /// Anything else that went wrong while running the check.
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of one full check run. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckCycleResult {
    pub game: GameId,
    pub steps: Vec<CheckStep>,
    pub success: bool,
    pub failure: Option<RunFailure>,
}

impl CheckCycleResult {
    /// Result for a cycle whose check request never produced steps.
    pub fn failed_to_run(game: GameId, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            game,
            steps: Vec::new(),
            success: false,
            failure: Some(RunFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &CheckStep> {
        self.steps.iter().filter(|step| !step.ok)
    }
}

/// Readiness flags of the current check cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InitFlags {
    pub started: bool,
    pub ready: bool,
    pub success: bool,
}

/// Player identified by a scanned token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub token_id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: i64,
}
