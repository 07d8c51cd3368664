//! Step filtering and normalization for a connectivity-check response.

use serde::{Deserialize, Serialize};

use crate::core::types::{CheckCycleResult, CheckStep, GameId, StepKind};

/// A step exactly as the check endpoint reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStep {
    pub name: String,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Steps shown for `game`, in display order.
///
/// The vehicle step only applies to the vehicle game.
pub fn active_order(game: GameId) -> Vec<StepKind> {
    StepKind::CATALOG
        .into_iter()
        .filter(|kind| *kind != StepKind::Vehicle || game.uses_vehicle())
        .collect()
}

/// Build the stored cycle result from a raw response.
///
/// Steps missing from the response are skipped, unknown names are ignored and
/// the first occurrence of a name wins. `success` is true iff every kept step
/// is ok; an empty list falls back to the response's own `success`.
pub fn normalize(game: GameId, raw_success: bool, raw_steps: &[RawStep]) -> CheckCycleResult {
    let steps: Vec<CheckStep> = active_order(game)
        .into_iter()
        .filter_map(|kind| {
            raw_steps
                .iter()
                .find(|raw| StepKind::from_wire(&raw.name) == Some(kind))
                .map(|raw| CheckStep {
                    kind,
                    ok: raw.ok,
                    message: raw
                        .message
                        .as_deref()
                        .map(str::trim)
                        .filter(|msg| !msg.is_empty())
                        .map(str::to_string),
                })
        })
        .collect();

    let success = if steps.is_empty() {
        raw_success
    } else {
        steps.iter().all(|step| step.ok)
    };

    CheckCycleResult {
        game,
        steps,
        success,
        failure: None,
    }
}
