//! Display text for check steps.
//!
//! Labels are a pure function of the step identity and the controller mode
//! current at render time. They are never stored with a result.

use crate::core::types::{ControllerMode, StepKind};

pub fn display_label(kind: StepKind, mode: ControllerMode) -> &'static str {
    match (kind, mode) {
        (StepKind::Controller, ControllerMode::Joystick) => "Joystick",
        (StepKind::Controller, ControllerMode::Gesture) => "Gesture",
        (StepKind::Nodes, _) => "Nodes",
        (StepKind::Vehicle, _) => "Car",
        (StepKind::Drone, _) => "Drone",
    }
}
