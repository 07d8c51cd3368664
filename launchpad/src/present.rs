//! Replay of a stored check result with fixed pacing.
//!
//! Pacing never depends on how long the real check took: every step is
//! revealed, held for the reveal delay, marked, then held for the mark delay.
//! Labels are resolved from the controller mode at the moment each action
//! runs.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::core::labels::display_label;
use crate::core::types::{CheckCycleResult, CheckStep};
use crate::io::config::Timings;
use crate::io::render::RenderSink;
use crate::session::ModeToggle;

/// One action of a replay timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayAction<'a> {
    Reveal(&'a CheckStep),
    Wait(Duration),
    Mark(&'a CheckStep),
    /// Emitted once after the last step.
    Finish,
}

/// Lazily yields the replay actions for one result. Consumed as it runs.
pub fn timeline(
    result: &CheckCycleResult,
    reveal_delay: Duration,
    mark_delay: Duration,
) -> impl Iterator<Item = ReplayAction<'_>> {
    result
        .steps
        .iter()
        .flat_map(move |step| {
            [
                ReplayAction::Reveal(step),
                ReplayAction::Wait(reveal_delay),
                ReplayAction::Mark(step),
                ReplayAction::Wait(mark_delay),
            ]
        })
        .chain(std::iter::once(ReplayAction::Finish))
}

#[derive(Clone)]
pub struct ResultPresenter {
    sink: Arc<dyn RenderSink>,
    mode: ModeToggle,
    reveal_delay: Duration,
    mark_delay: Duration,
}

impl ResultPresenter {
    pub fn new(sink: Arc<dyn RenderSink>, mode: ModeToggle, timings: &Timings) -> Self {
        Self {
            sink,
            mode,
            reveal_delay: timings.reveal_delay(),
            mark_delay: timings.mark_delay(),
        }
    }

    /// Render `result` step by step. Issues no network calls.
    pub async fn replay(&self, result: &CheckCycleResult) {
        debug!(steps = result.steps.len(), "replaying check result");
        for action in timeline(result, self.reveal_delay, self.mark_delay) {
            match action {
                ReplayAction::Reveal(step) => {
                    self.sink
                        .on_step_revealed(display_label(step.kind, self.mode.get()));
                }
                ReplayAction::Wait(delay) => tokio::time::sleep(delay).await,
                ReplayAction::Mark(step) => {
                    self.sink.on_step_marked(
                        display_label(step.kind, self.mode.get()),
                        step.ok,
                        step.message.as_deref(),
                    );
                }
                ReplayAction::Finish => {
                    if let Some(failure) = &result.failure {
                        self.sink.on_check_failed(&failure.message);
                    }
                    self.sink.on_all_steps_presented(result.success);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ControllerMode, FailureKind, GameId, StepKind};
    use crate::io::render::RenderEvent;
    use crate::test_support::RecordingSink;
    use tokio::time::Instant;

    fn two_step_result() -> CheckCycleResult {
        CheckCycleResult {
            game: GameId::HOVER_AND_SEEK,
            steps: vec![
                CheckStep {
                    kind: StepKind::Controller,
                    ok: true,
                    message: None,
                },
                CheckStep {
                    kind: StepKind::Drone,
                    ok: false,
                    message: Some("no position lock".to_string()),
                },
            ],
            success: false,
            failure: None,
        }
    }

    #[test]
    fn timeline_interleaves_reveal_wait_mark_wait() {
        let result = two_step_result();
        let reveal = Duration::from_millis(200);
        let mark = Duration::from_millis(150);
        let actions: Vec<ReplayAction<'_>> = timeline(&result, reveal, mark).collect();

        assert_eq!(actions.len(), 9);
        assert_eq!(actions[0], ReplayAction::Reveal(&result.steps[0]));
        assert_eq!(actions[1], ReplayAction::Wait(reveal));
        assert_eq!(actions[2], ReplayAction::Mark(&result.steps[0]));
        assert_eq!(actions[3], ReplayAction::Wait(mark));
        assert_eq!(actions[8], ReplayAction::Finish);
    }

    #[tokio::test(start_paused = true)]
    async fn replay_paces_each_step_and_reports_outcome() {
        let sink = Arc::new(RecordingSink::default());
        let presenter = ResultPresenter::new(
            sink.clone(),
            ModeToggle::new(ControllerMode::Gesture),
            &Timings::default(),
        );

        let start = Instant::now();
        presenter.replay(&two_step_result()).await;
        assert_eq!(start.elapsed(), Duration::from_millis(800));

        assert_eq!(
            sink.events(),
            vec![
                RenderEvent::StepRevealed {
                    label: "Gesture".to_string()
                },
                RenderEvent::StepMarked {
                    label: "Gesture".to_string(),
                    ok: true,
                    message: None
                },
                RenderEvent::StepRevealed {
                    label: "Drone".to_string()
                },
                RenderEvent::StepMarked {
                    label: "Drone".to_string(),
                    ok: false,
                    message: Some("no position lock".to_string())
                },
                RenderEvent::AllStepsPresented { success: false },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_failure_surfaces_error_before_summary() {
        let sink = Arc::new(RecordingSink::default());
        let presenter =
            ResultPresenter::new(sink.clone(), ModeToggle::default(), &Timings::default());
        let result = CheckCycleResult::failed_to_run(
            GameId::COLOUR_CHAOS,
            FailureKind::Network,
            "connection refused",
        );

        presenter.replay(&result).await;

        assert_eq!(
            sink.events(),
            vec![
                RenderEvent::CheckFailed {
                    message: "connection refused".to_string()
                },
                RenderEvent::AllStepsPresented { success: false },
            ]
        );
    }
}
