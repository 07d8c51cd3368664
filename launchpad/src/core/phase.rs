//! Orchestrator phases for one play-through.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    /// Checks populate the store while the preview plays.
    ChecksRunningBackground,
    /// Results are stored; the preview is still playing.
    AwaitingUserTimeline,
    /// Preview ended before the results arrived.
    AwaitingResults,
    PresentingResults,
    LaunchPending,
    Launching,
    Launched,
    Failed,
    RetryRequested,
    /// Retry path: checks run with live step-by-step progress.
    ChecksRunningForeground,
    Succeeded,
}

impl Phase {
    /// Only a failed cycle can be retried by the user.
    pub fn accepts_retry(self) -> bool {
        self == Phase::Failed
    }

    /// States the preview-end event moves forward from.
    pub fn awaits_timeline(self) -> bool {
        matches!(
            self,
            Phase::ChecksRunningBackground | Phase::AwaitingUserTimeline
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Launched | Phase::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&Phase::ChecksRunningForeground).expect("serialize");
        assert_eq!(json, "\"checks_running_foreground\"");
    }

    #[test]
    fn retry_only_from_failed() {
        assert!(Phase::Failed.accepts_retry());
        assert!(!Phase::Launched.accepts_retry());
        assert!(!Phase::ChecksRunningForeground.accepts_retry());
    }
}
