//! Test-only doubles for the console backend and the render sink.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::phase::Phase;
use crate::core::steps::RawStep;
use crate::core::types::{GameId, LeaderboardEntry};
use crate::io::api::{Ack, CheckResponse, ConsoleApi, ScanResponse, StartGameResponse};
use crate::io::render::{RenderEvent, RenderSink};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Scan,
    Check(GameId),
    PersistToken(u64),
    StartGame(GameId, u8),
    GameDone,
    Leaderboard,
}

/// Scripted answer to one connectivity check.
#[derive(Debug, Clone)]
pub struct ScriptedCheck {
    pub latency: Duration,
    pub outcome: ScriptedOutcome,
}

#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Respond(CheckResponse),
    ConnectionRefused,
    Malformed(String),
}

impl ScriptedCheck {
    pub fn respond(response: CheckResponse) -> Self {
        Self {
            latency: Duration::ZERO,
            outcome: ScriptedOutcome::Respond(response),
        }
    }

    /// Response listing `steps` as `(name, ok, message)`; `success` is the
    /// conjunction of the listed steps.
    pub fn steps(steps: &[(&str, bool, Option<&str>)]) -> Self {
        let steps: Vec<RawStep> = steps
            .iter()
            .map(|(name, ok, message)| RawStep {
                name: name.to_string(),
                ok: *ok,
                message: message.map(str::to_string),
            })
            .collect();
        let success = steps.iter().all(|step| step.ok);
        Self::respond(CheckResponse { success, steps })
    }

    pub fn connection_refused() -> Self {
        Self {
            latency: Duration::ZERO,
            outcome: ScriptedOutcome::ConnectionRefused,
        }
    }

    pub fn malformed(detail: &str) -> Self {
        Self {
            latency: Duration::ZERO,
            outcome: ScriptedOutcome::Malformed(detail.to_string()),
        }
    }

    /// Simulated time the backend takes to answer.
    pub fn after(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// Backend double answering from queues and recording every call.
///
/// Empty queues fall back to: check fails, persist and start succeed, scan
/// reads nothing, the game reports done once `done_after` polls said no.
#[derive(Default)]
pub struct ScriptedApi {
    checks: Mutex<VecDeque<ScriptedCheck>>,
    starts: Mutex<VecDeque<Result<StartGameResponse, String>>>,
    scans: Mutex<VecDeque<Result<ScanResponse, String>>>,
    persist_failure: Option<String>,
    done_failure: bool,
    done_after: Mutex<u32>,
    leaderboard: Vec<LeaderboardEntry>,
    calls: Mutex<Vec<ApiCall>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check(self, check: ScriptedCheck) -> Self {
        self.checks.lock().push_back(check);
        self
    }

    pub fn with_start(self, start: Result<StartGameResponse, String>) -> Self {
        self.starts.lock().push_back(start);
        self
    }

    pub fn with_scan(self, scan: Result<ScanResponse, String>) -> Self {
        self.scans.lock().push_back(scan);
        self
    }

    pub fn with_persist_failure(mut self, message: &str) -> Self {
        self.persist_failure = Some(message.to_string());
        self
    }

    pub fn with_done_after(self, polls: u32) -> Self {
        *self.done_after.lock() = polls;
        self
    }

    pub fn with_done_failure(mut self) -> Self {
        self.done_failure = true;
        self
    }

    pub fn with_leaderboard(mut self, entries: Vec<LeaderboardEntry>) -> Self {
        self.leaderboard = entries;
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&ApiCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| pred(call)).count()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ConsoleApi for ScriptedApi {
    async fn scan_token(&self) -> Result<ScanResponse> {
        self.record(ApiCall::Scan);
        let next = self.scans.lock().pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(ScanResponse::default()),
        }
    }

    async fn connection_check(&self, game: GameId) -> Result<CheckResponse> {
        self.record(ApiCall::Check(game));
        let next = self.checks.lock().pop_front();
        let check = next.ok_or_else(|| anyhow!("no scripted check response"))?;
        if !check.latency.is_zero() {
            tokio::time::sleep(check.latency).await;
        }
        match check.outcome {
            ScriptedOutcome::Respond(response) => Ok(response),
            ScriptedOutcome::ConnectionRefused => Err(anyhow::Error::new(
                std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            )
            .context("POST /api/connection_check")),
            ScriptedOutcome::Malformed(detail) => Err(anyhow!("parse check body: {detail}")),
        }
    }

    async fn persist_token(&self, token_id: u64) -> Result<Ack> {
        self.record(ApiCall::PersistToken(token_id));
        match &self.persist_failure {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(Ack {
                success: true,
                error: None,
            }),
        }
    }

    async fn start_game(&self, game: GameId, level: u8) -> Result<StartGameResponse> {
        self.record(ApiCall::StartGame(game, level));
        let next = self.starts.lock().pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(StartGameResponse {
                success: true,
                error: None,
            }),
        }
    }

    async fn game_done(&self) -> Result<bool> {
        self.record(ApiCall::GameDone);
        if self.done_failure {
            return Err(anyhow!("connection reset"));
        }
        let mut remaining = self.done_after.lock();
        if *remaining == 0 {
            return Ok(true);
        }
        *remaining -= 1;
        Ok(false)
    }

    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        self.record(ApiCall::Leaderboard);
        Ok(self.leaderboard.clone())
    }
}

/// Sink that keeps every event in order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RenderEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().clone()
    }

    /// Events without phase changes, for asserting on what the player sees.
    pub fn visible(&self) -> Vec<RenderEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| !matches!(event, RenderEvent::PhaseChanged { .. }))
            .cloned()
            .collect()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                RenderEvent::PhaseChanged { phase } => Some(*phase),
                _ => None,
            })
            .collect()
    }
}

impl RenderSink for RecordingSink {
    fn emit(&self, event: RenderEvent) {
        self.events.lock().push(event);
    }
}
