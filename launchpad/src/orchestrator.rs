//! Orchestration of one play-through: background checks while the preview
//! plays, presentation once both are done, and a single launch per cycle.
//!
//! Every task spawned for a cycle is tracked. Selecting a game, retrying or
//! abandoning the screen aborts the previous cycle's tasks, timers included.
//! Tasks that were already past their last suspension point can only write
//! into their own [`CycleHandle`], which the store no longer considers
//! current.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::check;
use crate::core::phase::Phase;
use crate::core::types::{GameId, Player};
use crate::io::api::ConsoleApi;
use crate::io::config::{ConsoleConfig, Timings};
use crate::io::render::RenderSink;
use crate::launch::{self, LaunchRequest};
use crate::present::ResultPresenter;
use crate::scan;
use crate::session::{ModeToggle, Selection, SessionSnapshot, SessionState};
use crate::store::{CycleHandle, ResultStore};

/// Cheap to clone; clones share the same session.
///
/// Event methods spawn tasks and must be called inside a tokio runtime.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn ConsoleApi>,
    sink: Arc<dyn RenderSink>,
    presenter: ResultPresenter,
    timings: Timings,
    level_number: u8,
    store: ResultStore,
    mode: ModeToggle,
    session: Mutex<SessionState>,
    cycle_tasks: Mutex<Vec<JoinHandle<()>>>,
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(api: Arc<dyn ConsoleApi>, sink: Arc<dyn RenderSink>, config: &ConsoleConfig) -> Self {
        let mode = ModeToggle::new(config.controller_mode);
        let presenter = ResultPresenter::new(Arc::clone(&sink), mode.clone(), &config.timings);
        Self {
            inner: Arc::new(Inner {
                api,
                sink,
                presenter,
                timings: config.timings.clone(),
                level_number: config.level_number,
                store: ResultStore::new(),
                mode,
                session: Mutex::new(SessionState::default()),
                cycle_tasks: Mutex::new(Vec::new()),
                scan_task: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.inner.store
    }

    pub fn controller_mode(&self) -> &ModeToggle {
        &self.inner.mode
    }

    pub fn phase(&self) -> Phase {
        self.inner.session.lock().phase
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.inner.session.lock().clone();
        SessionSnapshot {
            selection: session.selection,
            player: session.player,
            phase: session.phase,
            flags: self.inner.store.flags(),
            result: self.inner.store.get().map(|result| (*result).clone()),
            controller_mode: self.inner.mode.get(),
            last_launch_error: session.last_launch_error,
        }
    }

    /// Begin a new scan cycle: forget the previous player and poll for a token.
    pub fn start_scan(&self) {
        self.stop_scan();
        self.inner.session.lock().player = None;
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let player = scan::wait_for_token(&*this.inner.api, this.inner.timings.scan_poll()).await;
            this.on_token_scanned(player);
        });
        *self.inner.scan_task.lock() = Some(handle);
    }

    pub fn stop_scan(&self) {
        if let Some(handle) = self.inner.scan_task.lock().take() {
            handle.abort();
        }
    }

    pub fn on_token_scanned(&self, player: Player) {
        info!(token_id = player.token_id, name = %player.name, "player identified");
        self.inner.session.lock().player = Some(player.clone());
        self.inner.sink.on_player_scanned(&player);
    }

    /// A game card was confirmed: reset the session and start checks in the
    /// background while the preview plays.
    pub fn on_game_selected(&self, game: GameId, title: impl Into<String>, desc: impl Into<String>) {
        info!(game = %game, "game selected");
        self.supersede();
        self.inner.store.reset();
        let previous = {
            let mut session = self.inner.session.lock();
            let previous = session.phase;
            session.reset_for_selection(Selection {
                game,
                title: title.into(),
                desc: desc.into(),
            });
            previous
        };
        if previous != Phase::Idle {
            self.inner.sink.on_phase_changed(Phase::Idle);
        }
        self.ensure_background_check(game);
    }

    /// The preview finished. Results are presented once ready, and a
    /// successful cycle launches after the grace delay.
    pub fn on_preview_timeline_ended(&self) {
        let phase = self.phase();
        if !phase.awaits_timeline() {
            debug!(phase = ?phase, "preview end ignored");
            return;
        }
        // Only a selection begins a cycle; the preview end just joins it.
        let Some(cycle) = self.inner.store.current() else {
            warn!("preview ended with no check cycle");
            return;
        };
        if !self.advance(&cycle, Phase::awaits_timeline, Phase::AwaitingResults) {
            debug!(phase = ?self.phase(), "preview end ignored");
            return;
        }

        let this = self.clone();
        let present_cycle = cycle.clone();
        self.track(tokio::spawn(async move {
            this.present_when_ready(present_cycle).await;
        }));

        let this = self.clone();
        self.track(tokio::spawn(async move {
            this.auto_start_when_ready(cycle).await;
        }));
    }

    /// Re-run the checks with live progress after a failure. Returns false
    /// when the session is not in a retryable state.
    pub fn on_retry_requested(&self) -> bool {
        let game = {
            let mut session = self.inner.session.lock();
            if !session.phase.accepts_retry() {
                debug!(phase = ?session.phase, "retry ignored");
                return false;
            }
            let Some(game) = session.selected_game() else {
                return false;
            };
            session.phase = Phase::RetryRequested;
            session.last_launch_error = None;
            game
        };
        info!(game = %game, "retry requested");
        self.inner.sink.on_phase_changed(Phase::RetryRequested);

        self.supersede();
        self.inner.store.reset();
        let cycle = self.inner.store.begin_cycle(game);
        self.inner.store.mark_started(&cycle);
        self.set_phase(Phase::ChecksRunningForeground);

        let this = self.clone();
        self.track(tokio::spawn(async move {
            this.run_retry(cycle).await;
        }));
        true
    }

    /// The owning screen was left: cancel every pending cycle task.
    pub fn on_screen_abandoned(&self) {
        info!("screen abandoned, cancelling cycle tasks");
        self.supersede();
        self.inner.store.reset();
        self.set_phase(Phase::Idle);
    }

    /// Wait for every task of the current cycle to finish.
    pub async fn join_cycle(&self) {
        loop {
            let handles = std::mem::take(&mut *self.inner.cycle_tasks.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(err) = handle.await
                    && !err.is_cancelled()
                {
                    warn!(error = %err, "cycle task panicked");
                }
            }
        }
    }

    fn ensure_background_check(&self, game: GameId) -> CycleHandle {
        if self.inner.store.flags().started
            && let Some(cycle) = self.inner.store.current()
        {
            debug!(cycle = cycle.id(), "checks already started for this cycle");
            return cycle;
        }

        let cycle = self.inner.store.begin_cycle(game);
        self.inner.store.mark_started(&cycle);
        self.set_phase(Phase::ChecksRunningBackground);
        info!(cycle = cycle.id(), game = %game, "background checks started");

        let this = self.clone();
        let task_cycle = cycle.clone();
        self.track(tokio::spawn(async move {
            check::run_deferred(&*this.inner.api, &task_cycle).await;
            this.advance(
                &task_cycle,
                |phase| phase == Phase::ChecksRunningBackground,
                Phase::AwaitingUserTimeline,
            );
        }));
        cycle
    }

    async fn present_when_ready(&self, cycle: CycleHandle) {
        let result = match cycle.wait_ready().await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "cycle never became ready");
                return;
            }
        };
        if !self.advance(
            &cycle,
            |phase| phase == Phase::AwaitingResults,
            Phase::PresentingResults,
        ) {
            return;
        }
        self.inner.presenter.replay(&result).await;
        let next = if result.success {
            Phase::LaunchPending
        } else {
            Phase::Failed
        };
        self.advance(&cycle, |phase| phase == Phase::PresentingResults, next);
    }

    async fn auto_start_when_ready(&self, cycle: CycleHandle) {
        let Ok(result) = cycle.wait_ready().await else {
            return;
        };
        if !result.success {
            // Error rendering belongs to the presentation path.
            return;
        }
        tokio::time::sleep(self.inner.timings.launch_grace()).await;
        self.fire_launch(&cycle).await;
    }

    async fn run_retry(&self, cycle: CycleHandle) {
        let result = check::run_immediate(&*self.inner.api, &cycle, &self.inner.presenter).await;
        if !result.success {
            self.set_phase_for(&cycle, Phase::Failed);
            return;
        }
        self.set_phase_for(&cycle, Phase::Succeeded);
        tokio::time::sleep(self.inner.timings.retry_prelaunch()).await;
        self.fire_launch(&cycle).await;
    }

    async fn fire_launch(&self, cycle: &CycleHandle) {
        if !self.inner.store.is_current(cycle) {
            return;
        }
        if !cycle.claim_launch() {
            debug!(cycle = cycle.id(), "launch already claimed");
            return;
        }
        let request = {
            let session = self.inner.session.lock();
            LaunchRequest::from_session(&session, self.inner.level_number)
        };
        self.set_phase_for(cycle, Phase::Launching);

        let outcome = match request {
            Ok(request) => launch::launch(&*self.inner.api, &request).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(()) => {
                self.set_phase_for(cycle, Phase::Launched);
                self.inner.sink.on_launch_succeeded();
                launch::monitor_completion(
                    &*self.inner.api,
                    &*self.inner.sink,
                    self.inner.timings.completion_poll(),
                )
                .await;
            }
            Err(err) => {
                let message = err.to_string();
                warn!(error = %message, "launch failed");
                self.inner.session.lock().last_launch_error = Some(message.clone());
                self.inner.sink.on_launch_failed(&message);
                self.set_phase_for(cycle, Phase::Failed);
            }
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.inner.cycle_tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    fn supersede(&self) {
        let handles = std::mem::take(&mut *self.inner.cycle_tasks.lock());
        if !handles.is_empty() {
            debug!(tasks = handles.len(), "aborting superseded cycle tasks");
        }
        for handle in handles {
            handle.abort();
        }
    }

    fn set_phase(&self, phase: Phase) {
        {
            let mut session = self.inner.session.lock();
            if session.phase == phase {
                return;
            }
            session.phase = phase;
        }
        debug!(phase = ?phase, "phase changed");
        self.inner.sink.on_phase_changed(phase);
    }

    fn set_phase_for(&self, cycle: &CycleHandle, phase: Phase) {
        if self.inner.store.is_current(cycle) {
            self.set_phase(phase);
        }
    }

    /// Move to `to` if `cycle` is current and the phase satisfies `from`.
    fn advance(&self, cycle: &CycleHandle, from: impl Fn(Phase) -> bool, to: Phase) -> bool {
        {
            let mut session = self.inner.session.lock();
            if !self.inner.store.is_current(cycle) || !from(session.phase) {
                return false;
            }
            session.phase = to;
        }
        debug!(phase = ?to, "phase changed");
        self.inner.sink.on_phase_changed(to);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::core::types::{ControllerMode, InitFlags};
    use crate::io::render::RenderEvent;
    use crate::test_support::{ApiCall, RecordingSink, ScriptedApi, ScriptedCheck};

    fn setup(api: ScriptedApi) -> (Orchestrator, Arc<ScriptedApi>, Arc<RecordingSink>) {
        let api = Arc::new(api);
        let sink = Arc::new(RecordingSink::default());
        let orchestrator =
            Orchestrator::new(api.clone(), sink.clone(), &ConsoleConfig::default());
        orchestrator.on_token_scanned(Player {
            token_id: 42,
            name: "Ada".to_string(),
        });
        (orchestrator, api, sink)
    }

    fn all_ok() -> ScriptedCheck {
        ScriptedCheck::steps(&[
            ("controller", true, None),
            ("nodes", true, None),
            ("drone", true, None),
        ])
    }

    fn starts(api: &ScriptedApi) -> usize {
        api.count(|call| matches!(call, ApiCall::StartGame(..)))
    }

    #[tokio::test(start_paused = true)]
    async fn selection_starts_checks_once() {
        let (orchestrator, api, _sink) = setup(ScriptedApi::new().with_check(all_ok()));

        orchestrator.on_game_selected(GameId::HOVER_AND_SEEK, "Hover and Seek", "");
        assert_eq!(orchestrator.phase(), Phase::ChecksRunningBackground);
        assert!(orchestrator.store().flags().started);

        orchestrator.join_cycle().await;
        assert_eq!(orchestrator.phase(), Phase::AwaitingUserTimeline);
        assert_eq!(
            orchestrator.store().flags(),
            InitFlags {
                started: true,
                ready: true,
                success: true
            }
        );
        assert_eq!(api.count(|call| matches!(call, ApiCall::Check(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn preview_end_before_results_waits_without_presenting() {
        let (orchestrator, _api, sink) = setup(
            ScriptedApi::new().with_check(all_ok().after(Duration::from_secs(8))),
        );

        orchestrator.on_game_selected(GameId::HOVER_AND_SEEK, "Hover and Seek", "");
        tokio::time::sleep(Duration::from_secs(1)).await;
        orchestrator.on_preview_timeline_ended();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(orchestrator.phase(), Phase::AwaitingResults);
        assert!(
            !sink
                .events()
                .iter()
                .any(|event| matches!(event, RenderEvent::StepRevealed { .. }))
        );

        orchestrator.join_cycle().await;
        assert_eq!(orchestrator.phase(), Phase::Launched);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_preview_end_launches_once() {
        let (orchestrator, api, _sink) = setup(ScriptedApi::new().with_check(all_ok()));

        orchestrator.on_game_selected(GameId::COLOUR_CHAOS, "Colour Chaos", "");
        orchestrator.on_preview_timeline_ended();
        orchestrator.on_preview_timeline_ended();
        orchestrator.join_cycle().await;

        assert_eq!(starts(&api), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn new_selection_supersedes_in_flight_cycle() {
        let (orchestrator, api, _sink) = setup(
            ScriptedApi::new()
                .with_check(all_ok().after(Duration::from_secs(5)))
                .with_check(ScriptedCheck::steps(&[("nodes", false, Some("offline"))])),
        );

        orchestrator.on_game_selected(GameId::HOVER_AND_SEEK, "Hover and Seek", "");
        tokio::time::sleep(Duration::from_secs(1)).await;
        orchestrator.on_game_selected(GameId::COLOUR_CHAOS, "Colour Chaos", "");
        orchestrator.join_cycle().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let stored = orchestrator.store().get().expect("stored result");
        assert_eq!(stored.game, GameId::COLOUR_CHAOS);
        assert!(!orchestrator.store().flags().success);
        assert_eq!(starts(&api), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_resets_flags_and_runs_live_checks() {
        let (orchestrator, api, sink) = setup(
            ScriptedApi::new()
                .with_check(ScriptedCheck::connection_refused())
                .with_check(all_ok()),
        );

        orchestrator.on_game_selected(GameId::HOVER_AND_SEEK, "Hover and Seek", "");
        orchestrator.on_preview_timeline_ended();
        orchestrator.join_cycle().await;
        assert_eq!(orchestrator.phase(), Phase::Failed);
        assert!(orchestrator.store().flags().ready);

        assert!(orchestrator.on_retry_requested());
        assert_eq!(
            orchestrator.store().flags(),
            InitFlags {
                started: true,
                ready: false,
                success: false
            }
        );
        assert_eq!(orchestrator.phase(), Phase::ChecksRunningForeground);
        assert!(!orchestrator.on_retry_requested(), "retry while running");
        orchestrator.on_preview_timeline_ended();
        assert_eq!(orchestrator.phase(), Phase::ChecksRunningForeground);

        orchestrator.join_cycle().await;
        assert_eq!(orchestrator.phase(), Phase::Launched);
        assert_eq!(api.count(|call| matches!(call, ApiCall::Check(_))), 2);
        assert_eq!(starts(&api), 1);
        let phases = sink.phases();
        let retry_at = phases
            .iter()
            .position(|phase| *phase == Phase::RetryRequested)
            .expect("retry phase");
        assert_eq!(
            &phases[retry_at..],
            &[
                Phase::RetryRequested,
                Phase::ChecksRunningForeground,
                Phase::Succeeded,
                Phase::Launching,
                Phase::Launched
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retry_rejected_unless_failed() {
        let (orchestrator, _api, _sink) = setup(ScriptedApi::new().with_check(all_ok()));
        assert!(!orchestrator.on_retry_requested());
        orchestrator.on_game_selected(GameId::HOVER_AND_SEEK, "Hover and Seek", "");
        assert!(!orchestrator.on_retry_requested());
        orchestrator.join_cycle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn launch_failure_is_reported_and_retryable() {
        let (orchestrator, api, sink) = setup(
            ScriptedApi::new()
                .with_check(all_ok())
                .with_start(Ok(crate::io::api::StartGameResponse {
                    success: false,
                    error: None,
                })),
        );

        orchestrator.on_game_selected(GameId::HOVER_AND_SEEK, "Hover and Seek", "");
        orchestrator.on_preview_timeline_ended();
        orchestrator.join_cycle().await;

        assert_eq!(orchestrator.phase(), Phase::Failed);
        assert!(sink.events().contains(&RenderEvent::LaunchFailed {
            message: "Failed to start game".to_string()
        }));
        assert_eq!(
            orchestrator.snapshot().last_launch_error.as_deref(),
            Some("Failed to start game")
        );
        assert_eq!(starts(&api), 1);
        assert_eq!(api.count(|call| matches!(call, ApiCall::GameDone)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abandon_cancels_pending_presentation() {
        let (orchestrator, api, sink) = setup(
            ScriptedApi::new().with_check(all_ok().after(Duration::from_secs(5))),
        );

        orchestrator.on_game_selected(GameId::HOVER_AND_SEEK, "Hover and Seek", "");
        orchestrator.on_preview_timeline_ended();
        orchestrator.on_screen_abandoned();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(orchestrator.phase(), Phase::Idle);
        assert!(sink.visible().iter().all(|event| matches!(event, RenderEvent::PlayerScanned { .. })));
        assert_eq!(starts(&api), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn preview_end_after_abandon_starts_nothing() {
        let (orchestrator, api, _sink) = setup(
            ScriptedApi::new()
                .with_check(all_ok().after(Duration::from_secs(5)))
                .with_check(all_ok()),
        );

        orchestrator.on_game_selected(GameId::HOVER_AND_SEEK, "Hover and Seek", "");
        tokio::time::sleep(Duration::from_secs(1)).await;
        orchestrator.on_screen_abandoned();
        orchestrator.on_preview_timeline_ended();
        orchestrator.join_cycle().await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(orchestrator.phase(), Phase::Idle);
        assert_eq!(orchestrator.store().flags(), InitFlags::default());
        assert_eq!(api.count(|call| matches!(call, ApiCall::Check(_))), 1);
        assert_eq!(starts(&api), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn preview_end_after_failed_cycle_is_ignored() {
        let (orchestrator, api, _sink) = setup(
            ScriptedApi::new()
                .with_check(ScriptedCheck::connection_refused())
                .with_check(all_ok()),
        );

        orchestrator.on_game_selected(GameId::HOVER_AND_SEEK, "Hover and Seek", "");
        orchestrator.on_preview_timeline_ended();
        orchestrator.join_cycle().await;
        assert_eq!(orchestrator.phase(), Phase::Failed);

        orchestrator.on_preview_timeline_ended();
        orchestrator.join_cycle().await;

        assert_eq!(orchestrator.phase(), Phase::Failed);
        assert_eq!(api.count(|call| matches!(call, ApiCall::Check(_))), 1);
        assert_eq!(starts(&api), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn controller_label_uses_mode_at_render_time() {
        let (orchestrator, _api, sink) = setup(ScriptedApi::new().with_check(all_ok()));

        orchestrator.on_game_selected(GameId::HOVER_AND_SEEK, "Hover and Seek", "");
        orchestrator.join_cycle().await;
        orchestrator.controller_mode().set(ControllerMode::Gesture);
        orchestrator.on_preview_timeline_ended();
        orchestrator.join_cycle().await;

        assert!(sink.events().contains(&RenderEvent::StepRevealed {
            label: "Gesture".to_string()
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn scan_sets_player_for_launch() {
        let api = Arc::new(ScriptedApi::new().with_scan(Ok(crate::io::api::ScanResponse {
            success: true,
            name: Some("Lin".to_string()),
            token_id: Some(7),
            error: None,
        })));
        let sink = Arc::new(RecordingSink::default());
        let orchestrator = Orchestrator::new(api.clone(), sink.clone(), &ConsoleConfig::default());

        orchestrator.start_scan();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let player = orchestrator.snapshot().player.expect("player");
        assert_eq!(player.token_id, 7);
        assert_eq!(api.calls(), vec![ApiCall::Scan]);
        orchestrator.stop_scan();
    }
}
