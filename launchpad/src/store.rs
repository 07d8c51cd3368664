//! Single-slot store for the latest check cycle.
//!
//! Each cycle is a fresh [`CycleHandle`] with its own write-once result slot.
//! Starting a new cycle replaces the slot in the store, so a handle from a
//! superseded cycle can still complete but never reaches the current flags or
//! result. Any number of tasks may await the same handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::core::types::{CheckCycleResult, GameId, InitFlags};

#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    slot: Arc<Mutex<Slot>>,
}

#[derive(Debug, Default)]
struct Slot {
    cycle: Option<Arc<Cycle>>,
    flags: InitFlags,
    next_id: u64,
}

#[derive(Debug)]
struct Cycle {
    id: u64,
    game: GameId,
    result: watch::Sender<Option<Arc<CheckCycleResult>>>,
    launch_claimed: AtomicBool,
}

/// Writer and waiter handle for one check cycle.
#[derive(Debug, Clone)]
pub struct CycleHandle {
    cycle: Arc<Cycle>,
    store: ResultStore,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the current cycle and zero the flags.
    pub fn reset(&self) {
        let mut slot = self.slot.lock();
        slot.cycle = None;
        slot.flags = InitFlags::default();
    }

    /// Replace the current cycle with a new one for `game`. Flags are zeroed.
    pub fn begin_cycle(&self, game: GameId) -> CycleHandle {
        let mut slot = self.slot.lock();
        slot.next_id += 1;
        let (result, _) = watch::channel(None);
        let cycle = Arc::new(Cycle {
            id: slot.next_id,
            game,
            result,
            launch_claimed: AtomicBool::new(false),
        });
        slot.cycle = Some(Arc::clone(&cycle));
        slot.flags = InitFlags::default();
        debug!(cycle = cycle.id, game = %game, "cycle begun");
        CycleHandle {
            cycle,
            store: self.clone(),
        }
    }

    /// Set `started` if `cycle` is still current.
    pub fn mark_started(&self, cycle: &CycleHandle) -> bool {
        let mut slot = self.slot.lock();
        if !slot.is_current(cycle.id()) {
            return false;
        }
        slot.flags.started = true;
        true
    }

    pub fn flags(&self) -> InitFlags {
        self.slot.lock().flags
    }

    /// Latest stored result of the current cycle, if it completed.
    pub fn get(&self) -> Option<Arc<CheckCycleResult>> {
        let cycle = self.slot.lock().cycle.clone()?;
        cycle.result.borrow().clone()
    }

    pub fn current(&self) -> Option<CycleHandle> {
        let cycle = self.slot.lock().cycle.clone()?;
        Some(CycleHandle {
            cycle,
            store: self.clone(),
        })
    }

    pub fn is_current(&self, cycle: &CycleHandle) -> bool {
        self.slot.lock().is_current(cycle.id())
    }
}

impl Slot {
    fn is_current(&self, id: u64) -> bool {
        self.cycle.as_ref().is_some_and(|cycle| cycle.id == id)
    }
}

impl CycleHandle {
    pub fn id(&self) -> u64 {
        self.cycle.id
    }

    pub fn game(&self) -> GameId {
        self.cycle.game
    }

    /// Store the cycle's result. Only the first completion is kept.
    ///
    /// The store's `ready`/`success` flags move only while this cycle is
    /// current; a superseded cycle completes into its own slot alone.
    pub fn complete(&self, result: CheckCycleResult) -> Arc<CheckCycleResult> {
        let result = Arc::new(result);
        let stored = self.cycle.result.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(Arc::clone(&result));
            true
        });
        if !stored {
            debug!(cycle = self.id(), "cycle already complete, ignoring");
            return self.result().unwrap_or(result);
        }

        let mut slot = self.store.slot.lock();
        if slot.is_current(self.id()) {
            slot.flags.ready = true;
            slot.flags.success = result.success;
            info!(cycle = self.id(), success = result.success, "check cycle ready");
        } else {
            debug!(cycle = self.id(), "superseded cycle completed");
        }
        result
    }

    /// Result of this cycle if it completed.
    pub fn result(&self) -> Option<Arc<CheckCycleResult>> {
        self.cycle.result.borrow().clone()
    }

    /// Wait until this cycle has a result.
    pub async fn wait_ready(&self) -> Result<Arc<CheckCycleResult>> {
        let mut rx = self.cycle.result.subscribe();
        let ready = rx
            .wait_for(Option::is_some)
            .await
            .context("cycle result channel closed")?;
        ready.clone().context("cycle result missing after ready")
    }

    /// Claim the one launch this cycle allows. True for the first caller only.
    pub fn claim_launch(&self) -> bool {
        !self.cycle.launch_claimed.swap(true, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CheckStep, StepKind};

    fn result(game: GameId, success: bool) -> CheckCycleResult {
        CheckCycleResult {
            game,
            steps: vec![CheckStep {
                kind: StepKind::Nodes,
                ok: success,
                message: None,
            }],
            success,
            failure: None,
        }
    }

    #[test]
    fn complete_sets_ready_and_success() {
        let store = ResultStore::new();
        let cycle = store.begin_cycle(GameId::HOVER_AND_SEEK);
        assert!(store.mark_started(&cycle));
        assert_eq!(
            store.flags(),
            InitFlags {
                started: true,
                ready: false,
                success: false
            }
        );

        cycle.complete(result(GameId::HOVER_AND_SEEK, true));
        assert_eq!(
            store.flags(),
            InitFlags {
                started: true,
                ready: true,
                success: true
            }
        );
        assert_eq!(store.get().expect("stored").game, GameId::HOVER_AND_SEEK);
    }

    #[test]
    fn superseded_cycle_cannot_write_into_current() {
        let store = ResultStore::new();
        let stale = store.begin_cycle(GameId::HOVER_AND_SEEK);
        let current = store.begin_cycle(GameId::COLOUR_CHAOS);

        stale.complete(result(GameId::HOVER_AND_SEEK, true));
        assert_eq!(store.flags(), InitFlags::default());
        assert!(store.get().is_none());
        assert!(!store.mark_started(&stale));

        current.complete(result(GameId::COLOUR_CHAOS, false));
        let flags = store.flags();
        assert!(flags.ready);
        assert!(!flags.success);
        assert_eq!(store.get().expect("stored").game, GameId::COLOUR_CHAOS);
    }

    #[test]
    fn first_completion_wins() {
        let store = ResultStore::new();
        let cycle = store.begin_cycle(GameId::HOVER_AND_SEEK);
        cycle.complete(result(GameId::HOVER_AND_SEEK, false));
        let kept = cycle.complete(result(GameId::HOVER_AND_SEEK, true));
        assert!(!kept.success);
        assert!(!store.flags().success);
    }

    #[test]
    fn launch_claim_is_one_shot_per_cycle() {
        let store = ResultStore::new();
        let cycle = store.begin_cycle(GameId::HUES_THE_BOSS);
        let other_path = cycle.clone();
        assert!(cycle.claim_launch());
        assert!(!other_path.claim_launch());

        let next = store.begin_cycle(GameId::HUES_THE_BOSS);
        assert!(next.claim_launch());
    }

    #[test]
    fn reset_zeroes_flags_and_drops_result() {
        let store = ResultStore::new();
        let cycle = store.begin_cycle(GameId::HOVER_AND_SEEK);
        store.mark_started(&cycle);
        cycle.complete(result(GameId::HOVER_AND_SEEK, true));

        store.reset();
        assert_eq!(store.flags(), InitFlags::default());
        assert!(store.get().is_none());
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn every_waiter_sees_the_same_result() {
        let store = ResultStore::new();
        let cycle = store.begin_cycle(GameId::HUES_THE_BOSS);

        let first = tokio::spawn({
            let cycle = cycle.clone();
            async move { cycle.wait_ready().await }
        });
        let second = tokio::spawn({
            let cycle = cycle.clone();
            async move { cycle.wait_ready().await }
        });
        tokio::task::yield_now().await;

        cycle.complete(result(GameId::HUES_THE_BOSS, true));
        let a = first.await.expect("join").expect("ready");
        let b = second.await.expect("join").expect("ready");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn wait_ready_returns_immediately_when_already_complete() {
        let store = ResultStore::new();
        let cycle = store.begin_cycle(GameId::COLOUR_CHAOS);
        cycle.complete(result(GameId::COLOUR_CHAOS, true));
        let ready = cycle.wait_ready().await.expect("ready");
        assert!(ready.success);
    }
}
