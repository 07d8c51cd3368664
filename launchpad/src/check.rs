//! Connectivity check runner.
//!
//! One request per cycle. Whatever happens to the request, the cycle always
//! completes so waiters never hang: transport and unexpected failures become a
//! failed result with no steps.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::core::steps::normalize;
use crate::core::types::{CheckCycleResult, GameId};
use crate::io::api::{ConsoleApi, classify_failure};
use crate::present::ResultPresenter;
use crate::store::CycleHandle;

/// Issue the check request for `game` and normalize the response.
#[instrument(skip(api))]
pub async fn run_check(api: &dyn ConsoleApi, game: GameId) -> CheckCycleResult {
    match api.connection_check(game).await {
        Ok(response) => {
            let result = normalize(game, response.success, &response.steps);
            let failed: Vec<&str> = result
                .failed_steps()
                .map(|step| step.kind.as_str())
                .collect();
            info!(
                steps = result.steps.len(),
                success = result.success,
                failed = ?failed,
                "connection check finished"
            );
            result
        }
        Err(err) => {
            let kind = classify_failure(&err);
            warn!(error = %format!("{err:#}"), kind = ?kind, "connection check did not run");
            CheckCycleResult::failed_to_run(game, kind, format!("{err:#}"))
        }
    }
}

/// Deferred mode: populate the cycle without rendering anything.
pub async fn run_deferred(api: &dyn ConsoleApi, cycle: &CycleHandle) -> Arc<CheckCycleResult> {
    let result = run_check(api, cycle.game()).await;
    cycle.complete(result)
}

/// Immediate mode: populate the cycle, then show every step as it arrives.
pub async fn run_immediate(
    api: &dyn ConsoleApi,
    cycle: &CycleHandle,
    presenter: &ResultPresenter,
) -> Arc<CheckCycleResult> {
    let result = run_deferred(api, cycle).await;
    presenter.replay(&result).await;
    result
}
