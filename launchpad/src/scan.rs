//! Token scan polling.

use std::time::Duration;

use tracing::debug;

use crate::core::types::Player;
use crate::io::api::ConsoleApi;

/// Poll the scan endpoint until a registered token is presented.
///
/// Unregistered tokens, empty reads and transport errors all keep polling.
pub async fn wait_for_token(api: &dyn ConsoleApi, interval: Duration) -> Player {
    loop {
        match api.scan_token().await {
            Ok(response) => {
                let error = response.error.clone();
                if let Some(player) = response.into_player() {
                    return player;
                }
                debug!(error = ?error, "no registered token yet");
            }
            Err(err) => debug!(error = %format!("{err:#}"), "scan poll failed"),
        }
        tokio::time::sleep(interval).await;
    }
}
