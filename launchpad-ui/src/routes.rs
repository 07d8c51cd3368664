//! HTTP route handlers for the kiosk front-end.
//!
//! Every mutating route forwards one front-end event to the orchestrator and
//! answers with the resulting session snapshot.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post, put};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use launchpad::core::types::{CATALOG, ControllerMode, GameId, GameInfo, Player};
use launchpad::session::SessionSnapshot;

use crate::sse;
use crate::state::AppState;

type ApiError = (StatusCode, String);

/// Build the full application router: `/api`, `/events` and CORS.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api_router())
        .route("/events", get(sse::events_handler))
        .layer(cors)
        .with_state(state)
}

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/games", get(list_games))
        .route("/session", get(get_session))
        .route("/scan/start", post(start_scan))
        .route("/scan/stop", post(stop_scan))
        .route("/scan", post(submit_scan))
        .route("/games/{id}/select", post(select_game))
        .route("/timeline-ended", post(timeline_ended))
        .route("/retry", post(retry))
        .route("/abandon", post(abandon))
        .route("/controller-mode", put(set_controller_mode))
}

async fn health() -> &'static str {
    "ok"
}

/// GET /api/games - the fixed game catalog.
async fn list_games() -> Json<&'static [GameInfo]> {
    Json(&CATALOG)
}

/// GET /api/session - current session snapshot.
async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.orchestrator.snapshot())
}

/// POST /api/scan/start - forget the current player and poll for a token.
async fn start_scan(State(state): State<AppState>) -> Json<SessionSnapshot> {
    state.orchestrator.start_scan();
    Json(state.orchestrator.snapshot())
}

async fn stop_scan(State(state): State<AppState>) -> StatusCode {
    state.orchestrator.stop_scan();
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct ScanBody {
    token_id: u64,
    name: String,
}

/// POST /api/scan - a token read by the front-end itself.
async fn submit_scan(
    State(state): State<AppState>,
    Json(body): Json<ScanBody>,
) -> Json<SessionSnapshot> {
    state.orchestrator.stop_scan();
    state.orchestrator.on_token_scanned(Player {
        token_id: body.token_id,
        name: body.name,
    });
    Json(state.orchestrator.snapshot())
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SelectBody {
    title: Option<String>,
    desc: String,
}

/// POST /api/games/{id}/select - card confirmed, preview starts playing.
async fn select_game(
    State(state): State<AppState>,
    Path(id): Path<u8>,
    body: Option<Json<SelectBody>>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let game = GameId::new(id).map_err(|err| (StatusCode::NOT_FOUND, format!("{err:#}")))?;
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let title = body
        .title
        .unwrap_or_else(|| game.info().title.to_string());
    state.orchestrator.on_game_selected(game, title, body.desc);
    Ok((StatusCode::ACCEPTED, Json(state.orchestrator.snapshot())))
}

/// POST /api/timeline-ended - the preview video finished.
async fn timeline_ended(State(state): State<AppState>) -> (StatusCode, Json<SessionSnapshot>) {
    state.orchestrator.on_preview_timeline_ended();
    (StatusCode::ACCEPTED, Json(state.orchestrator.snapshot()))
}

/// POST /api/retry - 409 unless the session is in a failed state.
async fn retry(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    if !state.orchestrator.on_retry_requested() {
        return Err((
            StatusCode::CONFLICT,
            format!("cannot retry in phase {:?}", state.orchestrator.phase()),
        ));
    }
    Ok((StatusCode::ACCEPTED, Json(state.orchestrator.snapshot())))
}

async fn abandon(State(state): State<AppState>) -> StatusCode {
    state.orchestrator.on_screen_abandoned();
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct ModeBody {
    mode: ControllerMode,
}

/// PUT /api/controller-mode - takes effect on the next rendered label.
async fn set_controller_mode(
    State(state): State<AppState>,
    Json(body): Json<ModeBody>,
) -> Json<SessionSnapshot> {
    info!(mode = ?body.mode, "controller mode changed");
    state.orchestrator.controller_mode().set(body.mode);
    Json(state.orchestrator.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use launchpad::io::config::{ConsoleConfig, Timings};
    use launchpad::test_support::{ApiCall, ScriptedApi, ScriptedCheck};
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    fn fast_config() -> ConsoleConfig {
        ConsoleConfig {
            timings: Timings {
                reveal_delay_ms: 1,
                mark_delay_ms: 1,
                launch_grace_ms: 5,
                retry_prelaunch_ms: 5,
                completion_poll_ms: 5,
                scan_poll_ms: 5,
            },
            ..ConsoleConfig::default()
        }
    }

    async fn serve(api: Arc<ScriptedApi>) -> SocketAddr {
        let state = AppState::new(api, &fast_config());
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app(state)).await.expect("serve");
        });
        addr
    }

    async fn session(client: &reqwest::Client, addr: SocketAddr) -> Value {
        client
            .get(format!("http://{addr}/api/session"))
            .send()
            .await
            .expect("session")
            .json()
            .await
            .expect("session json")
    }

    async fn wait_for_phase(client: &reqwest::Client, addr: SocketAddr, phase: &str) -> Value {
        for _ in 0..200 {
            let snapshot = session(client, addr).await;
            if snapshot["phase"] == phase {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("phase {phase} not reached");
    }

    #[tokio::test]
    async fn health_and_catalog() {
        let addr = serve(Arc::new(ScriptedApi::new())).await;
        let client = reqwest::Client::new();

        let health = client
            .get(format!("http://{addr}/api/health"))
            .send()
            .await
            .expect("health")
            .text()
            .await
            .expect("body");
        assert_eq!(health, "ok");

        let games: Value = client
            .get(format!("http://{addr}/api/games"))
            .send()
            .await
            .expect("games")
            .json()
            .await
            .expect("games json");
        assert_eq!(games.as_array().map(Vec::len), Some(3));
        assert_eq!(games[1]["title"], "Hues the Boss");
        assert_eq!(games[1]["levels"], json!([1]));
    }

    #[tokio::test]
    async fn unknown_game_and_early_retry_are_rejected() {
        let addr = serve(Arc::new(ScriptedApi::new())).await;
        let client = reqwest::Client::new();

        let status = client
            .post(format!("http://{addr}/api/games/9/select"))
            .send()
            .await
            .expect("select")
            .status();
        assert_eq!(status, reqwest::StatusCode::NOT_FOUND);

        let status = client
            .post(format!("http://{addr}/api/retry"))
            .send()
            .await
            .expect("retry")
            .status();
        assert_eq!(status, reqwest::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn full_session_launches_selected_game() {
        let api = Arc::new(ScriptedApi::new().with_check(ScriptedCheck::steps(&[
            ("controller", true, None),
            ("nodes", true, None),
            ("drone", true, None),
        ])));
        let addr = serve(Arc::clone(&api)).await;
        let client = reqwest::Client::new();

        client
            .post(format!("http://{addr}/api/scan"))
            .json(&json!({"token_id": 42, "name": "Ada"}))
            .send()
            .await
            .expect("scan");
        let selected: Value = client
            .post(format!("http://{addr}/api/games/3/select"))
            .json(&json!({"desc": "Paint the arena"}))
            .send()
            .await
            .expect("select")
            .json()
            .await
            .expect("select json");
        assert_eq!(selected["selection"]["title"], "Colour Chaos");
        assert_eq!(selected["flags"]["started"], true);

        client
            .post(format!("http://{addr}/api/timeline-ended"))
            .send()
            .await
            .expect("timeline");
        let snapshot = wait_for_phase(&client, addr, "launched").await;

        assert_eq!(snapshot["player"]["token_id"], 42);
        assert_eq!(snapshot["result"]["success"], true);
        assert_eq!(
            api.count(|call| matches!(call, ApiCall::StartGame(game, 1) if *game == GameId::COLOUR_CHAOS)),
            1
        );
    }

    #[tokio::test]
    async fn controller_mode_is_reflected_in_session() {
        let addr = serve(Arc::new(ScriptedApi::new())).await;
        let client = reqwest::Client::new();

        let snapshot: Value = client
            .put(format!("http://{addr}/api/controller-mode"))
            .json(&json!({"mode": "gesture"}))
            .send()
            .await
            .expect("mode")
            .json()
            .await
            .expect("mode json");

        assert_eq!(snapshot["controller_mode"], "gesture");
    }
}
