//! HTTP implementation of [`ConsoleApi`] against the console backend.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::core::types::{GameId, LeaderboardEntry};
use crate::io::api::{
    Ack, CheckRequest, CheckResponse, ConsoleApi, DoneResponse, LeaderboardResponse,
    PersistTokenRequest, ScanResponse, StartGameRequest, StartGameResponse,
};
use crate::io::config::{Endpoints, ServerConfig};

pub struct HttpConsoleApi {
    client: Client,
    base_url: Url,
    endpoints: Endpoints,
    check_timeout: Duration,
}

impl HttpConsoleApi {
    pub fn new(cfg: &ServerConfig) -> Result<Self> {
        let base_url = Url::parse(&cfg.base_url)
            .with_context(|| format!("parse base url {}", cfg.base_url))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url,
            endpoints: cfg.endpoints.clone(),
            check_timeout: Duration::from_secs(cfg.check_timeout_secs),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("join {} onto {}", path, self.base_url))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        read_json(response, &url).await
    }
}

/// Check the status, then parse the body. Body decoding errors are kept apart
/// from transport errors so failure classification can tell them apart.
async fn read_json<T: DeserializeOwned>(response: Response, url: &Url) -> Result<T> {
    let response = response
        .error_for_status()
        .with_context(|| format!("status from {url}"))?;
    let body = response
        .bytes()
        .await
        .with_context(|| format!("read body from {url}"))?;
    let parsed = parse_body(&body).with_context(|| format!("parse body from {url}"))?;
    Ok(parsed)
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(body)?)
}

#[async_trait]
impl ConsoleApi for HttpConsoleApi {
    async fn scan_token(&self) -> Result<ScanResponse> {
        self.get_json(&self.endpoints.scan_token).await
    }

    #[instrument(skip(self))]
    async fn connection_check(&self, game: GameId) -> Result<CheckResponse> {
        let url = self.url(&self.endpoints.connection_check)?;
        debug!(url = %url, "posting connection check");
        let response = self
            .client
            .post(url.clone())
            .timeout(self.check_timeout)
            .json(&CheckRequest {
                game_number: game.number(),
            })
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        read_json(response, &url).await
    }

    async fn persist_token(&self, token_id: u64) -> Result<Ack> {
        let url = self.url(&self.endpoints.persist_token)?;
        let response = self
            .client
            .post(url.clone())
            .json(&PersistTokenRequest { token_id })
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .with_context(|| format!("status from {url}"))?;
        let body = response
            .bytes()
            .await
            .with_context(|| format!("read body from {url}"))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Ack {
                success: true,
                error: None,
            });
        }
        parse_body(&body).with_context(|| format!("parse body from {url}"))
    }

    #[instrument(skip(self))]
    async fn start_game(&self, game: GameId, level: u8) -> Result<StartGameResponse> {
        let url = self.url(&self.endpoints.start_game)?;
        let response = self
            .client
            .post(url.clone())
            .json(&StartGameRequest {
                game_number: game.number(),
                level_number: level,
            })
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        read_json(response, &url).await
    }

    async fn game_done(&self) -> Result<bool> {
        let response: DoneResponse = self.get_json(&self.endpoints.game_done).await?;
        Ok(response.done)
    }

    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        let response: LeaderboardResponse = self.get_json(&self.endpoints.leaderboard).await?;
        Ok(response.leaderboard)
    }
}
