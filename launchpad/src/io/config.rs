//! Console configuration stored in `launchpad.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::ControllerMode;

/// Console configuration (TOML).
///
/// Edited by kiosk operators. Missing fields default to the values the
/// console backend ships with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub server: ServerConfig,

    pub timings: Timings,

    /// Level requested when a game is started.
    pub level_number: u8,

    /// Controller wording shown until the kiosk toggles it.
    pub controller_mode: ControllerMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the console backend.
    pub base_url: String,

    /// Timeout for every request except the connectivity check.
    pub request_timeout_secs: u64,

    /// Timeout for the connectivity check. Bounds how long readiness can take.
    pub check_timeout_secs: u64,

    pub endpoints: Endpoints,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoints {
    pub scan_token: String,
    pub connection_check: String,
    pub persist_token: String,
    pub start_game: String,
    pub game_done: String,
    pub leaderboard: String,
}

/// Fixed pacing of the console timelines, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timings {
    /// Step reveal to outcome mark.
    pub reveal_delay_ms: u64,
    /// Outcome mark to next step.
    pub mark_delay_ms: u64,
    /// Wait after successful checks before launching.
    pub launch_grace_ms: u64,
    /// Wait after a successful retry before launching.
    pub retry_prelaunch_ms: u64,
    pub completion_poll_ms: u64,
    pub scan_poll_ms: u64,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            scan_token: "/scan_rfid".to_string(),
            connection_check: "/api/connection_check".to_string(),
            persist_token: "/write_rfid_token".to_string(),
            start_game: "/api/start_game".to_string(),
            game_done: "/game_done".to_string(),
            leaderboard: "/get_leaderboard".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: 10,
            check_timeout_secs: 120,
            endpoints: Endpoints::default(),
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            reveal_delay_ms: 200,
            mark_delay_ms: 200,
            launch_grace_ms: 3000,
            retry_prelaunch_ms: 3000,
            completion_poll_ms: 1500,
            scan_poll_ms: 1000,
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            timings: Timings::default(),
            level_number: 1,
            controller_mode: ControllerMode::default(),
        }
    }
}

impl Timings {
    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    pub fn mark_delay(&self) -> Duration {
        Duration::from_millis(self.mark_delay_ms)
    }

    pub fn launch_grace(&self) -> Duration {
        Duration::from_millis(self.launch_grace_ms)
    }

    pub fn retry_prelaunch(&self) -> Duration {
        Duration::from_millis(self.retry_prelaunch_ms)
    }

    pub fn completion_poll(&self) -> Duration {
        Duration::from_millis(self.completion_poll_ms)
    }

    pub fn scan_poll(&self) -> Duration {
        Duration::from_millis(self.scan_poll_ms)
    }
}

impl ConsoleConfig {
    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.server.base_url)
            .with_context(|| format!("server.base_url is not a URL: {}", self.server.base_url))?;
        if self.server.request_timeout_secs == 0 {
            return Err(anyhow!("server.request_timeout_secs must be > 0"));
        }
        if self.server.check_timeout_secs == 0 {
            return Err(anyhow!("server.check_timeout_secs must be > 0"));
        }
        // Polling loops must never spin.
        if self.timings.completion_poll_ms == 0 {
            return Err(anyhow!("timings.completion_poll_ms must be > 0"));
        }
        if self.timings.scan_poll_ms == 0 {
            return Err(anyhow!("timings.scan_poll_ms must be > 0"));
        }
        if self.level_number == 0 {
            return Err(anyhow!("level_number must be >= 1"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ConsoleConfig::default()`.
pub fn load_config(path: &Path) -> Result<ConsoleConfig> {
    if !path.exists() {
        let cfg = ConsoleConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ConsoleConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ConsoleConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
