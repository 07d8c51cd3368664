//! Headless game-launch console.
//!
//! Runs the same session flow as the kiosk front-end against a console
//! backend, printing what the player would see.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use launchpad::check;
use launchpad::core::phase::Phase;
use launchpad::core::types::{GameId, Player};
use launchpad::exit_codes;
use launchpad::io::api::ConsoleApi;
use launchpad::io::config::{ConsoleConfig, load_config, write_config};
use launchpad::io::http::HttpConsoleApi;
use launchpad::io::render::{RenderEvent, RenderSink};
use launchpad::logging;
use launchpad::orchestrator::Orchestrator;
use launchpad::present::ResultPresenter;
use launchpad::scan;
use launchpad::session::ModeToggle;
use launchpad::store::ResultStore;

#[derive(Parser)]
#[command(name = "launchpad", version, about = "Arcade game-launch console")]
struct Cli {
    /// Console configuration file.
    #[arg(long, global = true, default_value = "launchpad.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Run the connectivity check for a game and print every step.
    Check {
        #[arg(long)]
        game: u8,
    },
    /// Run a full session: scan, select, preview, check, launch, leaderboard.
    Play {
        #[arg(long)]
        game: u8,
        /// Skip scanning and play as this token.
        #[arg(long, requires = "name")]
        token: Option<u64>,
        #[arg(long, requires = "token")]
        name: Option<String>,
        /// Simulated preview length.
        #[arg(long, default_value_t = 5000)]
        preview_ms: u64,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    if let Command::InitConfig { force } = cli.command {
        cmd_init_config(&cli.config, force)?;
        return Ok(exit_codes::OK);
    }

    let config = load_config(&cli.config)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    match cli.command {
        Command::InitConfig { .. } => Ok(exit_codes::OK),
        Command::Check { game } => runtime.block_on(cmd_check(&config, GameId::new(game)?)),
        Command::Play {
            game,
            token,
            name,
            preview_ms,
        } => {
            let player = token.zip(name).map(|(token_id, name)| Player { token_id, name });
            runtime.block_on(cmd_play(
                &config,
                GameId::new(game)?,
                player,
                Duration::from_millis(preview_ms),
            ))
        }
    }
}

fn cmd_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &ConsoleConfig::default())?;
    println!("wrote {}", path.display());
    Ok(())
}

async fn cmd_check(config: &ConsoleConfig, game: GameId) -> Result<i32> {
    let api = HttpConsoleApi::new(&config.server)?;
    let presenter = ResultPresenter::new(
        Arc::new(StdoutSink),
        ModeToggle::new(config.controller_mode),
        &config.timings,
    );
    let store = ResultStore::new();
    let cycle = store.begin_cycle(game);
    let result = check::run_immediate(&api, &cycle, &presenter).await;
    Ok(if result.success {
        exit_codes::OK
    } else {
        exit_codes::CHECKS_FAILED
    })
}

async fn cmd_play(
    config: &ConsoleConfig,
    game: GameId,
    player: Option<Player>,
    preview: Duration,
) -> Result<i32> {
    ensure_level(game, config.level_number)?;
    let api: Arc<dyn ConsoleApi> = Arc::new(HttpConsoleApi::new(&config.server)?);
    let orchestrator = Orchestrator::new(Arc::clone(&api), Arc::new(StdoutSink), config);

    let player = match player {
        Some(player) => player,
        None => {
            println!("Scan your token...");
            scan::wait_for_token(&*api, config.timings.scan_poll()).await
        }
    };
    orchestrator.on_token_scanned(player);

    let info = game.info();
    orchestrator.on_game_selected(game, info.title, "");
    info!(preview_ms = preview.as_millis() as u64, "playing preview");
    tokio::time::sleep(preview).await;
    orchestrator.on_preview_timeline_ended();
    orchestrator.join_cycle().await;

    let snapshot = orchestrator.snapshot();
    if !snapshot.phase.is_terminal() {
        bail!("session stopped in phase {:?}", snapshot.phase);
    }
    Ok(match (snapshot.phase, snapshot.last_launch_error) {
        (Phase::Launched, _) => exit_codes::OK,
        (_, Some(_)) => exit_codes::LAUNCH_FAILED,
        _ => exit_codes::CHECKS_FAILED,
    })
}

/// Reject a configured level the selected game does not have.
fn ensure_level(game: GameId, level: u8) -> Result<()> {
    let info = game.info();
    if !info.has_level(level) {
        bail!(
            "level_number {level} is not valid for game {game} ({}), expected one of {:?}",
            info.title,
            info.levels
        );
    }
    Ok(())
}

/// Prints render events as plain text.
struct StdoutSink;

impl RenderSink for StdoutSink {
    fn emit(&self, event: RenderEvent) {
        match event {
            RenderEvent::StepRevealed { label } => println!("  {label} ..."),
            RenderEvent::StepMarked { label, ok, message } => {
                let mark = if ok { "ok" } else { "FAILED" };
                match message {
                    Some(message) => println!("  {label}: {mark} ({message})"),
                    None => println!("  {label}: {mark}"),
                }
            }
            RenderEvent::AllStepsPresented { success: true } => println!("All systems ready."),
            RenderEvent::AllStepsPresented { success: false } => {
                println!("Some systems are not ready.");
            }
            RenderEvent::CheckFailed { message } => println!("Check failed: {message}"),
            RenderEvent::LaunchFailed { message } => println!("Launch failed: {message}"),
            RenderEvent::LaunchSucceeded => println!("Game started."),
            RenderEvent::Leaderboard { entries } => {
                println!("Leaderboard:");
                for (rank, entry) in entries.iter().enumerate() {
                    println!("  {:>2}. {:<20} {}", rank + 1, entry.name, entry.score);
                }
            }
            RenderEvent::PlayerScanned { player } => println!("Welcome, {}!", player.name),
            RenderEvent::PhaseChanged { .. } => {}
        }
    }
}
