//! Launchpad UI server - drives the kiosk session for a web front-end.

mod routes;
mod sse;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tower_http::services::ServeDir;
use tracing::info;

use launchpad::io::config::load_config;
use launchpad::io::http::HttpConsoleApi;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "launchpad-ui")]
#[command(about = "Web server driving the arcade game-launch console")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "3001")]
    port: u16,

    /// Console configuration file
    #[arg(long, default_value = "launchpad.toml")]
    config: PathBuf,

    /// Directory containing the front-end's static files
    #[arg(long, default_value = "ui/dist")]
    ui_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("launchpad_ui=info".parse()?)
                .add_directive("launchpad=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = load_config(&args.config)?;
    info!(
        config = %args.config.display(),
        backend = %config.server.base_url,
        "starting launchpad-ui"
    );

    let api = Arc::new(HttpConsoleApi::new(&config.server)?);
    let state = AppState::new(api, &config);

    let mut app = routes::app(state);
    if args.ui_dir.exists() {
        info!(ui_dir = %args.ui_dir.display(), "serving static UI files");
        app = app.fallback_service(
            ServeDir::new(&args.ui_dir).append_index_html_on_directories(true),
        );
    } else {
        info!(ui_dir = %args.ui_dir.display(), "UI directory not found, API-only mode");
    }

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
