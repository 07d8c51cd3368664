//! Tracing setup for the console binaries.
//!
//! Render output (what the player sees) goes through a
//! [`RenderSink`](crate::io::render::RenderSink); this module only covers
//! diagnostics on stderr.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `launchpad=info` if unset.
///
/// # Example
/// ```bash
/// RUST_LOG=launchpad=debug launchpad play --game 1 --token 42 --name Ada
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("launchpad=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
