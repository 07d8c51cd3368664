//! Game-launch console for an interactive drone/vehicle arcade.
//!
//! A player scans a token, picks a game, and watches its preview while the
//! hardware connectivity checks run in the background. Once the preview ends
//! and the checks are done, the stored result is replayed step by step and a
//! successful cycle starts the game exactly once.
//!
//! - **[`core`]**: Pure types and rules (catalog, step normalization, labels,
//!   phases). No I/O.
//! - **[`io`]**: Console backend client, configuration and render sinks.
//!
//! [`orchestrator`] ties the cycle store, presenter and launcher together and
//! is driven by the CLI and the UI server alike.

pub mod check;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod launch;
pub mod logging;
pub mod orchestrator;
pub mod present;
pub mod scan;
pub mod session;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
