//! Stable exit codes for the `launchpad` CLI.

/// Checks passed and, for `play`, the game was started.
pub const OK: i32 = 0;
/// Invalid config or arguments, or any other error before a session ran.
pub const INVALID: i32 = 1;
/// The connectivity check failed or could not run.
pub const CHECKS_FAILED: i32 = 4;
/// Checks passed but the game could not be started.
pub const LAUNCH_FAILED: i32 = 5;
