//! Stable exit codes for harness CLI commands.

/// Command succeeded; for `harness run`, the session ended with `success`.
pub const OK: i32 = 0;
/// The session ended in any non-success way, or the harness itself failed.
pub const ERROR: i32 = 1;
