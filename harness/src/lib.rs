//! Bounded-cost harness for scheduled autonomous agent cycles.
//!
//! Each invocation runs exactly one cycle: pick the next cycle number, run one
//! agent session under hard turn and budget caps, then record a per-cycle
//! report, a rolling health record and a bookkeeping git commit. The
//! architecture keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (numbering, classification,
//!   health arithmetic, formatting). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem, git, engine process).
//!
//! [`cycle`] coordinates the two to implement `harness run`.

pub mod core;
pub mod cycle;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
