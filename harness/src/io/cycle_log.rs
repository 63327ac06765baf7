//! Read-only access to the historical cycle log.
//!
//! Rows are appended by the agent (or a human), never by the harness, so the
//! number computed here is advisory until a new row lands.

use std::fs;
use std::path::Path;

use tracing::{debug, instrument};

use crate::core::numbering::{FIRST_CYCLE, next_cycle_from_log};

/// Return the next cycle number for the log at `path`.
///
/// An unreadable or missing log is treated as an empty history.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn next_cycle_number(path: &Path) -> u32 {
    match fs::read_to_string(path) {
        Ok(log) => {
            let next = next_cycle_from_log(&log);
            debug!(next, "derived next cycle number");
            next
        }
        Err(err) => {
            debug!(err = %err, "cycle log unreadable, starting from first cycle");
            FIRST_CYCLE
        }
    }
}
