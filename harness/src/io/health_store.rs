//! Health record storage (`daemon/health.json`).
//!
//! Read once best-effort, recomputed, then fully overwritten. Concurrent
//! harness invocations are excluded by the scheduler, not by locking here.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::health::{HealthState, HealthUpdate, PriorHealth, build_health_state};
use crate::io::files::{to_json_pretty, write_atomic};

/// Read the failure counter from a previous record.
///
/// Missing, unreadable or malformed files all mean "no prior state".
pub fn read_prior_health(path: &Path) -> Option<PriorHealth> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            debug!(path = %path.display(), err = %err, "no readable prior health");
            return None;
        }
    };
    match serde_json::from_str::<PriorHealth>(&contents) {
        Ok(prior) => Some(prior),
        Err(err) => {
            debug!(path = %path.display(), err = %err, "prior health unparseable, ignoring");
            None
        }
    }
}

/// Load the full health record (for display); `Ok(None)` when absent.
pub fn load_health(path: &Path) -> Result<Option<HealthState>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read health {}", path.display()))?;
    let state = serde_json::from_str(&contents)
        .with_context(|| format!("parse health {}", path.display()))?;
    Ok(Some(state))
}

/// Atomically replace the health record.
pub fn write_health(path: &Path, state: &HealthState) -> Result<()> {
    debug!(path = %path.display(), last_cycle = state.last_cycle, "writing health");
    write_atomic(path, &to_json_pretty(state)?)
}

/// Read-modify-write the health record for the cycle described by `update`.
#[instrument(skip_all, fields(cycle = update.cycle))]
pub fn update_health(path: &Path, update: &HealthUpdate<'_>) -> Result<HealthState> {
    let prior = read_prior_health(path);
    let state = build_health_state(prior, update);
    write_health(path, &state)?;
    info!(
        status = state.last_status.as_str(),
        consecutive_failures = state.consecutive_failures,
        "health updated"
    );
    Ok(state)
}
