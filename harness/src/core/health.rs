//! Failure-streak accounting for the health record.
//!
//! The health record is a single overwritten document describing the most
//! recent cycle. External monitors poll `consecutive_failures` to decide when
//! to escalate.

use serde::{Deserialize, Serialize};

use crate::core::types::{CycleStatus, SessionOutcome};

/// Persisted status of the most recent cycle (`daemon/health.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthState {
    pub last_cycle: u32,
    pub last_timestamp: String,
    pub last_status: CycleStatus,
    pub last_cost_usd: f64,
    pub last_duration_minutes: u64,
    pub last_turns: u32,
    /// Cycles in a row, ending with the last one, that were classified as errors.
    pub consecutive_failures: u32,
}

/// The part of a previous health record that matters for accounting.
///
/// Parsed leniently: a record without the counter is treated as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PriorHealth {
    #[serde(default)]
    pub consecutive_failures: u32,
}

/// Inputs for computing the next health record.
#[derive(Debug, Clone)]
pub struct HealthUpdate<'a> {
    pub outcome: &'a SessionOutcome,
    pub cycle: u32,
    pub timestamp: &'a str,
    pub duration_minutes: u64,
}

/// Compute the new failure streak.
///
/// Success resets to zero; an error extends the prior streak, or starts a new
/// one at 1 when no prior record could be read.
pub fn next_consecutive_failures(prior: Option<PriorHealth>, status: CycleStatus) -> u32 {
    match (status, prior) {
        (CycleStatus::Success, _) => 0,
        (CycleStatus::Error, Some(prior)) => prior.consecutive_failures.saturating_add(1),
        (CycleStatus::Error, None) => 1,
    }
}

/// Build the complete replacement record for this cycle.
pub fn build_health_state(prior: Option<PriorHealth>, update: &HealthUpdate<'_>) -> HealthState {
    let status = update.outcome.status();
    HealthState {
        last_cycle: update.cycle,
        last_timestamp: update.timestamp.to_string(),
        last_status: status,
        last_cost_usd: update.outcome.cost_usd,
        last_duration_minutes: update.duration_minutes,
        last_turns: update.outcome.turns,
        consecutive_failures: next_consecutive_failures(prior, status),
    }
}
