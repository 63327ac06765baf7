//! Per-cycle report files under `daemon/reports/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::format::result_preview;
use crate::core::types::{CycleStatus, SessionOutcome, SessionSubtype};
use crate::io::files::to_json_pretty;

/// Immutable record of one cycle, written once at cycle end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u32,
    pub timestamp: String,
    pub duration_minutes: u64,
    pub duration_api_ms: u64,
    pub model: String,
    pub turns: u32,
    pub cost_usd: f64,
    pub usage: Value,
    pub status: CycleStatus,
    pub subtype: SessionSubtype,
    pub error: Option<String>,
    pub result_summary: Option<String>,
}

impl CycleReport {
    pub fn new(
        cycle: u32,
        timestamp: &str,
        duration_minutes: u64,
        model: &str,
        outcome: &SessionOutcome,
    ) -> Self {
        Self {
            cycle,
            timestamp: timestamp.to_string(),
            duration_minutes,
            duration_api_ms: outcome.api_duration_ms,
            model: model.to_string(),
            turns: outcome.turns,
            cost_usd: outcome.cost_usd,
            usage: outcome.usage.clone(),
            status: outcome.status(),
            subtype: outcome.subtype.clone(),
            error: outcome.error.clone(),
            result_summary: outcome.result_text.as_deref().map(result_preview),
        }
    }
}

/// Path of the report for `cycle` inside `dir`.
pub fn report_path(dir: &Path, cycle: u32) -> PathBuf {
    dir.join(format!("cycle-{cycle}.json"))
}

/// Write `report` to `<dir>/cycle-<n>.json`, creating `dir` if needed.
///
/// An existing report for the same cycle is overwritten.
#[instrument(skip_all, fields(cycle = report.cycle))]
pub fn write_report(dir: &Path, report: &CycleReport) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create reports dir {}", dir.display()))?;
    let path = report_path(dir, report.cycle);
    let buf = to_json_pretty(report)?;
    fs::write(&path, buf).with_context(|| format!("write report {}", path.display()))?;
    debug!(path = %path.display(), "report written");
    Ok(path)
}
