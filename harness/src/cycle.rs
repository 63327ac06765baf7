//! Orchestration for a single autonomous `harness run` cycle.
//!
//! The lifecycle is strictly linear: number the cycle, run one bounded engine
//! session, classify it, then always write the report, update health and
//! attempt the bookkeeping commit, in that order. Nothing is retried.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, error, info, instrument};

use crate::core::format::{commit_message, format_timestamp, rounded_minutes};
use crate::core::health::{HealthState, HealthUpdate};
use crate::core::types::{CycleStatus, SessionOutcome};
use crate::exit_codes;
use crate::io::config::{HarnessConfig, HarnessPaths};
use crate::io::cycle_log::next_cycle_number;
use crate::io::engine::{Engine, QueryRequest};
use crate::io::git::{CommitResult, Git, commit_if_changed};
use crate::io::health_store::update_health;
use crate::io::prompt::{CycleContext, build_cycle_prompt};
use crate::io::report::{CycleReport, write_report};
use crate::io::session::run_session;

const RULE_WIDTH: usize = 60;

/// Result of one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub cycle: u32,
    pub timestamp: String,
    pub status: CycleStatus,
    pub session: SessionOutcome,
    pub duration_minutes: u64,
    pub report_path: PathBuf,
    pub health: HealthState,
    pub commit: CommitResult,
}

impl CycleOutcome {
    /// Process exit code; bookkeeping commit failures do not affect it.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            CycleStatus::Success => exit_codes::OK,
            CycleStatus::Error => exit_codes::ERROR,
        }
    }
}

/// Execute one cycle rooted at `root`.
///
/// Engine failures are classified, not returned: once the session has started,
/// a report and a health update are always produced. `Err` is reserved for
/// harness-fatal problems (missing prompt template, unwritable filesystem).
/// Banners and progress markers are written to `out`.
#[instrument(skip_all, fields(root = %root.display()))]
pub async fn run_cycle<E: Engine, W: Write>(
    root: &Path,
    cfg: &HarnessConfig,
    engine: &E,
    out: &mut W,
) -> Result<CycleOutcome> {
    let start = Instant::now();
    let timestamp = format_timestamp(Utc::now());
    let paths = HarnessPaths::new(root, cfg);

    let cycle = next_cycle_number(&paths.cycle_log);
    info!(cycle, %timestamp, "cycle started");
    emit(out, &start_banner(cycle, &timestamp, cfg));

    let prompt = build_cycle_prompt(
        &paths.prompt_template,
        &CycleContext {
            cycle,
            timestamp: &timestamp,
            max_turns: cfg.engine.max_turns,
            max_budget_usd: cfg.engine.max_budget_usd,
        },
    )?;

    let request = QueryRequest {
        workdir: root.to_path_buf(),
        prompt,
        model: cfg.engine.model.clone(),
        max_turns: cfg.engine.max_turns,
        max_budget_usd: cfg.engine.max_budget_usd,
    };
    let session = run_session(engine, &request, out).await;

    let status = session.status();
    let duration_minutes = rounded_minutes(start.elapsed());
    if let Some(err) = &session.error {
        error!(cycle, subtype = session.subtype.as_str(), err = %err, "cycle failed");
    } else {
        info!(cycle, turns = session.turns, cost_usd = session.cost_usd, "cycle complete");
    }
    emit(out, &end_banner(cycle, status, duration_minutes, &session));

    let report = CycleReport::new(
        cycle,
        &timestamp,
        duration_minutes,
        &cfg.engine.model,
        &session,
    );
    let report_path = write_report(&paths.reports_dir, &report)?;
    emit(out, &format!("Report written: {}\n", report_path.display()));

    let health = update_health(
        &paths.health_file,
        &HealthUpdate {
            outcome: &session,
            cycle,
            timestamp: &timestamp,
            duration_minutes,
        },
    )?;

    // The agent commits its own work; this picks up the report and health file.
    let message = commit_message(cycle, status, session.cost_usd, duration_minutes);
    let commit = commit_if_changed(&Git::new(root), &message);
    debug!(?commit, "bookkeeping commit finished");

    Ok(CycleOutcome {
        cycle,
        timestamp,
        status,
        session,
        duration_minutes,
        report_path,
        health,
        commit,
    })
}

fn start_banner(cycle: u32, timestamp: &str, cfg: &HarnessConfig) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    format!(
        "\n{rule}\n  Autonomous Cycle #{cycle}\n  Started: {timestamp}\n  Model: {} | Max turns: {} | Budget: ${:.2}\n{rule}\n\n",
        cfg.engine.model, cfg.engine.max_turns, cfg.engine.max_budget_usd
    )
}

fn end_banner(cycle: u32, status: CycleStatus, minutes: u64, session: &SessionOutcome) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let label = if status.is_error() { "FAILED" } else { "COMPLETE" };
    let mut buf = format!(
        "\n\n{rule}\n  Cycle #{cycle} {label}\n  Duration: {minutes}min | Turns: {} | Cost: ${:.4}\n  Tokens: {}\n",
        session.turns, session.cost_usd, session.usage
    );
    if let Some(err) = &session.error {
        buf.push_str(&format!("  Error: {err}\n"));
    }
    buf.push_str(&format!("{rule}\n\n"));
    buf
}

fn emit<W: Write>(out: &mut W, text: &str) {
    if let Err(err) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
        debug!(err = %err, "failed to write console output");
    }
}
