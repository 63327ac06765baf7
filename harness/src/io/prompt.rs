//! Cycle prompt assembly.
//!
//! The operator-owned template file is passed through verbatim and followed by
//! a `CYCLE_CONTEXT` block so the agent knows its cycle number and limits.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

const CYCLE_TEMPLATE: &str = include_str!("prompts/cycle.md");

/// Mode line shown to the agent.
pub const AUTONOMOUS_MODE: &str = "Autonomous (daemon, scheduled)";

/// Cycle metadata embedded in the prompt.
#[derive(Debug, Clone)]
pub struct CycleContext<'a> {
    pub cycle: u32,
    pub timestamp: &'a str,
    pub max_turns: u32,
    pub max_budget_usd: f64,
}

/// Render the session prompt from the operator template text and cycle metadata.
pub fn render_cycle_prompt(template: &str, ctx: &CycleContext<'_>) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("cycle", CYCLE_TEMPLATE)
        .context("load cycle prompt template")?;
    let rendered = env
        .get_template("cycle")?
        .render(context! {
            template => template.trim_end(),
            cycle => ctx.cycle,
            timestamp => ctx.timestamp,
            mode => AUTONOMOUS_MODE,
            budget => format!("{:.2}", ctx.max_budget_usd),
            max_turns => ctx.max_turns,
        })
        .context("render cycle prompt")?;
    Ok(rendered)
}

/// Read the template at `path` and render the session prompt.
///
/// A missing template is fatal: a cycle without instructions is meaningless.
pub fn build_cycle_prompt(path: &Path, ctx: &CycleContext<'_>) -> Result<String> {
    let template = fs::read_to_string(path)
        .with_context(|| format!("read prompt template {}", path.display()))?;
    let prompt = render_cycle_prompt(&template, ctx)?;
    debug!(bytes = prompt.len(), "cycle prompt rendered");
    Ok(prompt)
}
