//! Autonomous cycle harness.
//!
//! Invoked on a schedule by an external timer; each `harness run` executes one
//! bounded agent session and records its outcome under `daemon/`.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use harness::cycle::run_cycle;
use harness::exit_codes;
use harness::io::config::{HarnessPaths, load_root_config};
use harness::io::cycle_log::next_cycle_number;
use harness::io::engine::ClaudeEngine;
use harness::io::files::to_json_pretty;
use harness::io::health_store::load_health;
use harness::logging;
use tracing::{error, warn};

#[derive(Parser)]
#[command(
    name = "harness",
    version,
    about = "Bounded-cost harness for scheduled autonomous agent cycles"
)]
struct Cli {
    /// Organisation root containing `daemon/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one autonomous cycle.
    Run,
    /// Print the number the next cycle would get.
    Next,
    /// Print the current health record.
    Health,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            error!(err = %format!("{err:#}"), "harness fatal error");
            eprintln!("Harness fatal error: {err:#}");
            exit_codes::ERROR
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    match cli.command {
        Command::Run => cmd_run(&cli.root),
        Command::Next => cmd_next(&cli.root),
        Command::Health => cmd_health(&cli.root),
    }
}

fn cmd_run(root: &Path) -> Result<i32> {
    let cfg = load_root_config(root)?;
    let engine = ClaudeEngine::new(cfg.engine.command.clone());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = runtime.block_on(run_cycle(root, &cfg, &engine, &mut out))?;
    Ok(outcome.exit_code())
}

fn cmd_next(root: &Path) -> Result<i32> {
    let cfg = load_root_config(root)?;
    let paths = HarnessPaths::new(root, &cfg);
    println!("{}", next_cycle_number(&paths.cycle_log));
    Ok(exit_codes::OK)
}

fn cmd_health(root: &Path) -> Result<i32> {
    let cfg = load_root_config(root)?;
    let paths = HarnessPaths::new(root, &cfg);
    let mut stdout = std::io::stdout().lock();
    // Display only: an unreadable record is reported, never fatal.
    let text = match load_health(&paths.health_file) {
        Ok(Some(state)) => to_json_pretty(&state)?,
        Ok(None) => format!("no health record at {}\n", paths.health_file.display()),
        Err(err) => {
            warn!(err = %format!("{err:#}"), "health record unreadable");
            format!("health record unreadable: {err:#}\n")
        }
    };
    stdout
        .write_all(text.as_bytes())
        .context("write health to stdout")?;
    Ok(exit_codes::OK)
}
