//! Git adapter for the harness bookkeeping commit.
//!
//! The harness only ever stages everything and commits when something is
//! staged, so we keep a small, explicit wrapper around `git` subprocess calls.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

/// What [`commit_if_changed`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    Committed,
    /// Nothing was staged; no commit was created.
    NoChanges,
    /// Staging or committing failed; the error was logged and swallowed.
    Failed(String),
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Stage all changes (respects .gitignore).
    pub fn add_all(&self) -> Result<()> {
        self.run_checked(&["add", "-A"])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run_checked(&["diff", "--cached", "--name-only"])?;
        Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
    }

    /// Commit staged changes with a message.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!("committing staged changes");
        self.run_checked(&["commit", "-m", message])?;
        Ok(true)
    }

    /// Return the current HEAD commit subject.
    #[cfg(any(test, feature = "test-support"))]
    pub fn head_subject(&self) -> Result<String> {
        let out = self.run_checked(&["log", "-1", "--format=%s"])?;
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// Number of commits reachable from HEAD.
    #[cfg(any(test, feature = "test-support"))]
    pub fn commit_count(&self) -> Result<u32> {
        let out = self.run_checked(&["rev-list", "--count", "HEAD"])?;
        let raw = String::from_utf8_lossy(&out.stdout);
        raw.trim()
            .parse()
            .with_context(|| format!("parse commit count '{}'", raw.trim()))
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// Stage everything and commit it if the staged set is non-empty.
///
/// Never fails: bookkeeping problems must not change how the cycle itself is
/// classified, so errors are logged and reported as [`CommitResult::Failed`].
#[instrument(skip_all, fields(workdir = %git.workdir().display()))]
pub fn commit_if_changed(git: &Git, message: &str) -> CommitResult {
    if let Err(err) = git.add_all() {
        warn!(err = %format!("{err:#}"), "git stage failed");
        return CommitResult::Failed(format!("{err:#}"));
    }
    match git.commit_staged(message) {
        Ok(true) => {
            info!(commit_message = message, "committed harness artifacts");
            CommitResult::Committed
        }
        Ok(false) => {
            info!("no changes to commit");
            CommitResult::NoChanges
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "git commit failed");
            CommitResult::Failed(format!("{err:#}"))
        }
    }
}
