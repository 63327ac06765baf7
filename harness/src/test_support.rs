//! Test-only helpers: a scripted engine and a throwaway git repository.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow, bail};
use futures::StreamExt;
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::io::engine::{
    AssistantEvent, Engine, EngineEvent, EventStream, QueryRequest, ResultEvent,
};

/// Engine that replays a fixed event script instead of spawning a process.
///
/// Each instance answers exactly one query; the request is recorded so tests
/// can inspect the rendered prompt and limits.
pub struct ScriptedEngine {
    script: Mutex<Option<Vec<Result<EngineEvent>>>>,
    open_error: Option<String>,
    requests: Mutex<Vec<QueryRequest>>,
}

impl ScriptedEngine {
    pub fn new(events: Vec<Result<EngineEvent>>) -> Self {
        Self {
            script: Mutex::new(Some(events)),
            open_error: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Engine whose `query` call itself fails (e.g. binary missing).
    pub fn failing_to_open(message: &str) -> Self {
        Self {
            script: Mutex::new(None),
            open_error: Some(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> Option<QueryRequest> {
        self.requests
            .lock()
            .ok()
            .and_then(|requests| requests.last().cloned())
    }

    pub fn query_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Engine for ScriptedEngine {
    fn query(&self, request: &QueryRequest) -> Result<EventStream> {
        self.requests
            .lock()
            .map_err(|_| anyhow!("scripted engine lock poisoned"))?
            .push(request.clone());
        if let Some(message) = &self.open_error {
            bail!("{message}");
        }
        let events = self
            .script
            .lock()
            .map_err(|_| anyhow!("scripted engine lock poisoned"))?
            .take()
            .context("scripted engine already queried")?;
        Ok(futures::stream::iter(events).boxed())
    }
}

/// An intermediate assistant message.
pub fn assistant() -> EngineEvent {
    EngineEvent::Assistant(AssistantEvent::default())
}

/// A terminal result event with the given subtype and accounting.
pub fn result_event(subtype: &str, result: Option<&str>, cost_usd: f64, turns: u32) -> EngineEvent {
    EngineEvent::Result(ResultEvent {
        subtype: subtype.to_string(),
        result: result.map(str::to_string),
        total_cost_usd: Some(cost_usd),
        usage: Some(json!({ "input_tokens": 1200, "output_tokens": 340 })),
        num_turns: Some(turns),
        duration_ms: Some(61_000),
    })
}

/// Temporary git repository laid out like an organisation root.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Initialise a repository with one commit and an empty `daemon/` directory.
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        let repo = Self { dir };
        repo.git(&["init", "--quiet"])?;
        repo.git(&["config", "user.email", "harness@example.com"])?;
        repo.git(&["config", "user.name", "Harness Test"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        fs::create_dir_all(repo.path().join("daemon")).context("create daemon dir")?;
        fs::write(repo.path().join("README.md"), "# org\n").context("write README")?;
        repo.git(&["add", "-A"])?;
        repo.git(&["commit", "--quiet", "-m", "initial"])?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the operator prompt template at its default location.
    pub fn write_prompt(&self, text: &str) -> Result<()> {
        self.write("daemon/cto-cycle-prompt.md", text)
    }

    /// Write a cycle log with one table row per cycle number.
    pub fn write_cycle_log(&self, cycles: &[u32]) -> Result<()> {
        let mut buf = String::from("# Cycle Log\n\n| Cycle | Date | Summary |\n|-------|------|---------|\n");
        for cycle in cycles {
            buf.push_str(&format!("| {cycle} | 2026-10-01 | work |\n"));
        }
        self.write("daemon/CYCLE-LOG.md", &buf)
    }

    /// Write a raw health record.
    pub fn write_health(&self, contents: &str) -> Result<()> {
        self.write("daemon/health.json", contents)
    }

    pub fn read_report(&self, cycle: u32) -> Result<Value> {
        self.read_json(&format!("daemon/reports/cycle-{cycle}.json"))
    }

    pub fn read_health(&self) -> Result<Value> {
        self.read_json("daemon/health.json")
    }

    /// Commit all pending changes, as the agent would at the end of its work.
    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.git(&["add", "-A"])?;
        self.git(&["commit", "--quiet", "-m", message])?;
        Ok(())
    }

    pub fn write(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    fn read_json(&self, relative: &str) -> Result<Value> {
        let path = self.path().join(relative);
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
    }

    fn git(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}
