//! Harness configuration stored at `daemon/harness.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::files::write_atomic;

/// Location of the config file relative to the harness root.
pub const CONFIG_RELATIVE_PATH: &str = "daemon/harness.toml";

/// Harness configuration (TOML).
///
/// This file is checked in next to the daemon artifacts and changes only with
/// a deploy. Missing fields default to the production values; there are no
/// per-invocation overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Append-only markdown table of past cycles.
    pub cycle_log: PathBuf,
    /// Prompt template handed to the agent each cycle.
    pub prompt_template: PathBuf,
    /// Directory holding one `cycle-<n>.json` per cycle.
    pub reports_dir: PathBuf,
    /// Single overwritten health record polled by monitoring.
    pub health_file: PathBuf,

    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine CLI executable.
    pub command: String,
    pub model: String,
    /// Hard cap on agent turns per cycle.
    pub max_turns: u32,
    /// Hard cap on API spend per cycle.
    pub max_budget_usd: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            model: "sonnet".to_string(),
            max_turns: 50,
            max_budget_usd: 2.00,
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            cycle_log: PathBuf::from("daemon/CYCLE-LOG.md"),
            prompt_template: PathBuf::from("daemon/cto-cycle-prompt.md"),
            reports_dir: PathBuf::from("daemon/reports"),
            health_file: PathBuf::from("daemon/health.json"),
            engine: EngineConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("cycle_log", &self.cycle_log),
            ("prompt_template", &self.prompt_template),
            ("reports_dir", &self.reports_dir),
            ("health_file", &self.health_file),
        ] {
            if path.as_os_str().is_empty() {
                return Err(anyhow!("{name} must be a non-empty path"));
            }
        }
        if self.engine.command.trim().is_empty() {
            return Err(anyhow!("engine.command must be non-empty"));
        }
        if self.engine.model.trim().is_empty() {
            return Err(anyhow!("engine.model must be non-empty"));
        }
        if self.engine.max_turns == 0 {
            return Err(anyhow!("engine.max_turns must be > 0"));
        }
        if !self.engine.max_budget_usd.is_finite() || self.engine.max_budget_usd < 0.0 {
            return Err(anyhow!("engine.max_budget_usd must be a non-negative number"));
        }
        Ok(())
    }
}

/// Resolved absolute locations of the harness artifacts under `root`.
#[derive(Debug, Clone)]
pub struct HarnessPaths {
    pub cycle_log: PathBuf,
    pub prompt_template: PathBuf,
    pub reports_dir: PathBuf,
    pub health_file: PathBuf,
}

impl HarnessPaths {
    pub fn new(root: &Path, cfg: &HarnessConfig) -> Self {
        Self {
            cycle_log: root.join(&cfg.cycle_log),
            prompt_template: root.join(&cfg.prompt_template),
            reports_dir: root.join(&cfg.reports_dir),
            health_file: root.join(&cfg.health_file),
        }
    }
}

/// Load config for the harness rooted at `root`.
pub fn load_root_config(root: &Path) -> Result<HarnessConfig> {
    load_config(&root.join(CONFIG_RELATIVE_PATH))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate().with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HarnessConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, HarnessConfig::default());
        assert_eq!(cfg.engine.max_turns, 50);
        assert_eq!(cfg.engine.max_budget_usd, 2.0);
        assert_eq!(cfg.engine.model, "sonnet");
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("harness.toml");
        let mut cfg = HarnessConfig::default();
        cfg.engine.model = "opus".to_string();
        cfg.engine.max_turns = 20;
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("harness.toml");
        fs::write(&path, "[engine]\nmax_budget_usd = 0.5\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.engine.max_budget_usd, 0.5);
        assert_eq!(cfg.engine.max_turns, 50);
        assert_eq!(cfg.reports_dir, PathBuf::from("daemon/reports"));
    }

    #[test]
    fn rejects_zero_turns_and_negative_budget() {
        let mut cfg = HarnessConfig::default();
        cfg.engine.max_turns = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = HarnessConfig::default();
        cfg.engine.max_budget_usd = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn paths_resolve_against_root() {
        let mut cfg = HarnessConfig::default();
        cfg.health_file = PathBuf::from("ops/health.json");
        let paths = HarnessPaths::new(Path::new("/srv/org"), &cfg);
        assert_eq!(paths.cycle_log, PathBuf::from("/srv/org/daemon/CYCLE-LOG.md"));
        assert_eq!(
            paths.prompt_template,
            PathBuf::from("/srv/org/daemon/cto-cycle-prompt.md")
        );
        assert_eq!(paths.reports_dir, PathBuf::from("/srv/org/daemon/reports"));
        assert_eq!(paths.health_file, PathBuf::from("/srv/org/ops/health.json"));
    }
}
