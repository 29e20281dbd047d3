use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the base directory.
pub const CONFIG_FILE: &str = "drift-tracker.json";

/// Per-stage subprocess timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    pub clone: u64,
    pub probe: u64,
    pub install: u64,
    pub drift: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            clone: 600,
            probe: 60,
            install: 1800,
            drift: 900,
        }
    }
}

impl Timeouts {
    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install)
    }

    pub fn drift_timeout(&self) -> Duration {
        Duration::from_secs(self.drift)
    }

    /// A zero timeout would fail every stage at once.
    pub fn validate(&self) -> Result<()> {
        for (stage, secs) in [
            ("clone", self.clone),
            ("probe", self.probe),
            ("install", self.install),
            ("drift", self.drift),
        ] {
            if secs == 0 {
                anyhow::bail!("timeouts.{stage} must be at least 1 second");
            }
        }
        Ok(())
    }
}

/// Settings of one tracker run. Relative paths are resolved against the base directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub repositories_file: PathBuf,
    pub data_dir: PathBuf,
    pub concurrency: usize,
    pub timeouts: Timeouts,
    pub git: PathBuf,
    /// Command prefix for libyear; `--package-manager=.. --all --json` is appended.
    pub libyear: Vec<String>,
    pub keep_workspaces: bool,
    pub commit: bool,
    pub commit_author_name: String,
    pub commit_author_email: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            repositories_file: PathBuf::from("repositories.txt"),
            data_dir: PathBuf::from("data"),
            concurrency: 4,
            timeouts: Timeouts::default(),
            git: PathBuf::from("git"),
            libyear: vec!["npx".into(), "--yes".into(), "libyear".into()],
            keep_workspaces: false,
            commit: false,
            commit_author_name: "Dependency drift tracker".into(),
            commit_author_email: "dependency-drift-tracker@users.noreply.github.com".into(),
        }
    }
}

impl RunConfig {
    /// Load a config file. Returns defaults if it doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Load a config file that must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: RunConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        if self.libyear.is_empty() {
            anyhow::bail!("libyear command must not be empty");
        }
        self.timeouts.validate()
    }

    pub fn repositories_path(&self, base: &Path) -> PathBuf {
        base.join(&self.repositories_file)
    }

    pub fn data_path(&self, base: &Path) -> PathBuf {
        base.join(&self.data_dir)
    }
}
