use crate::config::Timeouts;
use crate::process;
use anyhow::Result;
use drift_core::PackageManager;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Node.js tooling invoked per package directory. Implemented by
/// [`NodeTools`] and [`MockTools`] (tests).
///
/// Every call receives the package directory explicitly; implementations
/// must run their tools there without touching the process working directory.
#[async_trait::async_trait]
pub trait PackageTools: Send + Sync {
    /// Output of `yarn --version` run in `dir`.
    async fn yarn_version(&self, dir: &Path) -> Result<String>;

    /// Install dependencies of `dir` with scripts disabled.
    async fn install(&self, dir: &Path, manager: PackageManager) -> Result<()>;

    /// Raw JSON report of libyear over all dependency kinds of `dir`.
    async fn libyear(&self, dir: &Path, manager: PackageManager) -> Result<String>;
}

/// Runs the real package managers and libyear as subprocesses.
pub struct NodeTools {
    pub libyear: Vec<String>,
    pub timeouts: Timeouts,
    cancel: CancellationToken,
}

impl NodeTools {
    pub fn new(libyear: Vec<String>, timeouts: Timeouts) -> Self {
        Self {
            libyear,
            timeouts,
            cancel: CancellationToken::new(),
        }
    }

    /// Kill running tools when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[async_trait::async_trait]
impl PackageTools for NodeTools {
    async fn yarn_version(&self, dir: &Path) -> Result<String> {
        let mut cmd = tokio::process::Command::new("yarn");
        cmd.arg("--version").current_dir(dir);
        let out = process::run(cmd, "yarn --version", self.timeouts.probe_timeout(), &self.cancel)
            .await
            .map_err(anyhow::Error::msg)?;
        Ok(out.stdout)
    }

    async fn install(&self, dir: &Path, manager: PackageManager) -> Result<()> {
        let mut cmd = process::shell(manager.install_command());
        cmd.current_dir(dir)
            .env("npm_config_ignore_scripts", "true")
            .env("YARN_ENABLE_SCRIPTS", "false");
        process::run(
            cmd,
            manager.install_command(),
            self.timeouts.install_timeout(),
            &self.cancel,
        )
        .await
        .map_err(anyhow::Error::msg)?;
        Ok(())
    }

    async fn libyear(&self, dir: &Path, manager: PackageManager) -> Result<String> {
        let (program, prefix) = self
            .libyear
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("libyear command is empty"))?;
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(prefix)
            .arg(format!("--package-manager={manager}"))
            .args(["--all", "--json"])
            .current_dir(dir);
        let out = process::run(cmd, "libyear", self.timeouts.drift_timeout(), &self.cancel)
            .await
            .map_err(anyhow::Error::msg)?;
        Ok(out.stdout)
    }
}

/// Scripted tooling for tests. Behaviour is keyed by the final components
/// of the package directory (e.g. `"api"` or `"repo/web"`).
pub struct MockTools {
    yarn_version: Mutex<String>,
    install_failures: Mutex<Vec<String>>,
    reports: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<(String, PathBuf, Option<PackageManager>)>>,
}

impl Default for MockTools {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTools {
    pub fn new() -> Self {
        Self {
            yarn_version: Mutex::new("1.22.19\n".into()),
            install_failures: Mutex::new(Vec::new()),
            reports: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_yarn_version(&self, version: &str) {
        *self.yarn_version.lock().unwrap() = version.to_string();
    }

    pub fn fail_install(&self, dir_suffix: &str) {
        self.install_failures
            .lock()
            .unwrap()
            .push(dir_suffix.to_string());
    }

    /// libyear JSON returned for directories ending in `dir_suffix`. Default: `[]`.
    pub fn set_report(&self, dir_suffix: &str, json: &str) {
        self.reports
            .lock()
            .unwrap()
            .insert(dir_suffix.to_string(), json.to_string());
    }

    /// `(operation, directory, manager)` in call order.
    pub fn calls(&self) -> Vec<(String, PathBuf, Option<PackageManager>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, op: &str) -> usize {
        self.calls().iter().filter(|(o, _, _)| o == op).count()
    }

    fn record(&self, op: &str, dir: &Path, manager: Option<PackageManager>) {
        self.calls
            .lock()
            .unwrap()
            .push((op.to_string(), dir.to_path_buf(), manager));
    }
}

#[async_trait::async_trait]
impl PackageTools for MockTools {
    async fn yarn_version(&self, dir: &Path) -> Result<String> {
        self.record("yarn_version", dir, None);
        Ok(self.yarn_version.lock().unwrap().clone())
    }

    async fn install(&self, dir: &Path, manager: PackageManager) -> Result<()> {
        self.record("install", dir, Some(manager));
        let failing = self
            .install_failures
            .lock()
            .unwrap()
            .iter()
            .any(|suffix| dir.ends_with(suffix));
        if failing {
            anyhow::bail!("exit 1: npm ERR! code E404");
        }
        Ok(())
    }

    async fn libyear(&self, dir: &Path, manager: PackageManager) -> Result<String> {
        self.record("libyear", dir, Some(manager));
        let report = self
            .reports
            .lock()
            .unwrap()
            .iter()
            .find(|(suffix, _)| dir.ends_with(suffix.as_str()))
            .map(|(_, json)| json.clone())
            .unwrap_or_else(|| "[]".into());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_matches_directory_suffix() {
        let tools = MockTools::new();
        tools.fail_install("api");
        tools.set_report("web", r#"[{"dependency":"a","drift":1,"pulse":1}]"#);

        assert!(tools
            .install(Path::new("/tmp/x/api"), PackageManager::Npm)
            .await
            .is_err());
        assert!(tools
            .install(Path::new("/tmp/x/web"), PackageManager::Npm)
            .await
            .is_ok());
        // suffix matches whole components only
        assert!(tools
            .install(Path::new("/tmp/x/rapi"), PackageManager::Npm)
            .await
            .is_ok());

        let report = tools
            .libyear(Path::new("/tmp/x/web"), PackageManager::Pnpm)
            .await
            .unwrap();
        assert!(report.contains("\"a\""));
        let report = tools
            .libyear(Path::new("/tmp/x/other"), PackageManager::Pnpm)
            .await
            .unwrap();
        assert_eq!(report, "[]");
        assert_eq!(tools.calls_of("install"), 3);
        assert_eq!(tools.calls_of("libyear"), 2);
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn libyear_runs_configured_prefix_in_package_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.json"), "[]").unwrap();
        // `sh -c 'cat report.json' <args...>` ignores the appended flags
        let tools = NodeTools::new(
            vec!["sh".into(), "-c".into(), "cat report.json".into()],
            Timeouts::default(),
        );
        let out = tools
            .libyear(dir.path(), PackageManager::Npm)
            .await
            .unwrap();
        assert_eq!(out.trim(), "[]");
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn libyear_receives_manager_flags() {
        let dir = tempfile::tempdir().unwrap();
        let tools = NodeTools::new(
            vec!["sh".into(), "-c".into(), "echo \"$@\"".into(), "libyear".into()],
            Timeouts::default(),
        );
        let out = tools
            .libyear(dir.path(), PackageManager::Berry)
            .await
            .unwrap();
        assert_eq!(out.trim(), "--package-manager=berry --all --json");
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn install_runs_in_package_dir_with_scripts_disabled() {
        use std::os::unix::fs::PermissionsExt;

        let bin = tempfile::tempdir().unwrap();
        let fake_npm = bin.path().join("npm");
        std::fs::write(
            &fake_npm,
            "#!/bin/sh\necho \"$npm_config_ignore_scripts $YARN_ENABLE_SCRIPTS $*\" > install.log\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake_npm, std::fs::Permissions::from_mode(0o755)).unwrap();
        let path = std::env::var("PATH").unwrap_or_default();
        std::env::set_var("PATH", format!("{}:{path}", bin.path().display()));

        let pkg = tempfile::tempdir().unwrap();
        let tools = NodeTools::new(vec!["libyear".into()], Timeouts::default());
        tools.install(pkg.path(), PackageManager::Npm).await.unwrap();

        let log = std::fs::read_to_string(pkg.path().join("install.log")).unwrap();
        assert_eq!(log.trim(), "true false install --ignore-scripts");
    }
}
