use crate::process;
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Source-control operations the tracker needs. Implemented by [`GitCli`]
/// and [`MockSourceControl`] (tests).
#[async_trait::async_trait]
pub trait SourceControl: Send + Sync {
    /// Depth-1 clone of `url` into the existing, empty directory `dest`.
    async fn shallow_clone(&self, url: &str, dest: &Path) -> Result<()>;

    /// Stage `paths` in the repository at `repo` and commit them.
    /// Returns `false` when there was nothing to commit.
    async fn commit(&self, repo: &Path, paths: &[PathBuf], message: &str) -> Result<bool>;
}

/// Drives the `git` executable.
pub struct GitCli {
    pub git: PathBuf,
    pub timeout: Duration,
    pub author_name: String,
    pub author_email: String,
    cancel: CancellationToken,
}

impl GitCli {
    pub fn new(git: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            git: git.into(),
            timeout,
            author_name: "Dependency drift tracker".into(),
            author_email: "dependency-drift-tracker@users.noreply.github.com".into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    /// Kill running git processes when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn command(&self, cwd: &Path) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.git);
        cmd.current_dir(cwd)
            // never block on a credential prompt
            .env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    fn identity_args(&self) -> [String; 4] {
        [
            "-c".into(),
            format!("user.name={}", self.author_name),
            "-c".into(),
            format!("user.email={}", self.author_email),
        ]
    }
}

#[async_trait::async_trait]
impl SourceControl for GitCli {
    async fn shallow_clone(&self, url: &str, dest: &Path) -> Result<()> {
        let mut cmd = self.command(dest);
        cmd.args(["clone", "--depth", "1", "--", url]).arg(dest);
        process::run(cmd, "git clone", self.timeout, &self.cancel)
            .await
            .map_err(anyhow::Error::msg)?;
        Ok(())
    }

    async fn commit(&self, repo: &Path, paths: &[PathBuf], message: &str) -> Result<bool> {
        let mut add = self.command(repo);
        add.args(["add", "--"]).args(paths);
        process::run(add, "git add", self.timeout, &self.cancel)
            .await
            .map_err(anyhow::Error::msg)?;

        // `git diff --cached --quiet` exits 0 when nothing is staged
        let mut diff = self.command(repo);
        diff.args(["diff", "--cached", "--quiet"]);
        if process::run(diff, "git diff", self.timeout, &self.cancel)
            .await
            .is_ok()
        {
            return Ok(false);
        }

        let mut commit = self.command(repo);
        commit
            .args(self.identity_args())
            .args(["commit", "-m", message]);
        process::run(commit, "git commit", self.timeout, &self.cancel)
            .await
            .map_err(anyhow::Error::msg)?;
        Ok(true)
    }
}

/// In-memory source control for tests: records clones and commits, writes
/// fixture files into the clone directory, and fails on request.
pub struct MockSourceControl {
    clones: Mutex<Vec<String>>,
    commits: Mutex<Vec<(PathBuf, Vec<PathBuf>, String)>>,
    fixtures: Mutex<HashMap<String, Vec<(String, String)>>>,
    failing: Mutex<HashSet<String>>,
}

impl Default for MockSourceControl {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSourceControl {
    pub fn new() -> Self {
        Self {
            clones: Mutex::new(Vec::new()),
            commits: Mutex::new(Vec::new()),
            fixtures: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Files (relative path, content) written into every clone of `url`.
    pub fn set_files(&self, url: &str, files: &[(&str, &str)]) {
        let files = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect();
        self.fixtures
            .lock()
            .unwrap()
            .insert(url.to_string(), files);
    }

    pub fn fail_clone(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    /// URLs cloned so far, after variable substitution, in call order.
    pub fn clones(&self) -> Vec<String> {
        self.clones.lock().unwrap().clone()
    }

    pub fn commits(&self) -> Vec<(PathBuf, Vec<PathBuf>, String)> {
        self.commits.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SourceControl for MockSourceControl {
    async fn shallow_clone(&self, url: &str, dest: &Path) -> Result<()> {
        self.clones.lock().unwrap().push(url.to_string());
        if self.failing.lock().unwrap().contains(url) {
            anyhow::bail!("exit 128: fatal: repository '{url}' not found");
        }
        let files = self
            .fixtures
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_default();
        for (rel, content) in files {
            let path = dest.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }
        Ok(())
    }

    async fn commit(&self, repo: &Path, paths: &[PathBuf], message: &str) -> Result<bool> {
        self.commits.lock().unwrap().push((
            repo.to_path_buf(),
            paths.to_vec(),
            message.to_string(),
        ));
        Ok(true)
    }
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    async fn git(dir: &Path, args: &[&str]) {
        let status = tokio::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .await
            .unwrap()
            .status;
        assert!(status.success(), "git {args:?} failed");
    }

    async fn origin_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "-q"]).await;
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        git(dir.path(), &["add", "."]).await;
        git(
            dir.path(),
            &[
                "-c",
                "user.name=Test",
                "-c",
                "user.email=test@test.com",
                "commit",
                "-q",
                "-m",
                "init",
            ],
        )
        .await;
        dir
    }

    #[tokio::test]
    async fn clones_local_repository() {
        let origin = origin_repo().await;
        let dest = tempfile::tempdir().unwrap();
        let url = format!("file://{}", origin.path().display());

        GitCli::new("git", Duration::from_secs(60))
            .shallow_clone(&url, dest.path())
            .await
            .unwrap();
        assert!(dest.path().join("package.json").exists());
    }

    #[tokio::test]
    async fn clone_failure_is_an_error() {
        let dest = tempfile::tempdir().unwrap();
        let missing = dest.path().join("does-not-exist");
        let url = format!("file://{}", missing.display());
        let err = GitCli::new("git", Duration::from_secs(60))
            .shallow_clone(&url, dest.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exit"));
    }

    #[tokio::test]
    async fn commit_stages_and_skips_when_clean() {
        let repo = origin_repo().await;
        let git_cli = GitCli::new("git", Duration::from_secs(60));
        std::fs::create_dir_all(repo.path().join("data")).unwrap();
        std::fs::write(repo.path().join("data").join("index.json"), "{}").unwrap();

        let data = vec![PathBuf::from("data")];
        assert!(git_cli.commit(repo.path(), &data, "Update data").await.unwrap());
        assert!(!git_cli.commit(repo.path(), &data, "Update data").await.unwrap());
    }

    #[tokio::test]
    async fn mock_records_and_writes_fixtures() {
        let mock = MockSourceControl::new();
        mock.set_files("https://host/r.git", &[("api/package.json", "{}")]);
        mock.fail_clone("https://host/broken.git");

        let dest = tempfile::tempdir().unwrap();
        mock.shallow_clone("https://host/r.git", dest.path())
            .await
            .unwrap();
        assert!(dest.path().join("api/package.json").exists());
        assert!(mock
            .shallow_clone("https://host/broken.git", dest.path())
            .await
            .is_err());
        assert_eq!(
            mock.clones(),
            vec!["https://host/r.git", "https://host/broken.git"]
        );
    }
}
