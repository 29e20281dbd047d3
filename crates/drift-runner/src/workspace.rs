use crate::source::SourceControl;
use drift_core::{mask_secrets, substitute_variables, DriftError, RepositoryEntry};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// A cloned repository, shared by every entry with the same URL.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceHandle {
    /// Raw URL from the repository list (before substitution).
    pub repository_url: String,
    pub local_directory: PathBuf,
}

impl WorkspaceHandle {
    /// Directory of the package at `path` inside the clone.
    ///
    /// Only plain relative paths are accepted; `..`, absolute paths and
    /// prefixes are refused so an entry can never reach outside its clone.
    pub fn package_dir(&self, path: &str) -> Result<PathBuf, DriftError> {
        let rel = Path::new(path);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(DriftError::ManagerDetection {
                directory: self.local_directory.join(rel),
                message: format!("path {path:?} leaves the repository"),
            });
        }
        Ok(self.local_directory.join(rel))
    }
}

/// Clone `repository_url` (after `$VAR` substitution) into a fresh temporary directory.
///
/// The returned [`TempDir`] removes the clone when dropped.
pub async fn provision(
    repository_url: &str,
    variables: &HashMap<String, String>,
    source: &dyn SourceControl,
) -> Result<(WorkspaceHandle, TempDir), DriftError> {
    let clone_err = |message: String| DriftError::Clone {
        repository: repository_url.to_string(),
        message,
    };

    let dir = tempfile::Builder::new()
        .prefix("drift-")
        .tempdir()
        .map_err(|e| clone_err(format!("cannot create temporary directory: {e}")))?;
    let resolved = substitute_variables(repository_url, variables);

    let start = Instant::now();
    source
        .shallow_clone(&resolved, dir.path())
        .await
        .map_err(|e| clone_err(mask_secrets(&format!("{e:#}"))))?;
    debug!(
        repository = repository_url,
        dir = %dir.path().display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "cloned"
    );

    let handle = WorkspaceHandle {
        repository_url: repository_url.to_string(),
        local_directory: dir.path().to_path_buf(),
    };
    Ok((handle, dir))
}

/// Run-scoped clone cache: at most one clone per distinct raw repository URL.
///
/// Clone failures are cached too, so every entry of a failed repository
/// reports the same error without retrying the clone.
pub struct Workspaces {
    handles: HashMap<String, Result<WorkspaceHandle, DriftError>>,
    dirs: Vec<TempDir>,
    keep: bool,
}

impl Workspaces {
    /// `keep`: leave clones on disk after the run instead of removing them.
    pub fn new(keep: bool) -> Self {
        Self {
            handles: HashMap::new(),
            dirs: Vec::new(),
            keep,
        }
    }

    /// Clone every repository of `entries` not cloned yet, up to
    /// `concurrency` at a time.
    pub async fn provision_all(
        &mut self,
        entries: &[RepositoryEntry],
        variables: &HashMap<String, String>,
        source: &dyn SourceControl,
        concurrency: usize,
    ) {
        let mut pending: Vec<&str> = Vec::new();
        for entry in entries {
            let url = entry.repository.as_str();
            if !self.handles.contains_key(url) && !pending.contains(&url) {
                pending.push(url);
            }
        }
        if pending.is_empty() {
            return;
        }
        info!(count = pending.len(), "cloning repositories");

        let results: Vec<_> = stream::iter(pending)
            .map(|url| async move { (url, provision(url, variables, source).await) })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        for (url, result) in results {
            let handle = match result {
                Ok((handle, dir)) => {
                    self.adopt(dir);
                    Ok(handle)
                }
                Err(e) => {
                    warn!(repository = url, error = %e, "clone failed");
                    Err(e)
                }
            };
            self.handles.insert(url.to_string(), handle);
        }
    }

    fn adopt(&mut self, dir: TempDir) {
        if self.keep {
            let path = dir.keep();
            info!(dir = %path.display(), "keeping workspace");
        } else {
            self.dirs.push(dir);
        }
    }

    /// Clone result for a raw repository URL, if it was provisioned.
    pub fn get(&self, repository_url: &str) -> Option<&Result<WorkspaceHandle, DriftError>> {
        self.handles.get(repository_url)
    }

    /// Number of distinct repositories provisioned (successfully or not).
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Remove the clones now. Best effort; failures are only logged.
    pub fn cleanup(self) {
        for dir in self.dirs {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(dir = %path.display(), error = %e, "could not remove workspace");
            }
        }
    }
}
