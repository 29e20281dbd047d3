use crate::types::PackageManager;
use std::path::PathBuf;

/// Failure of one pipeline stage.
///
/// Every variant is scoped to a repository entry (or, for `Clone`, to every
/// entry sharing the repository URL), which is why the type is `Clone`:
/// one clone failure is reported once per dependent entry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriftError {
    #[error("repository list line {line}: {message}")]
    Parse { line: usize, message: String },

    /// `repository` is the raw URL from the list, never the substituted one.
    #[error("cloning {repository} failed: {message}")]
    Clone { repository: String, message: String },

    #[error("cannot determine package manager in {}: {message}", .directory.display())]
    ManagerDetection { directory: PathBuf, message: String },

    #[error("{manager} install failed in {}: {message}", .directory.display())]
    Install {
        manager: PackageManager,
        directory: PathBuf,
        message: String,
    },

    #[error("drift calculation failed in {}: {message}", .directory.display())]
    DriftCalculation { directory: PathBuf, message: String },

    #[error("cannot persist {}: {message}", .path.display())]
    Persist { path: PathBuf, message: String },
}

impl DriftError {
    /// Stage name used in logs and the run report.
    pub fn kind(&self) -> &'static str {
        match self {
            DriftError::Parse { .. } => "parse",
            DriftError::Clone { .. } => "clone",
            DriftError::ManagerDetection { .. } => "manager-detection",
            DriftError::Install { .. } => "install",
            DriftError::DriftCalculation { .. } => "drift",
            DriftError::Persist { .. } => "persist",
        }
    }

    pub fn persist(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        DriftError::Persist {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_target() {
        let err = DriftError::Install {
            manager: PackageManager::Pnpm,
            directory: PathBuf::from("/tmp/x/api"),
            message: "exit 1: boom".into(),
        };
        assert_eq!(
            err.to_string(),
            "pnpm install failed in /tmp/x/api: exit 1: boom"
        );
        assert_eq!(err.kind(), "install");
    }

    #[test]
    fn persist_helper_wraps_display() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = DriftError::persist("/data/index.json", io);
        assert!(err.to_string().contains("/data/index.json"));
        assert!(err.to_string().contains("denied"));
    }
}
