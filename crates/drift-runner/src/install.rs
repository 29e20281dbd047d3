use crate::tools::PackageTools;
use drift_core::{mask_secrets, DriftError, PackageManager};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Install the dependencies of `package_dir` with lifecycle scripts disabled.
///
/// Repositories are third-party code; install scripts must never run.
pub async fn install(
    package_dir: &Path,
    manager: PackageManager,
    tools: &dyn PackageTools,
) -> Result<(), DriftError> {
    let start = Instant::now();
    tools
        .install(package_dir, manager)
        .await
        .map_err(|e| DriftError::Install {
            manager,
            directory: package_dir.to_path_buf(),
            message: mask_secrets(&format!("{e:#}")),
        })?;
    debug!(
        dir = %package_dir.display(),
        %manager,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "dependencies installed"
    );
    Ok(())
}
