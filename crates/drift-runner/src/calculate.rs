use crate::tools::PackageTools;
use drift_core::{mask_secrets, DependencyResult, DriftError, PackageManager};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Per-dependency drift and pulse of an installed package.
///
/// The package directory is handed to the tool explicitly, so concurrent
/// calculations for different entries never share a working directory.
pub async fn calculate(
    package_dir: &Path,
    manager: PackageManager,
    tools: &dyn PackageTools,
) -> Result<Vec<DependencyResult>, DriftError> {
    let fail = |message: String| DriftError::DriftCalculation {
        directory: package_dir.to_path_buf(),
        message,
    };

    let start = Instant::now();
    let raw = tools
        .libyear(package_dir, manager)
        .await
        .map_err(|e| fail(mask_secrets(&format!("{e:#}"))))?;
    let results = parse_libyear_output(&raw).map_err(fail)?;
    debug!(
        dir = %package_dir.display(),
        dependencies = results.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "drift calculated"
    );
    Ok(results)
}

/// Parse libyear's `--json` report: an array of `{dependency, drift, pulse, ...}`.
///
/// Tools run through `npx` may print notices before the report, so when the
/// whole output is not JSON the array starting at the first line beginning
/// with `[` is tried.
pub fn parse_libyear_output(raw: &str) -> Result<Vec<DependencyResult>, String> {
    match serde_json::from_str::<Vec<DependencyResult>>(raw.trim()) {
        Ok(results) => Ok(results),
        Err(first) => {
            let start = raw
                .char_indices()
                .find(|&(i, c)| {
                    c == '['
                        && raw[..i]
                            .rsplit('\n')
                            .next()
                            .map_or(true, |before| before.trim().is_empty())
                })
                .map(|(i, _)| i);
            match start {
                Some(at) => serde_json::from_str(raw[at..].trim())
                    .map_err(|e| format!("invalid libyear report: {e}")),
                None => Err(format!("invalid libyear report: {first}")),
            }
        }
    }
}
