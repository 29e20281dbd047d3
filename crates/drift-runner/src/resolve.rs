//! Package manager detection.
//!
//! Lockfiles decide first, in the package directory and then in its
//! ancestors up to the clone root (monorepo sub-paths). After that the
//! `packageManager` field of `package.json`, then `node_modules` markers.
//! A bare `package.json` means npm.

use crate::tools::PackageTools;
use drift_core::{mask_secrets, DriftError, PackageManager};
use std::path::Path;
use tracing::debug;

const LOCKFILES: [(&str, PackageManager); 4] = [
    ("package-lock.json", PackageManager::Npm),
    ("npm-shrinkwrap.json", PackageManager::Npm),
    ("yarn.lock", PackageManager::Yarn),
    ("pnpm-lock.yaml", PackageManager::Pnpm),
];

fn lockfile_manager(dir: &Path) -> Option<(PackageManager, &'static str)> {
    LOCKFILES
        .iter()
        .find(|(file, _)| dir.join(file).is_file())
        .map(|(file, pm)| (*pm, *file))
}

fn manifest_manager(dir: &Path) -> Option<PackageManager> {
    let content = std::fs::read_to_string(dir.join("package.json")).ok()?;
    let manifest: serde_json::Value = serde_json::from_str(&content).ok()?;
    let field = manifest.get("packageManager")?.as_str()?;
    let name = field.split('@').next()?;
    match name {
        "npm" => Some(PackageManager::Npm),
        "yarn" => Some(PackageManager::Yarn),
        "pnpm" => Some(PackageManager::Pnpm),
        _ => None,
    }
}

fn node_modules_manager(dir: &Path) -> Option<PackageManager> {
    let modules = dir.join("node_modules");
    if !modules.is_dir() {
        return None;
    }
    if modules.join(".modules.yaml").exists() {
        Some(PackageManager::Pnpm)
    } else if modules.join(".yarn-integrity").exists() {
        Some(PackageManager::Yarn)
    } else {
        Some(PackageManager::Npm)
    }
}

/// Infer the package manager of `package_dir`, looking no higher than `root`.
///
/// Never returns [`PackageManager::Berry`]; see [`resolve`].
pub fn detect_manager(package_dir: &Path, root: &Path) -> Result<PackageManager, DriftError> {
    let fail = |message: &str| DriftError::ManagerDetection {
        directory: package_dir.to_path_buf(),
        message: message.to_string(),
    };

    if !package_dir.is_dir() {
        return Err(fail("package directory does not exist"));
    }

    if let Some((pm, file)) = lockfile_manager(package_dir) {
        debug!(dir = %package_dir.display(), file, "detected {pm} from lockfile");
        return Ok(pm);
    }

    for dir in package_dir
        .ancestors()
        .skip(1)
        .take_while(|dir| dir.starts_with(root))
    {
        if dir.join("pnpm-workspace.yaml").is_file() {
            debug!(dir = %dir.display(), "detected pnpm workspace root");
            return Ok(PackageManager::Pnpm);
        }
        if let Some((pm, file)) = lockfile_manager(dir) {
            debug!(dir = %dir.display(), file, "detected {pm} from workspace lockfile");
            return Ok(pm);
        }
    }

    if let Some(pm) = manifest_manager(package_dir) {
        debug!(dir = %package_dir.display(), "detected {pm} from packageManager field");
        return Ok(pm);
    }

    if let Some(pm) = node_modules_manager(package_dir) {
        debug!(dir = %package_dir.display(), "detected {pm} from node_modules");
        return Ok(pm);
    }

    if package_dir.join("package.json").is_file() {
        debug!(dir = %package_dir.display(), "no lockfile, defaulting to npm");
        return Ok(PackageManager::Npm);
    }

    Err(fail("no package.json or lockfile found"))
}

/// Classify `yarn --version` output: major 0 or 1 is classic yarn, anything
/// newer is berry. `None` if the output has no leading version number.
pub fn classify_yarn_version(output: &str) -> Option<PackageManager> {
    let version = output.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    let digits: String = version.chars().take_while(|c| c.is_ascii_digit()).collect();
    let major: u64 = digits.parse().ok()?;
    Some(if major <= 1 {
        PackageManager::Yarn
    } else {
        PackageManager::Berry
    })
}

/// Decide the manager for `package_dir`: the pinned one if given, otherwise
/// [`detect_manager`]. Yarn is then split into classic and berry by probing
/// the yarn executable inside the directory.
pub async fn resolve(
    package_dir: &Path,
    root: &Path,
    pinned: Option<PackageManager>,
    tools: &dyn PackageTools,
) -> Result<PackageManager, DriftError> {
    let detected = match pinned {
        Some(pm) => pm,
        None => detect_manager(package_dir, root)?,
    };
    if detected != PackageManager::Yarn {
        return Ok(detected);
    }

    let fail = |message: String| DriftError::ManagerDetection {
        directory: package_dir.to_path_buf(),
        message,
    };
    let output = tools
        .yarn_version(package_dir)
        .await
        .map_err(|e| fail(format!("yarn version probe failed: {}", mask_secrets(&format!("{e:#}")))))?;
    let manager = classify_yarn_version(&output)
        .ok_or_else(|| fail(format!("unrecognized yarn version {:?}", output.trim())))?;
    debug!(dir = %package_dir.display(), version = output.trim(), "yarn resolved to {manager}");
    Ok(manager)
}
