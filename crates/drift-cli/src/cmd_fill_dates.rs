use anyhow::{bail, Result};
use drift_store::{fill_dates_in_dir, BackfillReport};
use std::path::Path;

/// Execute `drift-tracker fill-dates [DIR]`. Files that cannot be
/// backfilled are listed in the report; the caller exits non-zero for them.
pub fn execute(dir: &Path) -> Result<BackfillReport> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let report = fill_dates_in_dir(dir)?;
    println!(
        "Read {} history files, updated {} ({} dates filled)",
        report.files_read, report.files_updated, report.dates_filled
    );
    for (path, message) in &report.failures {
        println!("  FAIL  {}: {message}", path.display());
    }
    Ok(report)
}
