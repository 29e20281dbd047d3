//! Repository list parsing.
//!
//! One entry per line: `REPOSITORY_URL[#PATH][,FLAGS_JSON]`. Blank lines and
//! lines starting with `#` are comments.

use crate::error::DriftError;
use crate::types::{PackageManager, RepositoryEntry, FLAG_PACKAGE_MANAGER};

/// Parse a whole repository list, preserving line order.
pub fn parse_file(content: &str) -> Result<Vec<RepositoryEntry>, DriftError> {
    let mut entries = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        entries.push(parse_line_at(trimmed, idx + 1)?);
    }
    Ok(entries)
}

/// Parse a single (non-comment) repository line.
pub fn parse_line(line: &str) -> Result<RepositoryEntry, DriftError> {
    parse_line_at(line.trim(), 1)
}

fn parse_line_at(line: &str, line_no: usize) -> Result<RepositoryEntry, DriftError> {
    let parse_err = |message: String| DriftError::Parse {
        line: line_no,
        message,
    };

    let (location, flags_raw) = match line.split_once(',') {
        Some((location, flags)) => (location, Some(flags.trim())),
        None => (line, None),
    };
    let (repository, path) = location.split_once('#').unwrap_or((location, ""));

    let flags = match flags_raw {
        None => serde_json::Map::new(),
        Some(raw) => match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(other) => {
                return Err(parse_err(format!(
                    "flags must be a JSON object, got {other}"
                )))
            }
            Err(e) => return Err(parse_err(format!("invalid flags JSON: {e}"))),
        },
    };

    if let Some(pm) = flags.get(FLAG_PACKAGE_MANAGER) {
        let name = pm
            .as_str()
            .ok_or_else(|| parse_err(format!("{FLAG_PACKAGE_MANAGER} must be a string")))?;
        name.parse::<PackageManager>().map_err(parse_err)?;
    }

    Ok(RepositoryEntry {
        repository: repository.trim().to_string(),
        path: path.trim().to_string(),
        flags,
    })
}
