use anyhow::{Context, Result};
use drift_core::{find_collisions, parse_file, RepositoryEntry};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// Read and parse the repository list at `path`.
pub fn read_repository_list(path: &Path) -> Result<Vec<RepositoryEntry>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_file(&content).with_context(|| format!("parsing {}", path.display()))
}

#[derive(Debug, Serialize)]
pub struct ListedEntry<'a> {
    pub identifier: String,
    pub safe_name: String,
    pub repository: &'a str,
    pub path: &'a str,
    pub flags: &'a serde_json::Map<String, serde_json::Value>,
    /// Another identifier maps to the same file name.
    pub collides: bool,
}

pub fn list_entries(entries: &[RepositoryEntry]) -> Vec<ListedEntry<'_>> {
    let identifiers: Vec<String> = entries.iter().map(RepositoryEntry::identifier).collect();
    let colliding: HashSet<String> = find_collisions(identifiers.iter().map(String::as_str))
        .into_iter()
        .map(|(name, _)| name)
        .collect();

    entries
        .iter()
        .zip(identifiers)
        .map(|(entry, identifier)| {
            let safe_name = entry.safe_name();
            ListedEntry {
                collides: colliding.contains(&safe_name),
                identifier,
                safe_name,
                repository: &entry.repository,
                path: &entry.path,
                flags: &entry.flags,
            }
        })
        .collect()
}

/// Execute `drift-tracker list`
pub fn execute(list_path: &Path, json: bool) -> Result<()> {
    let entries = read_repository_list(list_path)?;
    let listed = list_entries(&entries);

    if json {
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }

    if listed.is_empty() {
        println!("No repositories in {}", list_path.display());
        return Ok(());
    }
    for entry in &listed {
        let marker = if entry.collides { "  (collision)" } else { "" };
        println!("{}\n    history-{}.json{marker}", entry.identifier, entry.safe_name);
    }
    Ok(())
}
