//! Date backfill for history files written before entries carried a `date`.

use crate::write_atomic;
use anyhow::{Context, Result};
use drift_core::js_date;
use std::path::{Path, PathBuf};

/// A history file loaded for maintenance.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryFile {
    pub path: PathBuf,
    pub content: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub files_read: usize,
    pub files_updated: usize,
    pub dates_filled: usize,
    /// Files left untouched because they could not be read or backfilled.
    pub failures: Vec<(PathBuf, String)>,
}

impl BackfillReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

fn has_date(entry: &serde_json::Value) -> bool {
    match entry.get("date") {
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        _ => false,
    }
}

/// Walk from the newest entry backwards and give every undated entry the
/// date of its successor minus one calendar day, keeping the time of day.
///
/// An undated entry whose successor is also undated (or that has no
/// successor) is left as is. Returns the number of dates filled.
pub fn fill_missing_dates(history: &mut [serde_json::Value]) -> Result<usize> {
    let mut filled = 0;
    for i in (0..history.len()).rev() {
        if has_date(&history[i]) || i + 1 >= history.len() || !has_date(&history[i + 1]) {
            continue;
        }
        let next = history[i + 1]["date"].as_str().unwrap_or_default();
        let next_ts = js_date::parse(next).with_context(|| format!("entry {}: bad date {next:?}", i + 1))?;
        let day_before = next_ts
            .date()
            .previous_day()
            .with_context(|| format!("entry {}: no day before {next}", i + 1))?;
        let date = js_date::format(next_ts.replace_date(day_before));

        if let Some(obj) = history[i].as_object_mut() {
            obj.insert("date".into(), serde_json::Value::String(date));
            filled += 1;
        }
    }
    Ok(filled)
}

/// Paths of every `history*.json` file of a directory, sorted by file name.
pub fn history_file_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("history") && n.ends_with(".json"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Read one history file; its content must be a JSON array.
pub fn load_history_file(path: &Path) -> Result<HistoryFile> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let content = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {} as a history array", path.display()))?;
    Ok(HistoryFile {
        path: path.to_path_buf(),
        content,
    })
}

/// Backfill one history file in place. Returns the number of dates filled;
/// a file without gaps is not rewritten.
pub fn backfill_file(path: &Path) -> Result<usize> {
    let mut file = load_history_file(path)?;
    let filled = fill_missing_dates(&mut file.content)
        .with_context(|| format!("backfilling {}", path.display()))?;
    if filled > 0 {
        let data = serde_json::to_vec(&file.content)?;
        write_atomic(path, &data).with_context(|| format!("writing {}", path.display()))?;
        tracing::debug!(path = %path.display(), filled, "history file updated");
    }
    Ok(filled)
}

/// Backfill every history file of `dir`.
///
/// A file that cannot be backfilled is recorded in the report and left as
/// is; the other files are still processed.
pub fn fill_dates_in_dir(dir: &Path) -> Result<BackfillReport> {
    let paths = history_file_paths(dir)?;
    tracing::info!(count = paths.len(), dir = %dir.display(), "read history files");

    let mut report = BackfillReport {
        files_read: paths.len(),
        ..Default::default()
    };
    for path in paths {
        match backfill_file(&path) {
            Ok(0) => {}
            Ok(filled) => {
                report.files_updated += 1;
                report.dates_filled += filled;
            }
            Err(e) => {
                tracing::error!(path = %path.display(), "{e:#}");
                report.failures.push((path, format!("{e:#}")));
            }
        }
    }
    tracing::info!(
        updated = report.files_updated,
        dates = report.dates_filled,
        failed = report.failures.len(),
        "updated history files"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fill_history_dates() {
        let mut data = vec![json!({}), json!({}), json!({"date": "2023-07-27T07:10:44.745Z"})];
        let filled = fill_missing_dates(&mut data).unwrap();
        assert_eq!(filled, 2);
        assert_eq!(
            data,
            vec![
                json!({"date": "2023-07-25T07:10:44.745Z"}),
                json!({"date": "2023-07-26T07:10:44.745Z"}),
                json!({"date": "2023-07-27T07:10:44.745Z"}),
            ]
        );
    }

    #[test]
    fn fill_history_dates_between_two_months() {
        let mut data = vec![json!({}), json!({"date": "2023-07-01T07:10:44.745Z"})];
        fill_missing_dates(&mut data).unwrap();
        assert_eq!(data[0], json!({"date": "2023-06-30T07:10:44.745Z"}));
    }

    #[test]
    fn keeps_other_fields_and_existing_dates() {
        let mut data = vec![
            json!({"drift": 1.5, "pulse": 1.0}),
            json!({"drift": 1.6, "pulse": 1.1, "date": "2024-03-01T00:00:00.000Z"}),
            json!({"drift": 1.7, "pulse": 1.2, "date": "2024-03-09T12:00:00.000Z"}),
        ];
        fill_missing_dates(&mut data).unwrap();
        assert_eq!(
            data[0],
            json!({"drift": 1.5, "pulse": 1.0, "date": "2024-02-29T00:00:00.000Z"})
        );
        assert_eq!(data[2]["date"], "2024-03-09T12:00:00.000Z");
    }

    #[test]
    fn undated_tail_is_left_alone() {
        let mut data = vec![json!({"drift": 1}), json!({"drift": 2})];
        let filled = fill_missing_dates(&mut data).unwrap();
        assert_eq!(filled, 0);
        assert_eq!(data, vec![json!({"drift": 1}), json!({"drift": 2})]);
    }

    #[test]
    fn bad_successor_date_is_an_error() {
        let mut data = vec![json!({}), json!({"date": "yesterday"})];
        assert!(fill_missing_dates(&mut data).is_err());
    }

    #[test]
    fn lists_only_history_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("history-a.json"), r#"[{"drift":1}]"#).unwrap();
        std::fs::write(tmp.path().join("last-run-a.json"), "[]").unwrap();
        std::fs::write(tmp.path().join("index.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("history-b.txt"), "[]").unwrap();

        let paths = history_file_paths(tmp.path()).unwrap();
        assert_eq!(paths, vec![tmp.path().join("history-a.json")]);
        let file = load_history_file(&paths[0]).unwrap();
        assert_eq!(file.content, vec![json!({"drift": 1})]);
    }

    #[test]
    fn non_array_history_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("history-a.json");
        std::fs::write(&path, r#"{"drift":1}"#).unwrap();
        let err = load_history_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("history-a.json"));
    }

    #[test]
    fn bad_file_does_not_stop_the_others() {
        let tmp = tempfile::tempdir().unwrap();
        let bad = tmp.path().join("history-a.json");
        let broken = tmp.path().join("history-b.json");
        let good = tmp.path().join("history-c.json");
        std::fs::write(&bad, r#"[{},{"date":"yesterday"}]"#).unwrap();
        std::fs::write(&broken, r#"{"not":"an array"}"#).unwrap();
        std::fs::write(&good, r#"[{},{"date":"2023-07-27T07:10:44.745Z"}]"#).unwrap();

        let report = fill_dates_in_dir(tmp.path()).unwrap();
        assert!(!report.is_success());
        assert_eq!(report.files_read, 3);
        assert_eq!(report.files_updated, 1);
        let failed: Vec<&PathBuf> = report.failures.iter().map(|(p, _)| p).collect();
        assert_eq!(failed, vec![&bad, &broken]);
        assert!(report.failures[0].1.contains("history-a.json"));

        assert_eq!(
            std::fs::read_to_string(&bad).unwrap(),
            r#"[{},{"date":"yesterday"}]"#
        );
        let content: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&good).unwrap()).unwrap();
        assert_eq!(content[0]["date"], "2023-07-26T07:10:44.745Z");
    }

    #[test]
    fn fills_directory_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("history-a.json"),
            r#"[{"drift":1},{"drift":2,"date":"2023-07-27T07:10:37.371Z"}]"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("history-b.json"),
            r#"[{"drift":3,"date":"2023-07-27T07:10:37.371Z"}]"#,
        )
        .unwrap();

        let report = fill_dates_in_dir(tmp.path()).unwrap();
        assert_eq!(
            report,
            BackfillReport {
                files_read: 2,
                files_updated: 1,
                dates_filled: 1,
                failures: Vec::new(),
            }
        );
        let raw = std::fs::read_to_string(tmp.path().join("history-a.json")).unwrap();
        let content: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(content[0]["date"], "2023-07-26T07:10:37.371Z");
    }
}
