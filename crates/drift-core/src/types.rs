use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Flags key that pins the package manager for one repository line.
pub const FLAG_PACKAGE_MANAGER: &str = "packageManager";

/// One non-comment line of the repository list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    /// Raw repository URL, before `$VAR` substitution.
    pub repository: String,
    /// Sub-path inside the repository; empty for the repository root.
    pub path: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub flags: serde_json::Map<String, serde_json::Value>,
}

impl RepositoryEntry {
    pub fn new(repository: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            path: path.into(),
            flags: serde_json::Map::new(),
        }
    }

    /// `repository#path`, the key used for file names and the index.
    pub fn identifier(&self) -> String {
        format!("{}#{}", self.repository, self.path)
    }

    pub fn safe_name(&self) -> String {
        crate::safe_name(&self.identifier())
    }

    /// Package manager pinned through the `packageManager` flag, if any.
    /// The parser validates the value, so an unknown name reads as unset here.
    pub fn pinned_manager(&self) -> Option<PackageManager> {
        self.flags
            .get(FLAG_PACKAGE_MANAGER)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }
}

/// Package managers the tracker knows how to drive.
///
/// `Berry` is yarn 2+; it is never detected from lockfiles directly, only
/// produced by normalizing `Yarn` through a version probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Yarn,
    Berry,
    Pnpm,
}

impl PackageManager {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Yarn => "yarn",
            PackageManager::Berry => "berry",
            PackageManager::Pnpm => "pnpm",
        }
    }

    /// Shell command that installs dependencies with lifecycle scripts disabled.
    pub fn install_command(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm install --ignore-scripts",
            PackageManager::Yarn => "yarn install --ignore-scripts",
            PackageManager::Berry => "yarn config set enableScripts false && yarn install",
            PackageManager::Pnpm => "pnpm install --ignore-scripts",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageManager {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "npm" => Ok(PackageManager::Npm),
            "yarn" => Ok(PackageManager::Yarn),
            "berry" => Ok(PackageManager::Berry),
            "pnpm" => Ok(PackageManager::Pnpm),
            other => Err(format!(
                "unknown package manager \"{other}\" (expected npm, yarn, berry or pnpm)"
            )),
        }
    }
}

/// Staleness figures for one dependency, as reported by libyear.
///
/// The report object is kept whole: absent fields stay absent and explicit
/// nulls stay null when the snapshot is written back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyResult(pub serde_json::Map<String, serde_json::Value>);

impl DependencyResult {
    pub fn new(dependency: impl Into<String>, drift: Option<f64>, pulse: Option<f64>) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("dependency".into(), serde_json::Value::String(dependency.into()));
        if let Some(drift) = drift {
            fields.insert("drift".into(), drift.into());
        }
        if let Some(pulse) = pulse {
            fields.insert("pulse".into(), pulse.into());
        }
        Self(fields)
    }

    pub fn dependency(&self) -> Option<&str> {
        self.0.get("dependency").and_then(|v| v.as_str())
    }

    /// `None` when absent, null or not a number.
    pub fn drift(&self) -> Option<f64> {
        self.0.get("drift").and_then(|v| v.as_f64())
    }

    pub fn pulse(&self) -> Option<f64> {
        self.0.get("pulse").and_then(|v| v.as_f64())
    }

    /// Any other report field (releases, major, available, ...).
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }
}

/// Aggregated drift and pulse of one repository entry for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub drift: f64,
    pub pulse: f64,
    #[serde(with = "js_date")]
    pub date: OffsetDateTime,
}

/// Timestamps as the dashboard reads them: UTC with millisecond precision,
/// e.g. `2023-07-27T07:10:44.745Z`. Parsing accepts any RFC 3339 timestamp.
pub mod js_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::format_description::well_known::Rfc3339;
    use time::macros::format_description;
    use time::{OffsetDateTime, UtcOffset};

    pub fn format(ts: OffsetDateTime) -> String {
        ts.to_offset(UtcOffset::UTC)
            .format(format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
            ))
            .unwrap_or_default()
    }

    pub fn parse(s: &str) -> Result<OffsetDateTime, time::error::Parse> {
        OffsetDateTime::parse(s, &Rfc3339)
    }

    pub fn serialize<S: Serializer>(ts: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}
