//! Remote update manifest
//!
//! The host serves `update.json` plus every file it lists under one base URL.
//! The manifest is either `{"versions": [entry...]}` or a single entry
//! `{"version", "files", "changelog"}`; entries without a version string or a
//! file list are ignored.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

use crate::application::errors::BotError;

pub const MANIFEST_FILE: &str = "update.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Changelog {
    Lines(Vec<String>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VersionEntry {
    pub version: String,
    pub files: Vec<String>,
    #[serde(default)]
    pub changelog: Option<Changelog>,
}

impl VersionEntry {
    fn changelog_line(&self) -> String {
        match &self.changelog {
            Some(Changelog::Lines(lines)) => format!("📌 v{}:\n{}", self.version, lines.join("\n")),
            Some(Changelog::Text(text)) if !text.is_empty() => format!("• v{}: {}", self.version, text),
            _ => format!("• v{}: No changelog provided.", self.version),
        }
    }
}

pub struct UpdateManifest;

impl UpdateManifest {
    /// Valid entries, newest first
    pub fn normalize(raw: &Value) -> Vec<VersionEntry> {
        let candidates: Vec<&Value> = match raw.get("versions").and_then(Value::as_array) {
            Some(versions) => versions.iter().collect(),
            None => vec![raw],
        };
        let mut entries: Vec<VersionEntry> = candidates
            .into_iter()
            .filter_map(|v| serde_json::from_value::<VersionEntry>(v.clone()).ok())
            .filter(|e| !e.version.trim().is_empty())
            .collect();
        entries.sort_by(|a, b| compare_versions(&b.version, &a.version));
        entries
    }
}

/// `major.minor.patch`; missing or non-numeric segments count as 0
pub fn parse_version(version: &str) -> (u64, u64, u64) {
    let mut parts = version
        .trim()
        .trim_start_matches(['v', 'V'])
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u64>().unwrap_or(0)
        });
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

pub fn compare_versions(a: &str, b: &str) -> Ordering {
    parse_version(a).cmp(&parse_version(b))
}

/// Where the version being compared against came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Baseline {
    Local,
    Repo,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpdatePlan {
    pub target_version: String,
    pub files: Vec<String>,
    pub changelog_lines: Vec<String>,
    pub baseline_version: String,
    pub baseline: Baseline,
}

impl UpdatePlan {
    /// Everything newer than `baseline_version`, oldest first, plus the
    /// local version file. `None` when already up to date.
    pub fn build(
        entries: &[VersionEntry],
        baseline_version: &str,
        baseline: Baseline,
        version_file: &str,
    ) -> Option<Self> {
        let mut newer: Vec<&VersionEntry> = entries
            .iter()
            .filter(|e| compare_versions(&e.version, baseline_version) == Ordering::Greater)
            .collect();
        if newer.is_empty() {
            return None;
        }
        newer.sort_by(|a, b| compare_versions(&a.version, &b.version));

        let mut files: Vec<String> = Vec::new();
        for file in newer.iter().flat_map(|e| e.files.iter()) {
            if !files.contains(file) {
                files.push(file.clone());
            }
        }
        if !files.iter().any(|f| f == version_file) {
            files.push(version_file.to_string());
        }

        Some(Self {
            target_version: newer.last()?.version.clone(),
            files,
            changelog_lines: newer.iter().map(|e| e.changelog_line()).collect(),
            baseline_version: baseline_version.to_string(),
            baseline,
        })
    }
}

/// Resolve a manifest path under `root`, refusing absolute paths and `..`
pub fn resolve_under(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative.trim());
    if relative.as_os_str().is_empty() {
        return None;
    }
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    safe.then(|| root.join(relative))
}

/// Version recorded in the local version file (`{"version": "x.y.z", ...}`)
pub fn read_local_version(path: &Path) -> Result<String, BotError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| BotError::NotFound(format!("{}: {}", path.display(), e)))?;
    let value: Value = serde_json::from_str(&content).map_err(|e| BotError::Parse(e.to_string()))?;
    Ok(value
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("0.0.0")
        .to_string())
}

/// Set the version, keeping any other keys in the file
pub fn write_local_version(path: &Path, version: &str) -> Result<(), BotError> {
    let mut value: Value = std::fs::read_to_string(path)
        .ok()
        .and_then(|c| serde_json::from_str(&c).ok())
        .filter(Value::is_object)
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    value["version"] = Value::String(version.to_string());
    let json = serde_json::to_string_pretty(&value).map_err(|e| BotError::Parse(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| BotError::Internal(e.to_string()))
}

pub struct UpdateClient {
    client: Client,
    base_url: String,
}

impl UpdateClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { client, base_url }
    }

    fn url(&self, relative: &str) -> String {
        format!("{}{}", self.base_url, relative.trim_start_matches('/'))
    }

    pub async fn fetch_manifest(&self) -> Result<Vec<VersionEntry>, BotError> {
        let response = self.client
            .get(self.url(MANIFEST_FILE))
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BotError::Network(format!("Manifest fetch error: {}", response.status())));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| BotError::Parse(e.to_string()))?;
        Ok(UpdateManifest::normalize(&raw))
    }

    pub async fn download(&self, relative: &str) -> Result<Vec<u8>, BotError> {
        let response = self.client
            .get(self.url(relative))
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BotError::Network(format!("{}: {}", relative, response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_version_lenient() {
        assert_eq!(parse_version("1.2.3"), (1, 2, 3));
        assert_eq!(parse_version("v2.0"), (2, 0, 0));
        assert_eq!(parse_version("1.x.7"), (1, 0, 7));
        assert_eq!(parse_version("3.1.4-beta"), (3, 1, 4));
        assert_eq!(compare_versions("1.10.0", "1.9.9"), Ordering::Greater);
    }

    #[test]
    fn test_normalize_both_shapes() {
        let many = json!({"versions": [
            {"version": "1.0.1", "files": ["a.yaml"]},
            {"version": "1.1.0", "files": ["b.yaml"], "changelog": ["x", "y"]},
            {"version": "1.2.0"},
            {"files": ["c.yaml"]}
        ]});
        let entries = UpdateManifest::normalize(&many);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].version, "1.1.0");

        let single = json!({"version": "2.0.0", "files": [], "changelog": "big"});
        assert_eq!(UpdateManifest::normalize(&single).len(), 1);
        assert!(UpdateManifest::normalize(&json!({"nothing": true})).is_empty());
    }

    #[test]
    fn test_plan_collects_newer_files_in_order() {
        let entries = UpdateManifest::normalize(&json!({"versions": [
            {"version": "1.0.0", "files": ["old.yaml"]},
            {"version": "1.2.0", "files": ["b.yaml", "a.yaml"], "changelog": "second"},
            {"version": "1.1.0", "files": ["a.yaml"], "changelog": ["first"]}
        ]}));

        let plan = UpdatePlan::build(&entries, "1.0.0", Baseline::Local, "version.json").unwrap();
        assert_eq!(plan.target_version, "1.2.0");
        assert_eq!(plan.files, vec!["a.yaml", "b.yaml", "version.json"]);
        assert_eq!(plan.changelog_lines[0], "📌 v1.1.0:\nfirst");
        assert_eq!(plan.changelog_lines[1], "• v1.2.0: second");

        assert!(UpdatePlan::build(&entries, "1.2.0", Baseline::Local, "version.json").is_none());
    }

    #[test]
    fn test_resolve_under_rejects_escape() {
        let root = Path::new("/srv/bot");
        assert_eq!(
            resolve_under(root, "commands/help.yaml"),
            Some(PathBuf::from("/srv/bot/commands/help.yaml"))
        );
        assert!(resolve_under(root, "../etc/passwd").is_none());
        assert!(resolve_under(root, "/etc/passwd").is_none());
        assert!(resolve_under(root, "").is_none());
    }

    #[test]
    fn test_version_file_roundtrip_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version.json");
        std::fs::write(&path, r#"{"version": "1.0.0", "name": "bot"}"#).unwrap();

        write_local_version(&path, "1.2.0").unwrap();
        assert_eq!(read_local_version(&path).unwrap(), "1.2.0");
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"name\""));
    }
}
