//! Configuration management
//!
//! The bot's configuration is one JSON file that commands also rewrite at
//! runtime (ban lists, disabled commands, access modes). Every mutation goes
//! through [`ConfigHandle::update`]: clone, modify, write the whole file, and
//! only then publish the new value in memory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use crate::application::errors::ConfigError;
use crate::domain::entities::{Permission, UserId};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_UNSEND_REACTION: &str = "🖤";

/// Bot configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(rename = "ownerID", default)]
    pub owner_id: UserId,
    #[serde(rename = "adminIDs", default)]
    pub admin_ids: Vec<UserId>,
    #[serde(rename = "supportIDs", default)]
    pub support_ids: Vec<UserId>,
    #[serde(default)]
    pub disabled_commands: Vec<String>,
    #[serde(default)]
    pub admin_only_mode: AdminOnlyMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsend_reaction: Option<String>,
    #[serde(default = "default_true")]
    pub command_enabled: bool,
    #[serde(default = "default_commands_dir")]
    pub commands_dir: PathBuf,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub pastebin: PastebinConfig,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubConfig>,
    #[serde(default = "default_ttl")]
    pub interaction_ttl_secs: u64,
    /// Keys this version does not know about survive a rewrite
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AdminOnlyMode {
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub mode: Permission,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Sqlite,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Sqlite,
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PastebinConfig {
    #[serde(default)]
    pub dev_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfig {
    /// Raw file root that serves `update.json` and the listed files
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_version_file")]
    pub version_file: PathBuf,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            version_file: default_version_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GithubConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl GithubConfig {
    /// The placeholder token shipped in sample configs counts as absent
    pub fn usable_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty() && *t != "YOUR_GITHUB_TOKEN")
    }
}

fn default_prefix() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_commands_dir() -> PathBuf {
    PathBuf::from("commands")
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/bot.db")
}

fn default_version_file() -> PathBuf {
    PathBuf::from("version.json")
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_ttl() -> u64 {
    30 * 60
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            owner_id: UserId::default(),
            admin_ids: Vec::new(),
            support_ids: Vec::new(),
            disabled_commands: Vec::new(),
            admin_only_mode: AdminOnlyMode::default(),
            unsend_reaction: None,
            command_enabled: true,
            commands_dir: default_commands_dir(),
            store: StoreConfig::default(),
            telegram: None,
            pastebin: PastebinConfig::default(),
            update: UpdateConfig::default(),
            github: None,
            interaction_ttl_secs: default_ttl(),
            extra: serde_json::Map::new(),
        }
    }
}

impl BotConfig {
    /// Load from a JSON file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    /// Apply `BOT_TOKEN`, `BOT_PREFIX` and `BOT_OWNER_ID`
    pub fn apply_env(mut self) -> Self {
        if let Ok(token) = std::env::var("BOT_TOKEN") {
            self.telegram.get_or_insert_with(TelegramConfig::default).token = Some(token);
        }

        if let Ok(prefix) = std::env::var("BOT_PREFIX") {
            if !prefix.is_empty() {
                self.prefix = prefix;
            }
        }

        if let Ok(owner) = std::env::var("BOT_OWNER_ID") {
            self.owner_id = UserId::new(owner);
        }

        self
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = self.to_pretty_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
        }
        std::fs::write(path, json).map_err(|e| ConfigError::Write(e.to_string()))
    }

    pub fn to_pretty_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Write(e.to_string()))
    }

    pub fn is_owner(&self, user_id: &UserId) -> bool {
        !self.owner_id.is_empty() && &self.owner_id == user_id
    }

    pub fn is_admin(&self, user_id: &UserId) -> bool {
        self.admin_ids.contains(user_id)
    }

    pub fn is_support(&self, user_id: &UserId) -> bool {
        self.support_ids.contains(user_id)
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled_commands.iter().any(|d| d == name)
    }

    pub fn unsend_reaction(&self) -> &str {
        self.unsend_reaction.as_deref().unwrap_or(DEFAULT_UNSEND_REACTION)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue("prefix must not be empty".to_string()));
        }
        if self.interaction_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "interactionTtlSecs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shared, file-backed configuration
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<BotConfig>>,
    path: Option<PathBuf>,
}

impl ConfigHandle {
    /// A handle that writes every update back to `path`
    pub fn new(config: BotConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: Some(path.into()),
        }
    }

    /// A handle that only keeps changes in memory
    pub fn in_memory(config: BotConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Snapshot of the current configuration
    pub fn get(&self) -> BotConfig {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Read one value without cloning the whole config
    pub fn read<R>(&self, f: impl FnOnce(&BotConfig) -> R) -> R {
        f(&self.inner.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Read-modify-write of the whole file; memory changes only if the write succeeds
    pub fn update<R>(&self, f: impl FnOnce(&mut BotConfig) -> R) -> Result<R, ConfigError> {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let mut next = guard.clone();
        let result = f(&mut next);
        if let Some(path) = &self.path {
            next.save(path)?;
        }
        *guard = next;
        Ok(result)
    }

    /// Re-read the file, e.g. after someone edited it by hand
    pub fn reload(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            let fresh = BotConfig::load(path)?;
            *self.inner.write().unwrap_or_else(|e| e.into_inner()) = fresh;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: BotConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.prefix, "/");
        assert!(config.command_enabled);
        assert_eq!(config.interaction_ttl_secs, 1800);
        assert_eq!(config.unsend_reaction(), "🖤");
        assert_eq!(config.store.kind, StoreKind::Sqlite);
    }

    #[test]
    fn test_platform_keys() {
        let json = r#"{
            "prefix": "!",
            "ownerID": 1000,
            "adminIDs": ["2000", 3000],
            "disabledCommands": ["poll"],
            "adminOnlyMode": {"global": true, "mode": "admin"},
            "customKey": {"keep": true}
        }"#;
        let config: BotConfig = serde_json::from_str(json).unwrap();
        assert!(config.is_owner(&UserId::new("1000")));
        assert!(config.is_admin(&UserId::new("3000")));
        assert!(config.is_disabled("poll"));
        assert_eq!(config.admin_only_mode.mode, Permission::Admin);

        let out = config.to_pretty_json().unwrap();
        assert!(out.contains("customKey"));
        assert!(out.contains("\"ownerID\""));
    }

    #[test]
    fn test_update_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let handle = ConfigHandle::new(BotConfig::default(), &path);

        handle
            .update(|c| c.disabled_commands.push("help".to_string()))
            .unwrap();

        assert!(handle.read(|c| c.is_disabled("help")));
        let on_disk = BotConfig::load(&path).unwrap();
        assert_eq!(on_disk.disabled_commands, vec!["help".to_string()]);
    }

    #[test]
    fn test_failed_write_keeps_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the write fail
        let path = dir.path().join("config.json");
        std::fs::create_dir(&path).unwrap();
        let handle = ConfigHandle::new(BotConfig::default(), &path);

        assert!(handle.update(|c| c.prefix = "!".to_string()).is_err());
        assert_eq!(handle.read(|c| c.prefix.clone()), "/");
    }

    #[test]
    fn test_github_placeholder_token() {
        let github = GithubConfig {
            owner: "o".to_string(),
            repo: "r".to_string(),
            token: Some("YOUR_GITHUB_TOKEN".to_string()),
            branch: default_branch(),
        };
        assert!(github.usable_token().is_none());
    }
}
