use serde::{Deserialize, Serialize};
use std::fmt;

use crate::application::errors::RegistryError;

/// Access level, ordered from least to most privileged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    #[serde(alias = "PUBLIC", alias = "user", alias = "USER")]
    Public,
    #[serde(alias = "SUPPORT")]
    Support,
    #[serde(alias = "ADMIN")]
    Admin,
    #[serde(alias = "OWNER")]
    Owner,
}

impl Permission {
    pub fn as_str(&self) -> &str {
        match self {
            Permission::Public => "public",
            Permission::Support => "support",
            Permission::Admin => "admin",
            Permission::Owner => "owner",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Declared identity and metadata of a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub usage: Option<String>,
    #[serde(default)]
    pub permission: Permission,
    #[serde(default)]
    pub cooldown: u64,
    #[serde(default)]
    pub category: Option<String>,
}

impl CommandConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: None,
            usage: None,
            permission: Permission::Public,
            cooldown: 0,
            category: None,
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    pub fn with_cooldown(mut self, seconds: u64) -> Self {
        self.cooldown = seconds;
        self
    }

    /// True if `input` is this command's name or one of its aliases
    pub fn answers_to(&self, input: &str) -> bool {
        self.name == input || self.aliases.iter().any(|a| a == input)
    }
}

/// Identifier of a command source unit: the file stem in the commands directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub const EXTENSION: &'static str = "yaml";

    /// Accepts `name`, `name.yaml` or `name.yml`; rejects anything path-like.
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let trimmed = raw.trim();
        let stem = trimmed
            .strip_suffix(".yaml")
            .or_else(|| trimmed.strip_suffix(".yml"))
            .unwrap_or(trimmed);

        let valid = !stem.is_empty()
            && !stem.starts_with('.')
            && stem
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.');
        if !valid || stem.contains("..") {
            return Err(RegistryError::InvalidUnit(raw.to_string()));
        }
        Ok(Self(stem.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, Self::EXTENSION)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_order() {
        assert!(Permission::Owner > Permission::Admin);
        assert!(Permission::Admin > Permission::Support);
        assert!(Permission::Support > Permission::Public);
    }

    #[test]
    fn test_permission_accepts_legacy_spelling() {
        let p: Permission = serde_yaml::from_str("ADMIN").unwrap();
        assert_eq!(p, Permission::Admin);
    }

    #[test]
    fn test_unit_id_parse() {
        assert_eq!(UnitId::parse("admin").unwrap().as_str(), "admin");
        assert_eq!(UnitId::parse("admin.yaml").unwrap().as_str(), "admin");
        assert_eq!(UnitId::parse("poll.yml").unwrap().file_name(), "poll.yaml");
        assert!(UnitId::parse("../config").is_err());
        assert!(UnitId::parse("a/b").is_err());
        assert!(UnitId::parse("").is_err());
    }

    #[test]
    fn test_answers_to_alias() {
        let config = CommandConfig::new("admin").with_aliases(["a", "system"]);
        assert!(config.answers_to("system"));
        assert!(!config.answers_to("Admin"));
    }
}
