//! Unit loader - compiles a command source unit into a descriptor
//!
//! A unit is a YAML manifest. Compiling never touches the live table, so a
//! unit can be checked in isolation before it replaces anything.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::application::commands::{self, TemplateHandler};
use crate::application::errors::RegistryError;
use crate::application::handler::CommandHandler;
use crate::domain::entities::{CommandConfig, Permission, UnitId};

/// On-disk shape of a command unit
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UnitManifest {
    pub name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub description: Option<String>,
    pub usage: Option<String>,
    #[serde(default)]
    pub permission: Permission,
    #[serde(default)]
    pub cooldown: u64,
    pub category: Option<String>,
    /// Builtin handler kind
    pub handler: Option<String>,
    /// Canned reply template
    pub reply: Option<String>,
}

impl UnitManifest {
    pub fn parse(unit: &UnitId, source: &str) -> Result<Self, RegistryError> {
        serde_yaml::from_str(source).map_err(|e| RegistryError::Syntax {
            unit: unit.to_string(),
            message: e.to_string(),
        })
    }
}

/// What a command runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Builtin(String),
    Reply(String),
}

/// A compiled command, ready to be placed in the table
pub struct CommandDescriptor {
    pub unit: UnitId,
    pub config: CommandConfig,
    pub binding: Binding,
    handler: Arc<dyn CommandHandler>,
}

impl CommandDescriptor {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.config.aliases
    }

    pub fn handler(&self) -> &Arc<dyn CommandHandler> {
        &self.handler
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("unit", &self.unit)
            .field("config", &self.config)
            .field("binding", &self.binding)
            .finish()
    }
}

/// Builtin handler kinds a unit may bind to
#[derive(Clone, Default)]
pub struct HandlerCatalog {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every handler shipped with the bot
    pub fn with_builtins() -> Self {
        commands::builtin_handlers()
            .into_iter()
            .fold(Self::new(), |catalog, (kind, handler)| catalog.with(kind, handler))
    }

    pub fn with(mut self, kind: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        self.handlers.insert(kind.into(), handler);
        self
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(kind).cloned()
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

/// Parse and bind a unit
pub fn compile(
    unit: &UnitId,
    source: &str,
    catalog: &HandlerCatalog,
) -> Result<CommandDescriptor, RegistryError> {
    let manifest = UnitManifest::parse(unit, source)?;
    let malformed = |message: String| RegistryError::Malformed {
        unit: unit.to_string(),
        message,
    };

    let name = manifest
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| malformed("missing required 'name'".to_string()))?
        .to_string();
    if name.chars().any(char::is_whitespace) {
        return Err(malformed(format!("command name '{}' contains whitespace", name)));
    }

    let (binding, handler): (Binding, Arc<dyn CommandHandler>) =
        match (manifest.handler, manifest.reply) {
            (Some(kind), None) => {
                let handler = catalog
                    .get(&kind)
                    .ok_or_else(|| malformed(format!("unknown handler kind '{}'", kind)))?;
                (Binding::Builtin(kind), handler)
            }
            (None, Some(template)) => (
                Binding::Reply(template.clone()),
                Arc::new(TemplateHandler::new(template)),
            ),
            (Some(_), Some(_)) => {
                return Err(malformed("'handler' and 'reply' are mutually exclusive".to_string()))
            }
            (None, None) => {
                return Err(malformed("either 'handler' or 'reply' is required".to_string()))
            }
        };

    let mut aliases: Vec<String> = Vec::new();
    for alias in manifest.aliases {
        let alias = alias.trim().to_string();
        if !alias.is_empty() && !aliases.contains(&alias) {
            aliases.push(alias);
        }
    }

    let config = CommandConfig {
        name,
        aliases,
        description: manifest.description,
        usage: manifest.usage,
        permission: manifest.permission,
        cooldown: manifest.cooldown,
        category: manifest.category,
    };

    Ok(CommandDescriptor {
        unit: unit.clone(),
        config,
        binding,
        handler,
    })
}
