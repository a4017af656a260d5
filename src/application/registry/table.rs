//! The live dispatch table: command names and aliases

use std::collections::HashMap;
use std::sync::Arc;

use super::loader::CommandDescriptor;
use crate::application::errors::RegistryError;
use crate::domain::entities::UnitId;

/// Name -> descriptor, plus alias -> owning name.
///
/// Invariant: a key appears at most once across `commands` and `aliases`,
/// and every alias points at a live name.
#[derive(Default, Clone)]
pub struct CommandTable {
    commands: HashMap<String, Arc<CommandDescriptor>>,
    aliases: HashMap<String, String>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a name first, then an alias
    pub fn get(&self, input: &str) -> Option<Arc<CommandDescriptor>> {
        if let Some(desc) = self.commands.get(input) {
            return Some(Arc::clone(desc));
        }
        let owner = self.aliases.get(input)?;
        self.commands.get(owner).cloned()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Alias owner, if `alias` is a registered alias
    pub fn alias_owner(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// Name of the command currently loaded from `unit`
    pub fn name_for_unit(&self, unit: &UnitId) -> Option<String> {
        self.commands
            .values()
            .find(|d| &d.unit == unit)
            .map(|d| d.name().to_string())
    }

    /// A command name may not shadow another name or an alias.
    /// Entries owned by `exclude` are ignored.
    pub fn check_name(&self, name: &str, exclude: Option<&str>) -> Result<(), RegistryError> {
        if self.commands.contains_key(name) && exclude != Some(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        if let Some(owner) = self.aliases.get(name) {
            if exclude != Some(owner.as_str()) {
                return Err(RegistryError::NameTakenByAlias {
                    name: name.to_string(),
                    owner: owner.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn check_alias(&self, alias: &str, exclude: Option<&str>) -> Result<(), RegistryError> {
        if self.commands.contains_key(alias) && exclude != Some(alias) {
            return Err(RegistryError::AliasConflictsWithName(alias.to_string()));
        }
        if let Some(owner) = self.aliases.get(alias) {
            if exclude != Some(owner.as_str()) {
                return Err(RegistryError::DuplicateAlias {
                    alias: alias.to_string(),
                    owner: owner.clone(),
                });
            }
        }
        Ok(())
    }

    /// Insert a descriptor whose name already passed `check_name`.
    /// Colliding aliases are dropped and returned; the command stays.
    pub fn insert(&mut self, descriptor: Arc<CommandDescriptor>) -> Vec<RegistryError> {
        let name = descriptor.name().to_string();
        let mut dropped = Vec::new();
        self.commands.insert(name.clone(), Arc::clone(&descriptor));

        for alias in descriptor.aliases() {
            if alias == &name {
                continue;
            }
            match self.check_alias(alias, None) {
                Ok(()) => {
                    self.aliases.insert(alias.clone(), name.clone());
                }
                Err(e) => dropped.push(e),
            }
        }
        dropped
    }

    /// Remove a command under its name and every alias pointing to it
    pub fn evict(&mut self, name: &str) -> Option<Arc<CommandDescriptor>> {
        let removed = self.commands.remove(name)?;
        self.aliases.retain(|_, owner| owner != name);
        Some(removed)
    }

    /// Drop everything except `keep`
    pub fn retain_only(&mut self, keep: &str) {
        self.commands.retain(|name, _| name == keep);
        self.aliases.retain(|_, owner| owner == keep);
    }

    /// Live command names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn descriptors(&self) -> Vec<Arc<CommandDescriptor>> {
        let mut all: Vec<_> = self.commands.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::registry::loader::{compile, HandlerCatalog};

    fn descriptor(unit: &str, source: &str) -> Arc<CommandDescriptor> {
        let unit = UnitId::parse(unit).unwrap();
        Arc::new(compile(&unit, source, &HandlerCatalog::with_builtins()).unwrap())
    }

    #[test]
    fn test_colliding_alias_is_dropped_command_kept() {
        let mut table = CommandTable::new();
        table.insert(descriptor("a", "name: alpha\naliases: [x]\nreply: a"));

        let beta = descriptor("b", "name: beta\naliases: [x, alpha, y]\nreply: b");
        table.check_name("beta", None).unwrap();
        let dropped = table.insert(beta);

        assert_eq!(dropped.len(), 2);
        assert_eq!(table.get("x").unwrap().name(), "alpha");
        assert_eq!(table.get("y").unwrap().name(), "beta");
        assert_eq!(table.get("alpha").unwrap().name(), "alpha");
    }

    #[test]
    fn test_name_checks() {
        let mut table = CommandTable::new();
        table.insert(descriptor("a", "name: alpha\naliases: [x]\nreply: a"));

        assert_eq!(
            table.check_name("alpha", None),
            Err(RegistryError::DuplicateName("alpha".to_string()))
        );
        assert!(matches!(
            table.check_name("x", None),
            Err(RegistryError::NameTakenByAlias { .. })
        ));
        assert!(table.check_name("alpha", Some("alpha")).is_ok());
        assert!(table.check_name("x", Some("alpha")).is_ok());
    }

    #[test]
    fn test_evict_removes_aliases() {
        let mut table = CommandTable::new();
        table.insert(descriptor("a", "name: alpha\naliases: [x, z]\nreply: a"));
        assert_eq!(table.alias_count(), 2);

        table.evict("alpha").unwrap();
        assert!(table.get("x").is_none());
        assert!(table.is_empty());
        assert_eq!(table.alias_count(), 0);
    }
}
