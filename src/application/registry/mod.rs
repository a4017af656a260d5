//! Command registry - the single source of truth for what command a name runs
//!
//! Units are compiled in isolation and only then applied to the live table,
//! so a failed reload never leaves a command missing.

pub mod loader;
pub mod table;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::application::errors::RegistryError;
use crate::domain::entities::{UnitId, UserId};
use crate::domain::traits::UnitStore;
use crate::infrastructure::config::ConfigHandle;

pub use loader::{compile, Binding, CommandDescriptor, HandlerCatalog, UnitManifest};
pub use table::CommandTable;

/// Always-on command exempt from disabling
pub const PROTECTED_COMMAND: &str = "cmd";

/// Result of checking a unit against the live table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub command_name: Option<String>,
    pub error: Option<String>,
}

impl Validation {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of loading every unit from scratch
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub aliases: usize,
    pub skipped_disabled: Vec<String>,
    pub failures: Vec<(UnitId, RegistryError)>,
}

fn is_all(token: &str) -> bool {
    token.trim().eq_ignore_ascii_case("all")
}

pub struct CommandRegistry {
    units: Arc<dyn UnitStore>,
    catalog: HandlerCatalog,
    config: ConfigHandle,
    table: RwLock<CommandTable>,
}

impl CommandRegistry {
    pub fn new(units: Arc<dyn UnitStore>, catalog: HandlerCatalog, config: ConfigHandle) -> Self {
        Self {
            units,
            catalog,
            config,
            table: RwLock::new(CommandTable::new()),
        }
    }

    fn read_table(&self) -> RwLockReadGuard<'_, CommandTable> {
        self.table.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_table(&self) -> RwLockWriteGuard<'_, CommandTable> {
        self.table.write().unwrap_or_else(|e| e.into_inner())
    }

    // Lookups

    pub fn get(&self, name_or_alias: &str) -> Option<Arc<CommandDescriptor>> {
        self.read_table().get(name_or_alias)
    }

    pub fn names(&self) -> Vec<String> {
        self.read_table().names()
    }

    pub fn descriptors(&self) -> Vec<Arc<CommandDescriptor>> {
        self.read_table().descriptors()
    }

    pub fn len(&self) -> usize {
        self.read_table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_table().is_empty()
    }

    pub fn alias_count(&self) -> usize {
        self.read_table().alias_count()
    }

    pub fn snapshot(&self) -> CommandTable {
        self.read_table().clone()
    }

    pub fn compile(&self, unit: &UnitId, source: &str) -> Result<CommandDescriptor, RegistryError> {
        compile(unit, source, &self.catalog)
    }

    // Loading

    /// Compile every unit into a fresh table and swap it in.
    /// First loaded wins on name collisions; colliding aliases are dropped.
    pub async fn load_all(&self) -> Result<LoadReport, RegistryError> {
        let ids = self.units.list().await?;
        tracing::info!("Found {} command units", ids.len());

        let disabled = self.config.read(|c| c.disabled_commands.clone());
        let mut fresh = CommandTable::new();
        let mut report = LoadReport::default();

        for id in ids {
            let source = match self.units.read(&id).await {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("Failed to read unit {}: {}", id, e);
                    report.failures.push((id, e));
                    continue;
                }
            };
            let descriptor = match self.compile(&id, &source) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Command unit {} not loaded: {}", id, e);
                    report.failures.push((id, e));
                    continue;
                }
            };
            if disabled.iter().any(|d| d == descriptor.name()) {
                tracing::warn!("Skipping disabled command: {}", descriptor.name());
                report.skipped_disabled.push(descriptor.name().to_string());
                continue;
            }
            if let Err(e) = fresh.check_name(descriptor.name(), None) {
                tracing::error!("{} in {}. Command not loaded.", e, id);
                report.failures.push((id, e));
                continue;
            }
            let name = descriptor.name().to_string();
            for dropped in fresh.insert(Arc::new(descriptor)) {
                tracing::error!("{} (in command {}). Alias not loaded.", dropped, name);
            }
            report.loaded += 1;
        }

        report.aliases = fresh.alias_count();
        tracing::info!(
            "Successfully loaded {} commands with {} aliases",
            report.loaded,
            report.aliases
        );
        *self.write_table() = fresh;
        Ok(report)
    }

    /// Load a single unit into the live table without replacing anything
    pub async fn load(&self, unit: &UnitId) -> Result<String, RegistryError> {
        let source = self.units.read(unit).await?;
        let descriptor = self.compile(unit, &source)?;
        let name = descriptor.name().to_string();
        if self.config.read(|c| c.is_disabled(&name)) {
            tracing::warn!("Skipping disabled command: {}", name);
            return Ok(name);
        }

        let mut table = self.write_table();
        table.check_name(&name, None)?;
        for dropped in table.insert(Arc::new(descriptor)) {
            tracing::error!("{} (in command {}). Alias not loaded.", dropped, name);
        }
        tracing::debug!("Loaded command {} from {}", name, unit);
        Ok(name)
    }

    /// Check a unit against the live table without mutating it.
    /// Entries registered under `exclude` are ignored.
    pub fn validate(&self, unit: &UnitId, source: &str, exclude: Option<&str>) -> Validation {
        match self.check_source(unit, source, exclude) {
            Ok(name) => Validation {
                command_name: Some(name),
                error: None,
            },
            Err((name, e)) => Validation {
                command_name: name,
                error: Some(e.to_string()),
            },
        }
    }

    fn check_source(
        &self,
        unit: &UnitId,
        source: &str,
        exclude: Option<&str>,
    ) -> Result<String, (Option<String>, RegistryError)> {
        let descriptor = self.compile(unit, source).map_err(|e| (None, e))?;
        let name = descriptor.name().to_string();
        let table = self.read_table();
        table
            .check_name(&name, exclude)
            .map_err(|e| (Some(name.clone()), e))?;
        for alias in descriptor.aliases() {
            if alias == &name {
                continue;
            }
            table
                .check_alias(alias, exclude)
                .map_err(|e| (Some(name.clone()), e))?;
        }
        Ok(name)
    }

    // Reloading

    pub async fn reload(&self, name: &str) -> bool {
        match self.try_reload(name).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("Failed to reload command {}: {}", name, e);
                false
            }
        }
    }

    /// Reload by command name, alias or unit id; "all" reloads everything
    pub async fn try_reload(&self, name: &str) -> Result<String, RegistryError> {
        if is_all(name) {
            let report = self.load_all().await?;
            return Ok(format!("{} commands", report.loaded));
        }
        let unit = self.locate_unit(name).await?;
        self.reload_unit(&unit).await
    }

    pub async fn reload_all(&self) -> bool {
        match self.load_all().await {
            Ok(report) => report.loaded > 0,
            Err(e) => {
                tracing::error!("Failed to reload all commands: {}", e);
                false
            }
        }
    }

    /// Find the unit a name refers to: live name or alias, unit id, or the
    /// name/aliases declared in any unit on disk.
    pub async fn locate_unit(&self, name: &str) -> Result<UnitId, RegistryError> {
        let name = name.trim();
        if let Some(desc) = self.get(name) {
            return Ok(desc.unit.clone());
        }
        if let Ok(id) = UnitId::parse(name) {
            if self.units.exists(&id).await? {
                return Ok(id);
            }
        }
        for id in self.units.list().await? {
            let Ok(source) = self.units.read(&id).await else {
                continue;
            };
            if let Ok(manifest) = UnitManifest::parse(&id, &source) {
                let declared = manifest.name.as_deref().map(str::trim) == Some(name);
                if declared || manifest.aliases.iter().any(|a| a.trim() == name) {
                    return Ok(id);
                }
            }
        }
        Err(RegistryError::CommandNotFound(name.to_string()))
    }

    /// Recompile `unit` and swap it in atomically. On a name collision the
    /// previously loaded version stays live.
    pub async fn reload_unit(&self, unit: &UnitId) -> Result<String, RegistryError> {
        let source = self.units.read(unit).await?;
        let descriptor = self.compile(unit, &source)?;
        let name = descriptor.name().to_string();
        let was_disabled = self.config.read(|c| c.is_disabled(&name));

        {
            let mut table = self.write_table();
            let previous = table.name_for_unit(unit);
            table.check_name(&name, previous.as_deref())?;
            if let Some(previous) = &previous {
                table.evict(previous);
            }
            let declared = descriptor.aliases().len();
            let dropped = table.insert(Arc::new(descriptor));
            for e in &dropped {
                tracing::error!("{} (in command {}). Alias not loaded.", e, name);
            }
            tracing::info!(
                "Reloaded command: {} with {} aliases",
                name,
                declared.saturating_sub(dropped.len())
            );
        }

        if was_disabled {
            tracing::warn!("Command {} was disabled, enabling it", name);
            self.config
                .update(|c| c.disabled_commands.retain(|d| d != &name))?;
        }
        Ok(name)
    }

    // Disable / enable

    pub async fn disable(&self, name: &str) -> bool {
        match self.try_disable(name) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to disable command {}: {}", name, e);
                false
            }
        }
    }

    /// Disable one command, or every command except the protected one with "all".
    /// Returns how many commands were disabled.
    pub fn try_disable(&self, name: &str) -> Result<usize, RegistryError> {
        if is_all(name) {
            return match self.try_disable_all()? {
                0 => Err(RegistryError::AlreadyDisabled("all".to_string())),
                n => Ok(n),
            };
        }
        let desc = self
            .get(name)
            .ok_or_else(|| RegistryError::CommandNotFound(name.to_string()))?;
        let actual = desc.name().to_string();
        if actual == PROTECTED_COMMAND {
            return Err(RegistryError::Protected(actual));
        }
        if self.config.read(|c| c.is_disabled(&actual)) {
            return Err(RegistryError::AlreadyDisabled(actual));
        }

        self.config
            .update(|c| c.disabled_commands.push(actual.clone()))?;
        self.write_table().evict(&actual);
        tracing::info!("Disabled command: {}", actual);
        Ok(1)
    }

    pub async fn disable_all(&self) -> bool {
        match self.try_disable_all() {
            Ok(n) => n > 0,
            Err(e) => {
                tracing::warn!("Failed to disable all commands: {}", e);
                false
            }
        }
    }

    pub fn try_disable_all(&self) -> Result<usize, RegistryError> {
        let names = self.names();
        let count = self.config.update(|c| {
            let mut count = 0;
            for name in names {
                if name == PROTECTED_COMMAND || c.disabled_commands.contains(&name) {
                    continue;
                }
                c.disabled_commands.push(name);
                count += 1;
            }
            count
        })?;
        self.write_table().retain_only(PROTECTED_COMMAND);
        tracing::info!("Disabled {} commands", count);
        Ok(count)
    }

    pub async fn enable(&self, name: &str) -> bool {
        match self.try_enable(name).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to enable command {}: {}", name, e);
                false
            }
        }
    }

    /// Take a command off the disabled list and load it again
    pub async fn try_enable(&self, name: &str) -> Result<usize, RegistryError> {
        if is_all(name) {
            return self.try_enable_all().await;
        }
        let name = name.trim();
        if !self.config.read(|c| c.is_disabled(name)) {
            return Err(RegistryError::NotDisabled(name.to_string()));
        }
        // The disabled list only changes once the command is live again
        self.try_reload(name).await?;
        if self.config.read(|c| c.is_disabled(name)) {
            self.config
                .update(|c| c.disabled_commands.retain(|d| d != name))?;
        }
        tracing::info!("Enabled command: {}", name);
        Ok(1)
    }

    pub async fn enable_all(&self) -> bool {
        match self.try_enable_all().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to enable all commands: {}", e);
                false
            }
        }
    }

    pub async fn try_enable_all(&self) -> Result<usize, RegistryError> {
        let count = self.config.read(|c| c.disabled_commands.len());
        if count == 0 {
            return Err(RegistryError::NotDisabled("all".to_string()));
        }
        self.config.update(|c| c.disabled_commands.clear())?;
        self.load_all().await?;
        tracing::info!("Enabled {} previously disabled commands", count);
        Ok(count)
    }

    // Unit operations. Each mutation leaves an audit record naming the actor.

    pub async fn read_unit(&self, unit: &UnitId) -> Result<String, RegistryError> {
        if !self.units.exists(unit).await? {
            return Err(RegistryError::UnitNotFound(unit.to_string()));
        }
        self.units.read(unit).await
    }

    pub async fn unit_ids(&self) -> Result<Vec<UnitId>, RegistryError> {
        self.units.list().await
    }

    pub async fn create_unit(
        &self,
        actor: &UserId,
        unit: &UnitId,
        source: &str,
    ) -> Result<String, RegistryError> {
        if self.units.exists(unit).await? {
            return Err(RegistryError::UnitExists(unit.to_string()));
        }
        self.check_source(unit, source, None).map_err(|(_, e)| e)?;
        self.units.write(unit, source).await?;

        match self.reload_unit(unit).await {
            Ok(name) => {
                tracing::info!(target: "audit", "{} created unit {} (command {})", actor, unit, name);
                Ok(name)
            }
            Err(e) => {
                if let Err(cleanup) = self.units.remove(unit).await {
                    tracing::error!("Failed to remove rejected unit {}: {}", unit, cleanup);
                }
                Err(e)
            }
        }
    }

    /// Replace a unit's source. The new source is validated against every
    /// command except the one this unit currently provides; if the reload
    /// fails the old source is written back.
    pub async fn replace_unit(
        &self,
        actor: &UserId,
        unit: &UnitId,
        source: &str,
        upsert: bool,
    ) -> Result<String, RegistryError> {
        if !self.units.exists(unit).await? {
            if upsert {
                return self.create_unit(actor, unit, source).await;
            }
            return Err(RegistryError::UnitNotFound(unit.to_string()));
        }

        let backup = self.units.read(unit).await?;
        let current = self.read_table().name_for_unit(unit);
        self.check_source(unit, source, current.as_deref())
            .map_err(|(_, e)| e)?;
        self.units.write(unit, source).await?;

        match self.reload_unit(unit).await {
            Ok(name) => {
                tracing::info!(target: "audit", "{} replaced unit {} (command {})", actor, unit, name);
                Ok(name)
            }
            Err(e) => {
                tracing::warn!("Reload of {} failed, restoring previous source: {}", unit, e);
                self.units.write(unit, &backup).await?;
                if current.is_some() {
                    if let Err(restore) = self.reload_unit(unit).await {
                        tracing::error!("Failed to restore {}: {}", unit, restore);
                    }
                }
                Err(e)
            }
        }
    }

    /// Evict whatever the unit provides and delete it
    pub async fn delete_unit(&self, actor: &UserId, unit: &UnitId) -> Result<Option<String>, RegistryError> {
        if !self.units.exists(unit).await? {
            return Err(RegistryError::UnitNotFound(unit.to_string()));
        }
        let evicted = {
            let mut table = self.write_table();
            let name = table.name_for_unit(unit);
            if let Some(name) = &name {
                table.evict(name);
            }
            name
        };
        self.units.remove(unit).await?;
        tracing::info!(target: "audit", "{} deleted unit {} (command {:?})", actor, unit, evicted);
        Ok(evicted)
    }

    pub async fn rename_unit(
        &self,
        actor: &UserId,
        from: &UnitId,
        to: &UnitId,
    ) -> Result<String, RegistryError> {
        if !self.units.exists(from).await? {
            return Err(RegistryError::UnitNotFound(from.to_string()));
        }
        if self.units.exists(to).await? {
            return Err(RegistryError::UnitExists(to.to_string()));
        }
        {
            let mut table = self.write_table();
            if let Some(name) = table.name_for_unit(from) {
                table.evict(&name);
            }
        }
        self.units.rename(from, to).await?;
        let name = self.reload_unit(to).await?;
        tracing::info!(target: "audit", "{} renamed unit {} to {} (command {})", actor, from, to, name);
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::BotConfig;
    use crate::infrastructure::units::MemoryUnitStore;

    fn unit(id: &str) -> UnitId {
        UnitId::parse(id).unwrap()
    }

    fn registry_with(units: &[(&str, &str)]) -> (CommandRegistry, Arc<MemoryUnitStore>) {
        let store = Arc::new(MemoryUnitStore::new());
        for (id, source) in units {
            store.insert(unit(id), *source);
        }
        let registry = CommandRegistry::new(
            store.clone(),
            HandlerCatalog::with_builtins(),
            ConfigHandle::in_memory(BotConfig::default()),
        );
        (registry, store)
    }

    fn actor() -> UserId {
        UserId::new("owner")
    }

    #[tokio::test]
    async fn test_load_all_first_wins_and_aliases_unique() {
        let (registry, _) = registry_with(&[
            ("a_first", "name: greet\naliases: [hi, hey]\nreply: one"),
            ("b_dup", "name: greet\nreply: two"),
            ("c_alias", "name: wave\naliases: [hi, greet, yo]\nreply: three"),
            ("d_name_is_alias", "name: hey\nreply: four"),
            ("e_broken", "name: [oops"),
        ]);

        let report = registry.load_all().await.unwrap();
        assert_eq!(report.loaded, 2);
        assert_eq!(report.failures.len(), 3);

        assert_eq!(registry.get("greet").unwrap().unit, unit("a_first"));
        assert_eq!(registry.get("hi").unwrap().name(), "greet");
        assert_eq!(registry.get("yo").unwrap().name(), "wave");
        assert_eq!(registry.get("hey").unwrap().name(), "greet");
        assert_eq!(registry.names(), vec!["greet".to_string(), "wave".to_string()]);
    }

    #[tokio::test]
    async fn test_load_skips_disabled() {
        let (registry, _) = registry_with(&[("help", "name: help\nhandler: help")]);
        registry
            .config
            .update(|c| c.disabled_commands.push("help".to_string()))
            .unwrap();
        let report = registry.load_all().await.unwrap();
        assert_eq!(report.loaded, 0);
        assert_eq!(report.skipped_disabled, vec!["help".to_string()]);
        assert!(!registry.reload_all().await);
    }

    #[tokio::test]
    async fn test_validate_with_exclusion() {
        let (registry, _) = registry_with(&[("x", "name: x\naliases: [ex]\nreply: old")]);
        registry.load_all().await.unwrap();

        let edited = "name: x\naliases: [ex, ecks]\nreply: new";
        let without = registry.validate(&unit("x"), edited, None);
        assert!(!without.success());
        assert_eq!(without.command_name.as_deref(), Some("x"));

        let with = registry.validate(&unit("x"), edited, Some("x"));
        assert!(with.success(), "{:?}", with.error);

        let broken = registry.validate(&unit("x"), "name: [", Some("x"));
        assert!(!broken.success());
        assert!(broken.command_name.is_none());
    }

    #[tokio::test]
    async fn test_validate_reports_alias_conflicts() {
        let (registry, _) = registry_with(&[("a", "name: a\naliases: [shared]\nreply: a")]);
        registry.load_all().await.unwrap();

        let v = registry.validate(&unit("b"), "name: b\naliases: [shared]\nreply: b", None);
        assert_eq!(
            v.error.as_deref(),
            Some("Alias \"shared\" already used by command \"a\"")
        );
        let v = registry.validate(&unit("b"), "name: b\naliases: [a]\nreply: b", None);
        assert_eq!(
            v.error.as_deref(),
            Some("Alias \"a\" conflicts with existing command name")
        );
    }

    #[tokio::test]
    async fn test_reload_collision_keeps_old_version() {
        let (registry, store) = registry_with(&[
            ("x", "name: x\nreply: old"),
            ("y", "name: y\nreply: y"),
        ]);
        registry.load_all().await.unwrap();

        store.insert(unit("x"), "name: y\nreply: hijack");
        assert!(!registry.reload("x").await);

        let live = registry.get("x").unwrap();
        assert_eq!(live.binding, Binding::Reply("old".to_string()));
        assert_eq!(registry.get("y").unwrap().unit, unit("y"));
    }

    #[tokio::test]
    async fn test_reload_by_alias_and_rename_inside_unit() {
        let (registry, store) = registry_with(&[("x", "name: x\naliases: [ex]\nreply: v1")]);
        registry.load_all().await.unwrap();

        store.insert(unit("x"), "name: xx\naliases: [x]\nreply: v2");
        assert!(registry.reload("ex").await);

        assert!(registry.get("ex").is_none());
        assert_eq!(registry.get("x").unwrap().name(), "xx");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_reload_unknown_command() {
        let (registry, _) = registry_with(&[]);
        assert_eq!(
            registry.try_reload("ghost").await,
            Err(RegistryError::CommandNotFound("ghost".to_string()))
        );
    }

    #[tokio::test]
    async fn test_disable_enable_cycle() {
        let (registry, _) = registry_with(&[
            ("cmd", "name: cmd\nhandler: cmd"),
            ("help", "name: help\naliases: [h]\nhandler: help"),
            ("ping", "name: ping\nreply: pong"),
        ]);
        registry.load_all().await.unwrap();

        assert_eq!(
            registry.try_disable("cmd"),
            Err(RegistryError::Protected("cmd".to_string()))
        );
        assert!(registry.disable("h").await);
        assert!(registry.get("help").is_none());
        assert!(registry.get("h").is_none());
        assert!(!registry.disable("help").await);

        assert!(registry.enable("help").await);
        assert!(registry.get("h").is_some());
        assert!(!registry.enable("help").await);

        assert!(registry.disable_all().await);
        assert_eq!(registry.names(), vec!["cmd".to_string()]);
        assert!(registry.config.read(|c| c.is_disabled("ping")));

        assert!(registry.enable("ALL").await);
        assert_eq!(registry.len(), 3);
        assert!(registry.config.read(|c| c.disabled_commands.is_empty()));
    }

    #[tokio::test]
    async fn test_failed_enable_keeps_command_disabled() {
        let (registry, store) = registry_with(&[("ping", "name: ping\nreply: pong")]);
        registry.load_all().await.unwrap();
        registry.try_disable("ping").unwrap();

        store.insert(unit("ping"), "name: [oops");
        assert!(!registry.enable("ping").await);
        assert!(registry.get("ping").is_none());
        assert!(registry.config.read(|c| c.is_disabled("ping")));

        store.insert(unit("ping"), "name: ping\nreply: pong again");
        assert!(registry.enable("ping").await);
        assert!(registry.get("ping").is_some());
        assert!(!registry.config.read(|c| c.is_disabled("ping")));
    }

    #[tokio::test]
    async fn test_reload_reenables_disabled_command() {
        let (registry, _) = registry_with(&[("ping", "name: ping\nreply: pong")]);
        registry.load_all().await.unwrap();
        registry.try_disable("ping").unwrap();

        assert!(registry.reload("ping").await);
        assert!(registry.get("ping").is_some());
        assert!(!registry.config.read(|c| c.is_disabled("ping")));
    }

    #[tokio::test]
    async fn test_replace_unit_restores_backup_on_failure() {
        let (registry, store) = registry_with(&[
            ("x", "name: x\nreply: v1"),
            ("y", "name: y\nreply: y"),
        ]);
        registry.load_all().await.unwrap();

        let name = registry
            .replace_unit(&actor(), &unit("x"), "name: x\nreply: v2", false)
            .await
            .unwrap();
        assert_eq!(name, "x");
        assert_eq!(
            registry.get("x").unwrap().binding,
            Binding::Reply("v2".to_string())
        );

        let err = registry
            .replace_unit(&actor(), &unit("x"), "name: y\nreply: v3", false)
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("y".to_string()));
        assert_eq!(store.get(&unit("x")).unwrap(), "name: x\nreply: v2");
        assert!(registry.get("x").is_some());
    }

    #[tokio::test]
    async fn test_create_delete_rename_units() {
        let (registry, store) = registry_with(&[("x", "name: x\nreply: x")]);
        registry.load_all().await.unwrap();

        let err = registry
            .create_unit(&actor(), &unit("x"), "name: z\nreply: z")
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::UnitExists("x".to_string()));

        let err = registry
            .create_unit(&actor(), &unit("dup"), "name: x\nreply: z")
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("x".to_string()));
        assert!(store.get(&unit("dup")).is_none());

        registry
            .create_unit(&actor(), &unit("poll"), "name: poll\naliases: [vote]\nreply: p")
            .await
            .unwrap();
        assert_eq!(registry.get("vote").unwrap().name(), "poll");

        let name = registry
            .rename_unit(&actor(), &unit("poll"), &unit("survey"))
            .await
            .unwrap();
        assert_eq!(name, "poll");
        assert_eq!(registry.get("poll").unwrap().unit, unit("survey"));

        let evicted = registry.delete_unit(&actor(), &unit("survey")).await.unwrap();
        assert_eq!(evicted.as_deref(), Some("poll"));
        assert!(registry.get("vote").is_none());
        assert!(store.get(&unit("survey")).is_none());

        let err = registry
            .replace_unit(&actor(), &unit("nope"), "name: n\nreply: n", false)
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::UnitNotFound("nope".to_string()));
        registry
            .replace_unit(&actor(), &unit("nope"), "name: n\nreply: n", true)
            .await
            .unwrap();
        assert!(registry.get("n").is_some());
    }
}
