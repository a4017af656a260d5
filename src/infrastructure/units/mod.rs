//! Command unit storage
//!
//! `FsUnitStore` keeps one YAML file per unit in the commands directory.
//! `MemoryUnitStore` keeps them in a map, for tests and dry runs.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::application::errors::RegistryError;
use crate::domain::entities::UnitId;
use crate::domain::traits::UnitStore;

/// Units stored as `<dir>/<unit-id>.yaml`
pub struct FsUnitStore {
    dir: PathBuf,
}

impl FsUnitStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the commands directory if it is missing
    pub async fn init(&self) -> Result<(), RegistryError> {
        if !self.dir.exists() {
            tokio::fs::create_dir_all(&self.dir).await?;
            tracing::info!("Created commands directory {}", self.dir.display());
        }
        Ok(())
    }

    pub fn path_for(&self, id: &UnitId) -> PathBuf {
        self.dir.join(id.file_name())
    }

    /// Existing file for a unit; `.yml` files are accepted as well
    fn existing_path(&self, id: &UnitId) -> Option<PathBuf> {
        let primary = self.path_for(id);
        if primary.is_file() {
            return Some(primary);
        }
        let alt = self.dir.join(format!("{}.yml", id));
        alt.is_file().then_some(alt)
    }
}

#[async_trait]
impl UnitStore for FsUnitStore {
    async fn list(&self) -> Result<Vec<UnitId>, RegistryError> {
        let mut ids = Vec::new();
        if !self.dir.exists() {
            tracing::warn!("Commands directory does not exist: {}", self.dir.display());
            return Ok(ids);
        }

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            // Skip hidden files and editor leftovers
            if name.starts_with('.') || !(name.ends_with(".yaml") || name.ends_with(".yml")) {
                continue;
            }
            match UnitId::parse(name) {
                Ok(id) if !ids.contains(&id) => ids.push(id),
                Ok(_) => {}
                Err(e) => tracing::warn!("Ignoring {}: {}", path.display(), e),
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn exists(&self, id: &UnitId) -> Result<bool, RegistryError> {
        Ok(self.existing_path(id).is_some())
    }

    async fn read(&self, id: &UnitId) -> Result<String, RegistryError> {
        let path = self
            .existing_path(id)
            .ok_or_else(|| RegistryError::UnitNotFound(id.to_string()))?;
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn write(&self, id: &UnitId, source: &str) -> Result<(), RegistryError> {
        let path = self.existing_path(id).unwrap_or_else(|| self.path_for(id));
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(path, source).await?;
        Ok(())
    }

    async fn remove(&self, id: &UnitId) -> Result<(), RegistryError> {
        let path = self
            .existing_path(id)
            .ok_or_else(|| RegistryError::UnitNotFound(id.to_string()))?;
        tokio::fs::remove_file(path).await?;
        Ok(())
    }

    async fn rename(&self, from: &UnitId, to: &UnitId) -> Result<(), RegistryError> {
        let source = self
            .existing_path(from)
            .ok_or_else(|| RegistryError::UnitNotFound(from.to_string()))?;
        if self.existing_path(to).is_some() {
            return Err(RegistryError::UnitExists(to.to_string()));
        }
        tokio::fs::rename(source, self.path_for(to)).await?;
        Ok(())
    }
}

/// In-memory units
#[derive(Default)]
pub struct MemoryUnitStore {
    units: Mutex<BTreeMap<UnitId, String>>,
}

impl MemoryUnitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite a unit directly
    pub fn insert(&self, id: UnitId, source: impl Into<String>) {
        self.units
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, source.into());
    }

    pub fn get(&self, id: &UnitId) -> Option<String> {
        self.units
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }
}

#[async_trait]
impl UnitStore for MemoryUnitStore {
    async fn list(&self) -> Result<Vec<UnitId>, RegistryError> {
        Ok(self
            .units
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect())
    }

    async fn exists(&self, id: &UnitId) -> Result<bool, RegistryError> {
        Ok(self.get(id).is_some())
    }

    async fn read(&self, id: &UnitId) -> Result<String, RegistryError> {
        self.get(id)
            .ok_or_else(|| RegistryError::UnitNotFound(id.to_string()))
    }

    async fn write(&self, id: &UnitId, source: &str) -> Result<(), RegistryError> {
        self.insert(id.clone(), source);
        Ok(())
    }

    async fn remove(&self, id: &UnitId) -> Result<(), RegistryError> {
        self.units
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RegistryError::UnitNotFound(id.to_string()))
    }

    async fn rename(&self, from: &UnitId, to: &UnitId) -> Result<(), RegistryError> {
        let mut units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        if units.contains_key(to) {
            return Err(RegistryError::UnitExists(to.to_string()));
        }
        let source = units
            .remove(from)
            .ok_or_else(|| RegistryError::UnitNotFound(from.to_string()))?;
        units.insert(to.clone(), source);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str) -> UnitId {
        UnitId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn test_fs_store_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsUnitStore::new(dir.path().join("commands"));
        store.init().await.unwrap();

        store.write(&unit("ping"), "name: ping\nreply: pong\n").await.unwrap();
        std::fs::write(store.dir().join(".hidden.yaml"), "x").unwrap();
        std::fs::write(store.dir().join("notes.txt"), "x").unwrap();
        std::fs::write(store.dir().join("legacy.yml"), "name: legacy\nreply: l\n").unwrap();

        assert_eq!(store.list().await.unwrap(), vec![unit("legacy"), unit("ping")]);
        assert!(store.exists(&unit("legacy")).await.unwrap());
        assert_eq!(
            store.read(&unit("ping")).await.unwrap(),
            "name: ping\nreply: pong\n"
        );

        store.rename(&unit("ping"), &unit("pong")).await.unwrap();
        assert!(!store.exists(&unit("ping")).await.unwrap());
        assert!(dir.path().join("commands/pong.yaml").is_file());

        store.remove(&unit("pong")).await.unwrap();
        assert!(matches!(
            store.read(&unit("pong")).await,
            Err(RegistryError::UnitNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_store_missing_dir_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsUnitStore::new(dir.path().join("absent"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_rename_refuses_overwrite() {
        let store = MemoryUnitStore::new();
        store.insert(unit("a"), "a");
        store.insert(unit("b"), "b");
        assert_eq!(
            store.rename(&unit("a"), &unit("b")).await,
            Err(RegistryError::UnitExists("b".to_string()))
        );
    }
}
