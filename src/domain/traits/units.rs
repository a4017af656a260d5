use async_trait::async_trait;

use crate::application::errors::RegistryError;
use crate::domain::entities::UnitId;

/// Backing storage for command source units
#[async_trait]
pub trait UnitStore: Send + Sync {
    /// All unit ids, sorted
    async fn list(&self) -> Result<Vec<UnitId>, RegistryError>;
    async fn exists(&self, id: &UnitId) -> Result<bool, RegistryError>;
    async fn read(&self, id: &UnitId) -> Result<String, RegistryError>;
    async fn write(&self, id: &UnitId, source: &str) -> Result<(), RegistryError>;
    async fn remove(&self, id: &UnitId) -> Result<(), RegistryError>;
    async fn rename(&self, from: &UnitId, to: &UnitId) -> Result<(), RegistryError>;
}
