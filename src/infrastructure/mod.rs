//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: the persisted JSON configuration
//! - Storage / Database: user, thread and currency records
//! - Units: command source files
//! - Adapters: platform integrations (console, Telegram)
//! - Remote: pastebin, update host and GitHub clients

pub mod adapters;
pub mod config;
pub mod database;
pub mod remote;
pub mod storage;
pub mod units;

use std::sync::Arc;

use crate::application::errors::StorageError;
use crate::domain::traits::Store;
use config::{StoreConfig, StoreKind};

/// Open the record store selected in the config
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn Store>, StorageError> {
    match config.kind {
        StoreKind::Sqlite => {
            let store = database::SqliteStore::open(&config.path)?;
            tracing::info!("Database initialized at {}", config.path.display());
            Ok(Arc::new(store))
        }
        StoreKind::Json => {
            let store = storage::JsonStore::new(&config.path);
            store.init().await?;
            tracing::info!("JSON store initialized at {}", config.path.display());
            Ok(Arc::new(store))
        }
    }
}
