//! File-based storage implementation
//!
//! Records live in memory and each collection is snapshotted to its own JSON
//! file after every write. Without a base path nothing touches the disk.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::application::errors::StorageError;
use crate::domain::entities::{CurrencyRecord, ThreadId, ThreadRecord, UserId, UserRecord};
use crate::domain::traits::Store;

const USERS_FILE: &str = "users.json";
const THREADS_FILE: &str = "threads.json";
const CURRENCY_FILE: &str = "currency.json";

/// JSON file-based store
pub struct JsonStore {
    base_path: Option<PathBuf>,
    users: Arc<RwLock<HashMap<UserId, UserRecord>>>,
    threads: Arc<RwLock<HashMap<ThreadId, ThreadRecord>>>,
    currency: Arc<RwLock<HashMap<UserId, CurrencyRecord>>>,
}

impl JsonStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: Some(base_path.into()),
            ..Self::in_memory()
        }
    }

    pub fn in_memory() -> Self {
        Self {
            base_path: None,
            users: Arc::new(RwLock::new(HashMap::new())),
            threads: Arc::new(RwLock::new(HashMap::new())),
            currency: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create the directory and load any existing snapshots
    pub async fn init(&self) -> Result<(), StorageError> {
        let Some(base) = &self.base_path else {
            return Ok(());
        };
        tokio::fs::create_dir_all(base).await?;

        let users: Vec<UserRecord> = load_snapshot(&base.join(USERS_FILE)).await?;
        let threads: Vec<ThreadRecord> = load_snapshot(&base.join(THREADS_FILE)).await?;
        let currency: Vec<CurrencyRecord> = load_snapshot(&base.join(CURRENCY_FILE)).await?;
        tracing::info!(
            "Loaded {} users, {} threads, {} currency records from {}",
            users.len(),
            threads.len(),
            currency.len(),
            base.display()
        );

        *self.users.write().await = users.into_iter().map(|u| (u.user_id.clone(), u)).collect();
        *self.threads.write().await = threads.into_iter().map(|t| (t.thread_id.clone(), t)).collect();
        *self.currency.write().await = currency.into_iter().map(|c| (c.user_id.clone(), c)).collect();
        Ok(())
    }

    async fn persist<K, V>(&self, file: &str, map: &HashMap<K, V>) -> Result<(), StorageError>
    where
        K: Eq + Hash + Ord,
        V: Serialize,
    {
        let Some(base) = &self.base_path else {
            return Ok(());
        };
        let mut entries: Vec<(&K, &V)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let values: Vec<&V> = entries.into_iter().map(|(_, v)| v).collect();
        let json = serde_json::to_string_pretty(&values)?;

        let path = base.join(file);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

async fn load_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserRecord>, StorageError> {
        let users = self.users.read().await;
        Ok(users.get(id).cloned())
    }

    async fn save_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        let mut users = self.users.write().await;
        users.insert(user.user_id.clone(), user.clone());
        self.persist(USERS_FILE, &users).await
    }

    async fn find_thread(&self, id: &ThreadId) -> Result<Option<ThreadRecord>, StorageError> {
        let threads = self.threads.read().await;
        Ok(threads.get(id).cloned())
    }

    async fn save_thread(&self, thread: &ThreadRecord) -> Result<(), StorageError> {
        let mut threads = self.threads.write().await;
        threads.insert(thread.thread_id.clone(), thread.clone());
        self.persist(THREADS_FILE, &threads).await
    }

    async fn delete_thread(&self, id: &ThreadId) -> Result<bool, StorageError> {
        let mut threads = self.threads.write().await;
        if threads.remove(id).is_none() {
            return Ok(false);
        }
        self.persist(THREADS_FILE, &threads).await?;
        Ok(true)
    }

    async fn list_threads(&self) -> Result<Vec<ThreadRecord>, StorageError> {
        let threads = self.threads.read().await;
        let mut all: Vec<ThreadRecord> = threads.values().cloned().collect();
        all.sort_by(|a, b| a.thread_id.cmp(&b.thread_id));
        Ok(all)
    }

    async fn find_currency(&self, id: &UserId) -> Result<Option<CurrencyRecord>, StorageError> {
        let currency = self.currency.read().await;
        Ok(currency.get(id).cloned())
    }

    async fn save_currency(&self, record: &CurrencyRecord) -> Result<(), StorageError> {
        let mut currency = self.currency.write().await;
        currency.insert(record.user_id.clone(), record.clone());
        self.persist(CURRENCY_FILE, &currency).await
    }
}
