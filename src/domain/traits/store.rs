use async_trait::async_trait;
use chrono::Utc;

use crate::application::errors::StorageError;
use crate::domain::entities::{CurrencyRecord, ThreadId, ThreadRecord, UserId, UserRecord};

/// Store trait - abstraction for the user/thread/currency data store
#[async_trait]
pub trait Store: Send + Sync {
    // User operations
    async fn find_user(&self, id: &UserId) -> Result<Option<UserRecord>, StorageError>;
    async fn save_user(&self, user: &UserRecord) -> Result<(), StorageError>;

    // Thread operations
    async fn find_thread(&self, id: &ThreadId) -> Result<Option<ThreadRecord>, StorageError>;
    async fn save_thread(&self, thread: &ThreadRecord) -> Result<(), StorageError>;
    async fn delete_thread(&self, id: &ThreadId) -> Result<bool, StorageError>;
    async fn list_threads(&self) -> Result<Vec<ThreadRecord>, StorageError>;

    // Currency operations
    async fn find_currency(&self, id: &UserId) -> Result<Option<CurrencyRecord>, StorageError>;
    async fn save_currency(&self, record: &CurrencyRecord) -> Result<(), StorageError>;

    async fn is_user_banned(&self, id: &UserId) -> Result<bool, StorageError> {
        Ok(self.find_user(id).await?.map(|u| u.is_banned).unwrap_or(false))
    }

    async fn is_thread_banned(&self, id: &ThreadId) -> Result<bool, StorageError> {
        Ok(self.find_thread(id).await?.map(|t| t.is_banned).unwrap_or(false))
    }

    /// Bump a user's last-active time, creating the record on first sight
    async fn touch_user(&self, id: &UserId, thread_id: &ThreadId) -> Result<(), StorageError> {
        let mut user = match self.find_user(id).await? {
            Some(user) => user,
            None => UserRecord::new(id.clone(), String::new()),
        };
        user.last_active = Utc::now();
        user.last_thread_id = Some(thread_id.clone());
        self.save_user(&user).await
    }

    async fn touch_thread(&self, id: &ThreadId) -> Result<(), StorageError> {
        let mut thread = match self.find_thread(id).await? {
            Some(thread) => thread,
            None => ThreadRecord::new(id.clone(), String::new()),
        };
        thread.last_active = Utc::now();
        self.save_thread(&thread).await
    }
}
