//! SQLite store
//!
//! One connection behind a mutex. Statements are short, so they run inline on
//! the event loop instead of on a blocking pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::application::errors::StorageError;
use crate::domain::entities::{CurrencyRecord, ThreadId, ThreadRecord, ThreadSettings, UserId, UserRecord};
use crate::domain::traits::Store;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn parse_time(raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        user_id: UserId::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        is_banned: row.get(2)?,
        ban_reason: row.get(3)?,
        created_at: parse_time(row.get(4)?)?,
        last_active: parse_time(row.get(5)?)?,
        last_thread_id: row.get::<_, Option<String>>(6)?.map(ThreadId::new),
    })
}

fn thread_from_row(row: &Row<'_>) -> rusqlite::Result<ThreadRecord> {
    let settings: String = row.get(7)?;
    Ok(ThreadRecord {
        thread_id: ThreadId::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        is_banned: row.get(2)?,
        ban_reason: row.get(3)?,
        created_at: parse_time(row.get(4)?)?,
        last_active: parse_time(row.get(5)?)?,
        member_count: row.get(6)?,
        settings: serde_json::from_str::<ThreadSettings>(&settings).unwrap_or_default(),
    })
}

fn currency_from_row(row: &Row<'_>) -> rusqlite::Result<CurrencyRecord> {
    Ok(CurrencyRecord {
        user_id: UserId::new(row.get::<_, String>(0)?),
        money: row.get(1)?,
        exp: row.get(2)?,
        level: row.get(3)?,
        bank: row.get(4)?,
        bank_capacity: row.get(5)?,
    })
}

const THREAD_COLUMNS: &str =
    "thread_id, name, is_banned, ban_reason, created_at, last_active, member_count, settings";

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let store = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        store.init_tables()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_tables()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_tables(&self) -> Result<(), StorageError> {
        let conn = self.conn();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                is_banned INTEGER NOT NULL DEFAULT 0,
                ban_reason TEXT,
                created_at TEXT NOT NULL,
                last_active TEXT NOT NULL,
                last_thread_id TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS threads (
                thread_id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                is_banned INTEGER NOT NULL DEFAULT 0,
                ban_reason TEXT,
                created_at TEXT NOT NULL,
                last_active TEXT NOT NULL,
                member_count INTEGER NOT NULL DEFAULT 0,
                settings TEXT NOT NULL DEFAULT '{}'
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS currency (
                user_id TEXT PRIMARY KEY,
                money INTEGER NOT NULL DEFAULT 0,
                exp INTEGER NOT NULL DEFAULT 0,
                level INTEGER NOT NULL DEFAULT 1,
                bank INTEGER NOT NULL DEFAULT 0,
                bank_capacity INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_threads_banned ON threads(is_banned)",
            [],
        )?;
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserRecord>, StorageError> {
        let conn = self.conn();
        let user = conn
            .query_row(
                "SELECT user_id, name, is_banned, ban_reason, created_at, last_active, last_thread_id
                 FROM users WHERE user_id = ?1",
                [id.as_str()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn save_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO users
             (user_id, name, is_banned, ban_reason, created_at, last_active, last_thread_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.user_id.as_str(),
                user.name,
                user.is_banned,
                user.ban_reason,
                user.created_at.to_rfc3339(),
                user.last_active.to_rfc3339(),
                user.last_thread_id.as_ref().map(|t| t.as_str()),
            ],
        )?;
        Ok(())
    }

    async fn find_thread(&self, id: &ThreadId) -> Result<Option<ThreadRecord>, StorageError> {
        let conn = self.conn();
        let thread = conn
            .query_row(
                &format!("SELECT {} FROM threads WHERE thread_id = ?1", THREAD_COLUMNS),
                [id.as_str()],
                thread_from_row,
            )
            .optional()?;
        Ok(thread)
    }

    async fn save_thread(&self, thread: &ThreadRecord) -> Result<(), StorageError> {
        let settings = serde_json::to_string(&thread.settings)?;
        self.conn().execute(
            &format!(
                "INSERT OR REPLACE INTO threads ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                THREAD_COLUMNS
            ),
            params![
                thread.thread_id.as_str(),
                thread.name,
                thread.is_banned,
                thread.ban_reason,
                thread.created_at.to_rfc3339(),
                thread.last_active.to_rfc3339(),
                thread.member_count,
                settings,
            ],
        )?;
        Ok(())
    }

    async fn delete_thread(&self, id: &ThreadId) -> Result<bool, StorageError> {
        let rows = self
            .conn()
            .execute("DELETE FROM threads WHERE thread_id = ?1", [id.as_str()])?;
        Ok(rows > 0)
    }

    async fn list_threads(&self) -> Result<Vec<ThreadRecord>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM threads ORDER BY thread_id",
            THREAD_COLUMNS
        ))?;
        let rows = stmt.query_map([], thread_from_row)?;

        let mut threads = Vec::new();
        for thread in rows {
            threads.push(thread?);
        }
        Ok(threads)
    }

    async fn find_currency(&self, id: &UserId) -> Result<Option<CurrencyRecord>, StorageError> {
        let conn = self.conn();
        let record = conn
            .query_row(
                "SELECT user_id, money, exp, level, bank, bank_capacity FROM currency WHERE user_id = ?1",
                [id.as_str()],
                currency_from_row,
            )
            .optional()?;
        Ok(record)
    }

    async fn save_currency(&self, record: &CurrencyRecord) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO currency (user_id, money, exp, level, bank, bank_capacity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.user_id.as_str(),
                record.money,
                record.exp,
                record.level,
                record.bank,
                record.bank_capacity,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Permission;

    #[tokio::test]
    async fn test_user_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let mut user = UserRecord::new("U1", "Ada");
        user.is_banned = true;
        user.ban_reason = Some("spam".to_string());
        store.save_user(&user).await.unwrap();

        let loaded = store.find_user(&UserId::new("U1")).await.unwrap().unwrap();
        assert!(loaded.is_banned);
        assert_eq!(loaded.ban_reason.as_deref(), Some("spam"));
        assert!(store.find_user(&UserId::new("nobody")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_thread_settings_persist() {
        let store = SqliteStore::in_memory().unwrap();
        let mut thread = ThreadRecord::new("T1", "Lobby");
        thread.settings.admin_only_mode = Some(Permission::Support);
        store.save_thread(&thread).await.unwrap();

        let threads = store.list_threads().await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].settings.admin_only_mode, Some(Permission::Support));

        assert!(store.delete_thread(&ThreadId::new("T1")).await.unwrap());
        assert!(store.list_threads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_currency_update() {
        let store = SqliteStore::in_memory().unwrap();
        let mut record = CurrencyRecord::new("U1", 100);
        store.save_currency(&record).await.unwrap();
        record.money -= 40;
        store.save_currency(&record).await.unwrap();

        let loaded = store.find_currency(&UserId::new("U1")).await.unwrap().unwrap();
        assert_eq!(loaded.money, 60);
        assert_eq!(loaded.level, 1);
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bot.db");
        SqliteStore::open(&path).unwrap();
        assert!(path.exists());
    }
}
