//! Records kept in the external data store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Permission, ThreadId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub is_banned: bool,
    #[serde(default)]
    pub ban_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub last_thread_id: Option<ThreadId>,
}

impl UserRecord {
    pub fn new(user_id: impl Into<UserId>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            name: name.into(),
            is_banned: false,
            ban_reason: None,
            created_at: now,
            last_active: now,
            last_thread_id: None,
        }
    }
}

/// Per-thread overrides set through the admin command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadSettings {
    #[serde(default)]
    pub admin_only_mode: Option<Permission>,
    #[serde(default)]
    pub updated_by: Option<UserId>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub thread_id: ThreadId,
    pub name: String,
    #[serde(default)]
    pub is_banned: bool,
    #[serde(default)]
    pub ban_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub member_count: u32,
    #[serde(default)]
    pub settings: ThreadSettings,
}

impl ThreadRecord {
    pub fn new(thread_id: impl Into<ThreadId>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            thread_id: thread_id.into(),
            name: name.into(),
            is_banned: false,
            ban_reason: None,
            created_at: now,
            last_active: now,
            member_count: 0,
            settings: ThreadSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyRecord {
    pub user_id: UserId,
    pub money: i64,
    #[serde(default)]
    pub exp: i64,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub bank: i64,
    #[serde(default)]
    pub bank_capacity: i64,
}

impl CurrencyRecord {
    pub fn new(user_id: impl Into<UserId>, money: i64) -> Self {
        Self {
            user_id: user_id.into(),
            money,
            exp: 0,
            level: 1,
            bank: 0,
            bank_capacity: 0,
        }
    }
}
