use async_trait::async_trait;

use crate::application::errors::BotError;
use crate::domain::entities::{MessageId, ThreadId, UserId};

/// ChatApi trait - abstraction for the messaging platform client
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send a message to a thread, optionally as a reply, returning its id
    async fn send_message(
        &self,
        thread_id: &ThreadId,
        body: &str,
        reply_to: Option<&MessageId>,
    ) -> Result<MessageId, BotError>;

    /// Replace the text of a message the bot sent earlier
    async fn edit_message(
        &self,
        thread_id: &ThreadId,
        message_id: &MessageId,
        body: &str,
    ) -> Result<(), BotError>;

    /// Retract a message the bot sent
    async fn unsend_message(&self, thread_id: &ThreadId, message_id: &MessageId) -> Result<(), BotError>;

    /// Put the bot's own reaction on a message
    async fn set_reaction(
        &self,
        thread_id: &ThreadId,
        message_id: &MessageId,
        reaction: &str,
    ) -> Result<(), BotError>;

    async fn user_info(&self, user_id: &UserId) -> Result<Option<UserInfo>, BotError>;

    /// Thread metadata; `None` when the bot can no longer see the thread
    async fn thread_info(&self, thread_id: &ThreadId) -> Result<Option<ThreadInfo>, BotError>;

    /// The bot's own user id
    fn bot_id(&self) -> UserId;
}

/// Public profile of a platform user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: UserId,
    pub name: String,
}

impl UserInfo {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Thread metadata as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub name: String,
    pub is_group: bool,
    pub participant_ids: Vec<UserId>,
}

impl ThreadInfo {
    pub fn new(id: impl Into<ThreadId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_group: true,
            participant_ids: Vec::new(),
        }
    }

    pub fn with_participants(mut self, participants: Vec<UserId>) -> Self {
        self.participant_ids = participants;
        self
    }
}
