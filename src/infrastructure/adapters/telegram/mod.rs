//! Telegram adapter
//!
//! Long-polls `getUpdates` for messages and reaction changes and maps the
//! Bot API onto [`ChatApi`]. A Telegram chat is a thread; message ids are
//! only unique within their chat, which is how the rest of the bot already
//! treats them.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::{InboundEvent, MessageEvent, MessageId, ReactionEvent, ReplyRef, ThreadId, UserId};
use crate::domain::traits::{ChatApi, ThreadInfo, UserInfo};

/// Telegram API base URL
const API_BASE: &str = "https://api.telegram.org";

const POLL_TIMEOUT_SECS: u64 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram update type
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub message_reaction: Option<MessageReaction>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub reply_to_message: Option<Box<Message>>,
}

impl Message {
    fn body(&self) -> String {
        self.text
            .clone()
            .or_else(|| self.caption.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub title: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl Chat {
    fn display_name(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.username.clone().unwrap_or_default()
        } else {
            name
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageReaction {
    pub chat: Chat,
    pub message_id: i64,
    pub user: Option<User>,
    #[serde(default)]
    pub new_reaction: Vec<ReactionType>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReactionType {
    #[serde(rename = "type")]
    pub kind: String,
    pub emoji: Option<String>,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct ChatMember {
    status: String,
    user: User,
}

/// Map one update onto the dispatcher's event shape
pub fn into_event(update: Update) -> Option<InboundEvent> {
    if let Some(message) = update.message {
        let from = message.from.as_ref()?;
        let mut event = MessageEvent::new(
            message.chat.id,
            message.message_id,
            from.id,
            message.body(),
        );
        if let Some(replied) = &message.reply_to_message {
            event = event.replying_to(ReplyRef {
                message_id: MessageId::from(replied.message_id),
                sender_id: replied.from.as_ref().map(|u| UserId::from(u.id)),
                body: replied.body(),
            });
        }
        return Some(InboundEvent::Message(event));
    }

    let reaction = update.message_reaction?;
    let user = reaction.user?;
    let emoji = reaction
        .new_reaction
        .iter()
        .find(|r| r.kind == "emoji")
        .and_then(|r| r.emoji.clone());
    Some(InboundEvent::Reaction(ReactionEvent {
        thread_id: ThreadId::from(reaction.chat.id),
        message_id: MessageId::from(reaction.message_id),
        reaction: emoji,
        sender_id: UserId::default(),
        user_id: Some(UserId::from(user.id)),
    }))
}

/// Telegram bot adapter
pub struct TelegramAdapter {
    token: String,
    client: Client,
    bot_id: OnceCell<UserId>,
}

impl TelegramAdapter {
    pub fn new(token: impl Into<String>, client: Client) -> Self {
        Self {
            token: token.into(),
            client,
            bot_id: OnceCell::new(),
        }
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: &impl Serialize,
        timeout: Option<Duration>,
    ) -> Result<T, BotError> {
        let mut builder = self.client.post(self.api_url(method)).json(request);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        let data: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| BotError::Parse(e.to_string()))?;

        match (data.ok, data.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(BotError::Platform(format!(
                "Telegram {} failed: {}",
                method,
                data.description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }

    /// Fetch the bot's own id; must run before events are dispatched
    pub async fn connect(&self) -> Result<UserId, BotError> {
        #[derive(Serialize)]
        struct Empty {}

        let me: User = self.call("getMe", &Empty {}, None).await?;
        let id = UserId::from(me.id);
        tracing::info!(
            "Connected to Telegram as @{} ({})",
            me.username.as_deref().unwrap_or("?"),
            id
        );
        Ok(self.bot_id.get_or_init(|| id).clone())
    }

    /// Get updates from Telegram using getUpdates API
    pub async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>, BotError> {
        #[derive(Serialize)]
        struct GetUpdatesRequest {
            offset: i64,
            timeout: u64,
            allowed_updates: Vec<&'static str>,
        }

        let request = GetUpdatesRequest {
            offset,
            timeout,
            allowed_updates: vec!["message", "message_reaction"],
        };
        self.call(
            "getUpdates",
            &request,
            Some(Duration::from_secs(timeout + 10)),
        )
        .await
    }

    /// Get the next update offset
    pub fn next_offset(updates: &[Update], current: i64) -> i64 {
        updates
            .iter()
            .map(|u| u.update_id + 1)
            .max()
            .unwrap_or(current)
    }

    /// Poll forever, forwarding events until the receiver goes away
    pub async fn run(&self, tx: mpsc::Sender<InboundEvent>) -> Result<(), BotError> {
        let mut offset = 0;
        loop {
            let updates = match self.get_updates(offset, POLL_TIMEOUT_SECS).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!("Polling failed: {}, retrying in {:?}", e, RETRY_DELAY);
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };
            offset = Self::next_offset(&updates, offset);

            for update in updates {
                let Some(event) = into_event(update) else {
                    continue;
                };
                if tx.send(event).await.is_err() {
                    tracing::info!("Dispatcher closed, stopping Telegram polling");
                    return Ok(());
                }
            }
        }
    }

    async fn chat_member(&self, chat_id: &ThreadId, user_id: &UserId) -> Result<ChatMember, BotError> {
        #[derive(Serialize)]
        struct GetChatMemberRequest<'a> {
            chat_id: &'a str,
            user_id: &'a str,
        }

        self.call(
            "getChatMember",
            &GetChatMemberRequest {
                chat_id: chat_id.as_str(),
                user_id: user_id.as_str(),
            },
            None,
        )
        .await
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    chat_id: &'a str,
}

#[derive(Serialize)]
struct MessageRef<'a> {
    chat_id: &'a str,
    message_id: &'a str,
}

#[async_trait]
impl ChatApi for TelegramAdapter {
    async fn send_message(
        &self,
        thread_id: &ThreadId,
        body: &str,
        reply_to: Option<&MessageId>,
    ) -> Result<MessageId, BotError> {
        #[derive(Serialize)]
        struct ReplyParameters<'a> {
            message_id: &'a str,
            allow_sending_without_reply: bool,
        }

        #[derive(Serialize)]
        struct SendMessageRequest<'a> {
            chat_id: &'a str,
            text: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            reply_parameters: Option<ReplyParameters<'a>>,
        }

        tracing::debug!("Sending to {}: {}", thread_id, body);
        let request = SendMessageRequest {
            chat_id: thread_id.as_str(),
            text: body,
            reply_parameters: reply_to.map(|id| ReplyParameters {
                message_id: id.as_str(),
                allow_sending_without_reply: true,
            }),
        };
        let sent: Message = self.call("sendMessage", &request, None).await?;
        Ok(MessageId::from(sent.message_id))
    }

    async fn edit_message(
        &self,
        thread_id: &ThreadId,
        message_id: &MessageId,
        body: &str,
    ) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct EditRequest<'a> {
            chat_id: &'a str,
            message_id: &'a str,
            text: &'a str,
        }

        let request = EditRequest {
            chat_id: thread_id.as_str(),
            message_id: message_id.as_str(),
            text: body,
        };
        // Returns the edited Message, or `true` for inline messages
        let _: serde_json::Value = self.call("editMessageText", &request, None).await?;
        Ok(())
    }

    async fn unsend_message(&self, thread_id: &ThreadId, message_id: &MessageId) -> Result<(), BotError> {
        let request = MessageRef {
            chat_id: thread_id.as_str(),
            message_id: message_id.as_str(),
        };
        let _: bool = self.call("deleteMessage", &request, None).await?;
        Ok(())
    }

    async fn set_reaction(
        &self,
        thread_id: &ThreadId,
        message_id: &MessageId,
        reaction: &str,
    ) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct Emoji<'a> {
            #[serde(rename = "type")]
            kind: &'static str,
            emoji: &'a str,
        }

        #[derive(Serialize)]
        struct SetReactionRequest<'a> {
            chat_id: &'a str,
            message_id: &'a str,
            reaction: Vec<Emoji<'a>>,
        }

        let request = SetReactionRequest {
            chat_id: thread_id.as_str(),
            message_id: message_id.as_str(),
            reaction: vec![Emoji {
                kind: "emoji",
                emoji: reaction,
            }],
        };
        let _: bool = self.call("setMessageReaction", &request, None).await?;
        Ok(())
    }

    async fn user_info(&self, user_id: &UserId) -> Result<Option<UserInfo>, BotError> {
        // Private chats share the user's id; only users who talked to the bot resolve
        match self
            .call::<Chat>("getChat", &ChatRequest { chat_id: user_id.as_str() }, None)
            .await
        {
            Ok(chat) => Ok(Some(UserInfo::new(user_id.clone(), chat.display_name()))),
            Err(BotError::Platform(e)) => {
                tracing::debug!("No profile for {}: {}", user_id, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn thread_info(&self, thread_id: &ThreadId) -> Result<Option<ThreadInfo>, BotError> {
        let chat = match self
            .call::<Chat>("getChat", &ChatRequest { chat_id: thread_id.as_str() }, None)
            .await
        {
            Ok(chat) => chat,
            Err(BotError::Platform(e)) => {
                tracing::debug!("Chat {} not visible: {}", thread_id, e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut participants: Vec<UserId> = self
            .call::<Vec<ChatMember>>(
                "getChatAdministrators",
                &ChatRequest { chat_id: thread_id.as_str() },
                None,
            )
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|m| UserId::from(m.user.id))
            .collect();

        let bot_id = self.bot_id();
        if !participants.contains(&bot_id) {
            if let Ok(member) = self.chat_member(thread_id, &bot_id).await {
                if !matches!(member.status.as_str(), "left" | "kicked") {
                    participants.push(bot_id);
                }
            }
        }

        let mut info = ThreadInfo::new(thread_id.clone(), chat.display_name()).with_participants(participants);
        info.is_group = chat.kind != "private";
        Ok(Some(info))
    }

    fn bot_id(&self) -> UserId {
        self.bot_id.get().cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_update_with_reply() {
        let json = r#"{
            "update_id": 10,
            "message": {
                "message_id": 5,
                "from": {"id": 42, "first_name": "Ada"},
                "chat": {"id": -100, "type": "group", "title": "Lobby"},
                "text": "yes",
                "reply_to_message": {
                    "message_id": 4,
                    "from": {"id": 1, "first_name": "bot"},
                    "chat": {"id": -100, "type": "group"},
                    "text": "Reply yes to confirm"
                }
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let InboundEvent::Message(message) = into_event(update).unwrap() else {
            panic!("expected message");
        };
        assert_eq!(message.thread_id.as_str(), "-100");
        assert_eq!(message.sender_id.as_str(), "42");
        let reply = message.message_reply.unwrap();
        assert_eq!(reply.message_id.as_str(), "4");
        assert_eq!(reply.body, "Reply yes to confirm");
    }

    #[test]
    fn test_reaction_update() {
        let json = r#"{
            "update_id": 11,
            "message_reaction": {
                "chat": {"id": 7, "type": "private"},
                "message_id": 3,
                "user": {"id": 42},
                "new_reaction": [{"type": "emoji", "emoji": "👍"}]
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let InboundEvent::Reaction(reaction) = into_event(update).unwrap() else {
            panic!("expected reaction");
        };
        assert_eq!(reaction.actor().as_str(), "42");
        assert_eq!(reaction.reaction.as_deref(), Some("👍"));
    }

    #[test]
    fn test_cleared_reaction_is_removal() {
        let json = r#"{
            "update_id": 12,
            "message_reaction": {
                "chat": {"id": 7},
                "message_id": 3,
                "user": {"id": 42},
                "new_reaction": []
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let InboundEvent::Reaction(reaction) = into_event(update).unwrap() else {
            panic!("expected reaction");
        };
        assert!(reaction.reaction.is_none());
    }

    #[test]
    fn test_next_offset() {
        let updates: Vec<Update> = serde_json::from_str(r#"[{"update_id": 3}, {"update_id": 9}]"#).unwrap();
        assert_eq!(TelegramAdapter::next_offset(&updates, 0), 10);
        assert_eq!(TelegramAdapter::next_offset(&[], 10), 10);
    }
}
