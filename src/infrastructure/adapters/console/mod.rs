//! Console adapter for development/testing
//!
//! Lines typed on stdin become message events from a local user. Everything
//! the bot does is recorded, which also makes this the chat backend of the
//! test suite.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::{InboundEvent, MessageEvent, MessageId, ReactionEvent, ReplyRef, ThreadId, UserId};
use crate::domain::traits::{ChatApi, ThreadInfo, UserInfo};

pub const CONSOLE_THREAD: &str = "console";
pub const CONSOLE_USER: &str = "console-user";

/// A message the bot sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub body: String,
    pub reply_to: Option<MessageId>,
}

#[derive(Default)]
struct Recorded {
    sent: Vec<SentMessage>,
    edits: Vec<(MessageId, String)>,
    unsent: Vec<MessageId>,
    reactions: Vec<(MessageId, String)>,
    users: HashMap<UserId, UserInfo>,
    threads: HashMap<ThreadId, ThreadInfo>,
}

/// Console bot adapter for local development
pub struct ConsoleAdapter {
    bot_id: UserId,
    echo: bool,
    next_id: AtomicU64,
    next_inbound: AtomicU64,
    state: Mutex<Recorded>,
}

impl ConsoleAdapter {
    pub fn new(bot_id: impl Into<UserId>) -> Self {
        Self {
            bot_id: bot_id.into(),
            echo: false,
            next_id: AtomicU64::new(1),
            next_inbound: AtomicU64::new(1),
            state: Mutex::new(Recorded::default()),
        }
    }

    /// Print outgoing traffic to stdout
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    fn state(&self) -> MutexGuard<'_, Recorded> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_user(&self, info: UserInfo) {
        self.state().users.insert(info.id.clone(), info);
    }

    pub fn add_thread(&self, info: ThreadInfo) {
        self.state().threads.insert(info.id.clone(), info);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.state().sent.clone()
    }

    pub fn edits(&self) -> Vec<(MessageId, String)> {
        self.state().edits.clone()
    }

    pub fn unsent(&self) -> Vec<MessageId> {
        self.state().unsent.clone()
    }

    pub fn reactions(&self) -> Vec<(MessageId, String)> {
        self.state().reactions.clone()
    }

    fn inbound_id(&self) -> MessageId {
        MessageId::new(format!("in-{}", self.next_inbound.fetch_add(1, Ordering::Relaxed)))
    }

    /// Turn one typed line into an event
    ///
    /// - `:react <messageID> <emoji> [userID]` reacts to a message
    /// - `:reply <messageID> <text>` replies to a message the bot sent
    /// - anything else is a plain message
    pub fn parse_line(&self, line: &str, thread: &ThreadId, user: &UserId) -> Option<InboundEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(rest) = line.strip_prefix(":react ") {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            if parts.len() < 2 {
                return None;
            }
            let actor = parts.get(2).map(|u| UserId::new(u)).unwrap_or_else(|| user.clone());
            let event = ReactionEvent::new(thread.clone(), parts[0], parts[1], actor)
                .with_sender(self.bot_id.clone());
            return Some(InboundEvent::Reaction(event));
        }

        if let Some(rest) = line.strip_prefix(":reply ") {
            let (target, text) = rest.trim().split_once(char::is_whitespace)?;
            let target = MessageId::new(target);
            let replied = self.state().sent.iter().find(|m| m.id == target).cloned();
            let reply = ReplyRef {
                message_id: target,
                sender_id: Some(self.bot_id.clone()),
                body: replied.map(|m| m.body).unwrap_or_default(),
            };
            let message = MessageEvent::new(thread.clone(), self.inbound_id(), user.clone(), text.trim())
                .replying_to(reply);
            return Some(InboundEvent::Message(message));
        }

        Some(InboundEvent::Message(MessageEvent::new(
            thread.clone(),
            self.inbound_id(),
            user.clone(),
            line,
        )))
    }

    /// Read stdin until EOF, forwarding events to the dispatcher
    ///
    /// `:as <userID>` switches the local user.
    pub async fn run(&self, tx: mpsc::Sender<InboundEvent>) -> Result<(), BotError> {
        tracing::info!("Starting console bot (dev mode)");
        let thread = ThreadId::new(CONSOLE_THREAD);
        let mut user = UserId::new(CONSOLE_USER);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| BotError::Platform(e.to_string()))?
        {
            if let Some(next) = line.trim().strip_prefix(":as ") {
                user = UserId::new(next);
                println!("[console] now speaking as {}", user);
                continue;
            }
            if let Some(event) = self.parse_line(&line, &thread, &user) {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        }
        tracing::info!("Console input closed");
        Ok(())
    }
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new("console-bot").with_echo(true)
    }
}

#[async_trait]
impl ChatApi for ConsoleAdapter {
    async fn send_message(
        &self,
        thread_id: &ThreadId,
        body: &str,
        reply_to: Option<&MessageId>,
    ) -> Result<MessageId, BotError> {
        let id = MessageId::new(format!("console-{}", self.next_id.fetch_add(1, Ordering::Relaxed)));
        if self.echo {
            println!("[BOT {}] {}", id, body);
        }
        self.state().sent.push(SentMessage {
            id: id.clone(),
            thread_id: thread_id.clone(),
            body: body.to_string(),
            reply_to: reply_to.cloned(),
        });
        Ok(id)
    }

    async fn edit_message(
        &self,
        _thread_id: &ThreadId,
        message_id: &MessageId,
        body: &str,
    ) -> Result<(), BotError> {
        let mut state = self.state();
        let Some(message) = state.sent.iter_mut().find(|m| &m.id == message_id) else {
            return Err(BotError::Platform(format!("Unknown message {}", message_id)));
        };
        message.body = body.to_string();
        state.edits.push((message_id.clone(), body.to_string()));
        if self.echo {
            println!("[BOT {} edited] {}", message_id, body);
        }
        Ok(())
    }

    async fn unsend_message(&self, _thread_id: &ThreadId, message_id: &MessageId) -> Result<(), BotError> {
        if self.echo {
            println!("[BOT {} unsent]", message_id);
        }
        self.state().unsent.push(message_id.clone());
        Ok(())
    }

    async fn set_reaction(
        &self,
        _thread_id: &ThreadId,
        message_id: &MessageId,
        reaction: &str,
    ) -> Result<(), BotError> {
        if self.echo {
            println!("[BOT reacted {} on {}]", reaction, message_id);
        }
        self.state()
            .reactions
            .push((message_id.clone(), reaction.to_string()));
        Ok(())
    }

    async fn user_info(&self, user_id: &UserId) -> Result<Option<UserInfo>, BotError> {
        Ok(self.state().users.get(user_id).cloned())
    }

    async fn thread_info(&self, thread_id: &ThreadId) -> Result<Option<ThreadInfo>, BotError> {
        Ok(self.state().threads.get(thread_id).cloned())
    }

    fn bot_id(&self) -> UserId {
        self.bot_id.clone()
    }
}
