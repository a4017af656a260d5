//! Command handler contract and the contexts handlers receive

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::application::errors::{BotError, CommandError};
use crate::application::interactions::{InteractionStore, ReplyWaiter};
use crate::application::registry::{CommandDescriptor, CommandRegistry};
use crate::application::services::CooldownTracker;
use crate::domain::entities::{MessageEvent, MessageId, ReactionEvent, ThreadId, UserId};
use crate::domain::traits::{ChatApi, Store};
use crate::infrastructure::config::ConfigHandle;
use crate::infrastructure::remote::RemoteClients;

/// What a command unit's `handler` kind binds to
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Run the command for a prefixed message
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError>;

    fn handles_reactions(&self) -> bool {
        false
    }

    /// Called when a reaction waiter registered for this command matches
    async fn handle_reaction(&self, _ctx: &ReactionContext) -> Result<(), CommandError> {
        Ok(())
    }

    fn handles_replies(&self) -> bool {
        false
    }

    /// Called when the expected user replies to a prompt this command registered
    async fn handle_reply(&self, _ctx: &ReplyContext) -> Result<(), CommandError> {
        Ok(())
    }
}

/// Process-scoped collaborators, passed into every handler
#[derive(Clone)]
pub struct Services {
    pub api: Arc<dyn ChatApi>,
    pub store: Arc<dyn Store>,
    pub config: ConfigHandle,
    pub registry: Arc<CommandRegistry>,
    pub interactions: InteractionStore,
    pub cooldowns: Arc<CooldownTracker>,
    pub remote: RemoteClients,
    /// Working directory that relative file paths resolve against
    pub root: PathBuf,
    /// Notified when the process should exit for its supervisor to relaunch it
    pub shutdown: Arc<Notify>,
}

impl Services {
    pub fn new(
        api: Arc<dyn ChatApi>,
        store: Arc<dyn Store>,
        config: ConfigHandle,
        registry: Arc<CommandRegistry>,
    ) -> Self {
        let ttl = std::time::Duration::from_secs(config.read(|c| c.interaction_ttl_secs));
        Self {
            api,
            store,
            config,
            registry,
            interactions: InteractionStore::new(ttl),
            cooldowns: Arc::new(CooldownTracker::new()),
            remote: RemoteClients::default(),
            root: PathBuf::from("."),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn with_remote(mut self, remote: RemoteClients) -> Self {
        self.remote = remote;
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_interactions(mut self, interactions: InteractionStore) -> Self {
        self.interactions = interactions;
        self
    }
}

pub struct CommandContext {
    pub services: Services,
    pub message: MessageEvent,
    pub command: Arc<CommandDescriptor>,
    /// Whitespace-split arguments after the command name
    pub args: Vec<String>,
    /// Everything after the command name, line breaks preserved
    pub raw_args: String,
}

impl CommandContext {
    pub fn sender(&self) -> &UserId {
        &self.message.sender_id
    }

    pub fn thread(&self) -> &ThreadId {
        &self.message.thread_id
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Arguments from `index` on, joined by single spaces
    pub fn rest(&self, index: usize) -> String {
        self.args.get(index..).map(|a| a.join(" ")).unwrap_or_default()
    }

    /// Raw text after the first `skip` arguments, line breaks intact
    pub fn raw_after(&self, skip: usize) -> &str {
        let mut rest = self.raw_args.as_str();
        for _ in 0..skip {
            rest = rest.trim_start();
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            rest = &rest[end..];
        }
        rest.trim_start()
    }

    pub fn prefix(&self) -> String {
        self.services.config.read(|c| c.prefix.clone())
    }

    /// Answer in the thread as a reply to the triggering message
    pub async fn reply(&self, body: &str) -> Result<MessageId, BotError> {
        self.services
            .api
            .send_message(&self.message.thread_id, body, Some(&self.message.message_id))
            .await
    }

    pub async fn send(&self, body: &str) -> Result<MessageId, BotError> {
        self.services.api.send_message(&self.message.thread_id, body, None).await
    }

    /// Register a reply waiter for `prompt`, answered by the current sender
    pub fn expect_reply(&self, prompt: MessageId, data: Value) {
        let waiter = ReplyWaiter::new(prompt, self.command.name(), self.sender().clone()).with_data(data);
        self.services
            .interactions
            .create_reply(self.thread().clone(), waiter);
    }
}

pub struct ReactionContext {
    pub services: Services,
    pub event: ReactionEvent,
    pub command: Arc<CommandDescriptor>,
    pub data: Value,
}

impl ReactionContext {
    /// The user who reacted
    pub fn actor(&self) -> &UserId {
        self.event.actor()
    }

    pub fn reaction(&self) -> &str {
        self.event.reaction.as_deref().unwrap_or_default()
    }
}

pub struct ReplyContext {
    pub services: Services,
    pub message: MessageEvent,
    pub command: Arc<CommandDescriptor>,
    pub waiter: ReplyWaiter,
}

impl ReplyContext {
    pub fn data(&self) -> &Value {
        &self.waiter.data
    }

    pub fn body(&self) -> &str {
        self.message.body.trim()
    }

    pub async fn reply(&self, body: &str) -> Result<MessageId, BotError> {
        self.services
            .api
            .send_message(&self.message.thread_id, body, Some(&self.message.message_id))
            .await
    }

    pub async fn send(&self, body: &str) -> Result<MessageId, BotError> {
        self.services.api.send_message(&self.message.thread_id, body, None).await
    }
}
