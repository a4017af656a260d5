//! Event dispatcher - the single entry point for inbound platform events
//!
//! Every stage is fallible internally but nothing escapes `dispatch`: errors
//! are logged and, for commands, reported back to the thread.

use std::sync::Arc;
use std::time::Duration;

use super::parser::MessageParser;
use crate::application::errors::{BotError, CommandError};
use crate::application::handler::{CommandContext, ReactionContext, ReplyContext, Services};
use crate::application::loan::{self, LoanOutcome};
use crate::application::services::{check_access, denial_message, required_level};
use crate::domain::entities::{InboundEvent, MessageEvent, ReactionEvent, ThreadId, UserId};
use crate::infrastructure::config::DEFAULT_UNSEND_REACTION;

const LOAN_FAILURE: &str = "❌ An error occurred while processing the loan request.";

/// Where a reaction event stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// The reaction was taken away
    Removal,
    CommandsDisabled,
    Banned,
    Unsent,
    Loan(LoanOutcome),
    /// A waiter matched and its command's reaction handler ran
    Handled { command: String },
    NoWaiter,
    NoHandler,
    Failed,
}

/// Where a text message stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    CommandsDisabled,
    Banned,
    /// A reply waiter matched and its command's reply handler ran
    Reply { command: String },
    Command { name: String, success: bool },
    UnknownCommand,
    Denied,
    CoolingDown,
    /// Not addressed to the bot
    Ignored,
    Failed,
}

pub struct EventDispatcher {
    services: Services,
}

impl EventDispatcher {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub async fn dispatch(&self, event: InboundEvent) {
        match event {
            InboundEvent::Reaction(reaction) => {
                let outcome = self.handle_reaction(reaction).await;
                tracing::debug!("Reaction outcome: {:?}", outcome);
            }
            InboundEvent::Message(message) => {
                let outcome = self.handle_message(message).await;
                tracing::debug!("Message outcome: {:?}", outcome);
            }
        }
    }

    // Reactions

    pub async fn handle_reaction(&self, event: ReactionEvent) -> ReactionOutcome {
        let Some(reaction) = event.reaction.clone().filter(|r| !r.is_empty()) else {
            return ReactionOutcome::Removal;
        };
        match self.route_reaction(&event, &reaction).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Error handling reaction on {}: {}", event.message_id, e);
                ReactionOutcome::Failed
            }
        }
    }

    async fn route_reaction(&self, event: &ReactionEvent, reaction: &str) -> Result<ReactionOutcome, BotError> {
        let services = &self.services;
        if !services.config.read(|c| c.command_enabled) {
            return Ok(ReactionOutcome::CommandsDisabled);
        }

        let actor = event.actor().clone();
        if self.is_banned(&actor, &event.thread_id).await? {
            return Ok(ReactionOutcome::Banned);
        }

        if reaction == self.unsend_reaction() {
            let sender = &event.sender_id;
            if sender.is_unknown() || *sender == services.api.bot_id() {
                match services
                    .api
                    .unsend_message(&event.thread_id, &event.message_id)
                    .await
                {
                    Ok(()) => {
                        tracing::info!("Unsent {} on {}'s reaction", event.message_id, actor);
                        return Ok(ReactionOutcome::Unsent);
                    }
                    Err(e) => tracing::warn!("Failed to unsend {}: {}", event.message_id, e),
                }
            }
        }

        let pending_loan = loan::is_loan_reaction(reaction)
            && services
                .interactions
                .loans
                .find(&event.message_id, |w| w.data.lender_id == actor)
                .is_some();
        if pending_loan {
            return match loan::resolve(services, &event.thread_id, &event.message_id, &actor, reaction).await {
                Ok(outcome) => Ok(ReactionOutcome::Loan(outcome)),
                Err(e) => {
                    tracing::error!("Error processing loan on {}: {}", event.message_id, e);
                    if let Err(e) = services.api.send_message(&event.thread_id, LOAN_FAILURE, None).await {
                        tracing::warn!("Could not report loan failure: {}", e);
                    }
                    Ok(ReactionOutcome::Failed)
                }
            };
        }

        let Some(pending) = services
            .interactions
            .match_reaction(&event.message_id, reaction, &actor)
        else {
            return Ok(ReactionOutcome::NoWaiter);
        };
        let waiter = pending.value;
        let Some(command) = services
            .registry
            .get(&waiter.command)
            .filter(|c| c.handler().handles_reactions())
        else {
            tracing::debug!("Command {} has no reaction handler", waiter.command);
            return Ok(ReactionOutcome::NoHandler);
        };

        // Consume before running so a duplicate event cannot fire it again
        if !pending.persistent && !services.interactions.reactions.remove(&event.message_id, pending.id) {
            return Ok(ReactionOutcome::NoWaiter);
        }

        let ctx = ReactionContext {
            services: services.clone(),
            event: event.clone(),
            command: command.clone(),
            data: waiter.data,
        };
        if let Err(e) = command.handler().handle_reaction(&ctx).await {
            tracing::error!("Reaction handler of {} failed: {}", command.name(), e);
        }
        self.touch(actor, event.thread_id.clone());
        Ok(ReactionOutcome::Handled {
            command: command.name().to_string(),
        })
    }

    /// The configured unsend emoji, written into the config on first use
    fn unsend_reaction(&self) -> String {
        let config = &self.services.config;
        if let Some(reaction) = config.read(|c| c.unsend_reaction.clone()) {
            return reaction;
        }
        if let Err(e) = config.update(|c| {
            c.unsend_reaction
                .get_or_insert_with(|| DEFAULT_UNSEND_REACTION.to_string())
                .clone()
        }) {
            tracing::warn!("Could not persist default unsend reaction: {}", e);
        }
        DEFAULT_UNSEND_REACTION.to_string()
    }

    // Messages

    pub async fn handle_message(&self, event: MessageEvent) -> MessageOutcome {
        match self.route_message(&event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Error handling message {}: {}", event.message_id, e);
                MessageOutcome::Failed
            }
        }
    }

    async fn route_message(&self, event: &MessageEvent) -> Result<MessageOutcome, BotError> {
        let services = &self.services;
        if !services.config.read(|c| c.command_enabled) {
            return Ok(MessageOutcome::CommandsDisabled);
        }
        if self.is_banned(&event.sender_id, &event.thread_id).await? {
            return Ok(MessageOutcome::Banned);
        }

        let outcome = match self.route_reply(event).await? {
            Some(outcome) => outcome,
            None => self.route_command(event).await?,
        };
        self.touch(event.sender_id.clone(), event.thread_id.clone());
        Ok(outcome)
    }

    async fn route_reply(&self, event: &MessageEvent) -> Result<Option<MessageOutcome>, BotError> {
        let services = &self.services;
        let Some(replied) = &event.message_reply else {
            return Ok(None);
        };
        let Some(waiter) = services
            .interactions
            .take_reply(&event.thread_id, &replied.message_id, &event.sender_id)
        else {
            return Ok(None);
        };

        let Some(command) = services
            .registry
            .get(&waiter.command)
            .filter(|c| c.handler().handles_replies())
        else {
            tracing::warn!("Reply waiter for {} has no live reply handler", waiter.command);
            return Ok(None);
        };

        let ctx = ReplyContext {
            services: services.clone(),
            message: event.clone(),
            command: command.clone(),
            waiter,
        };
        if let Err(e) = command.handler().handle_reply(&ctx).await {
            tracing::error!("Reply handler of {} failed: {}", command.name(), e);
            ctx.reply(&format!("❌ {}", e)).await?;
        }
        Ok(Some(MessageOutcome::Reply {
            command: command.name().to_string(),
        }))
    }

    async fn route_command(&self, event: &MessageEvent) -> Result<MessageOutcome, BotError> {
        let services = &self.services;
        let config = services.config.get();
        let Some(parsed) = MessageParser::new(config.prefix.clone()).parse(&event.body) else {
            return Ok(MessageOutcome::Ignored);
        };

        let Some(command) = services.registry.get(&parsed.name) else {
            let notice = format!(
                "❌ Command {} not found. Use {}help to see available commands.",
                parsed.name, config.prefix
            );
            services
                .api
                .send_message(&event.thread_id, &notice, Some(&event.message_id))
                .await?;
            return Ok(MessageOutcome::UnknownCommand);
        };

        let thread = services.store.find_thread(&event.thread_id).await?;
        if let Err(CommandError::PermissionDenied) =
            check_access(&config, &command.config, thread.as_ref(), &event.sender_id)
        {
            let required = required_level(&config, &command.config, thread.as_ref());
            services
                .api
                .send_message(&event.thread_id, &denial_message(required), Some(&event.message_id))
                .await?;
            return Ok(MessageOutcome::Denied);
        }

        let cooldown = Duration::from_secs(command.config.cooldown);
        if let Err(remaining) = services
            .cooldowns
            .check(&event.sender_id, command.name(), cooldown)
        {
            let notice = format!(
                "⏳ Please wait {}s before using {} again.",
                remaining.as_secs().max(1),
                command.name()
            );
            services
                .api
                .send_message(&event.thread_id, &notice, Some(&event.message_id))
                .await?;
            return Ok(MessageOutcome::CoolingDown);
        }

        tracing::info!("{} ran {} in {}", event.sender_id, command.name(), event.thread_id);
        let ctx = CommandContext {
            services: services.clone(),
            message: event.clone(),
            command: Arc::clone(&command),
            args: parsed.args,
            raw_args: parsed.raw_args,
        };
        let success = match command.handler().run(&ctx).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Command {} failed: {}", command.name(), e);
                ctx.reply(&format!("❌ {}", e)).await?;
                false
            }
        };
        Ok(MessageOutcome::Command {
            name: command.name().to_string(),
            success,
        })
    }

    // Shared

    async fn is_banned(&self, user: &UserId, thread: &ThreadId) -> Result<bool, BotError> {
        let store = &self.services.store;
        Ok(store.is_user_banned(user).await? || store.is_thread_banned(thread).await?)
    }

    /// Record activity without holding up the response
    fn touch(&self, user: UserId, thread: ThreadId) {
        let store = self.services.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.touch_user(&user, &thread).await {
                tracing::debug!("Could not update last-active for {}: {}", user, e);
            }
            if let Err(e) = store.touch_thread(&thread).await {
                tracing::debug!("Could not update last-active for {}: {}", thread, e);
            }
        });
    }
}
