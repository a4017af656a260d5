//! Pending-interaction store
//!
//! Lets a command that just sent a prompt be called back when a specific
//! reaction or reply to that prompt arrives. Three tables share the same
//! [`WaiterTable`] mechanism: generic reaction waiters, reply waiters and
//! loan requests.

pub mod table;

use serde_json::Value;
use std::time::Duration;

use crate::application::loan::LoanRequest;
use crate::domain::entities::{MessageId, ThreadId, UserId};

pub use table::{Pending, WaiterId, WaiterTable, DEFAULT_TTL};

/// Interest in a future reaction on one outbound message
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionWaiter<T = Value> {
    pub message_id: MessageId,
    pub command: String,
    pub expected_reaction: Option<String>,
    pub expected_sender: Option<UserId>,
    pub persistent: bool,
    pub data: T,
}

impl ReactionWaiter<Value> {
    pub fn new(message_id: impl Into<MessageId>, command: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            command: command.into(),
            expected_reaction: None,
            expected_sender: None,
            persistent: false,
            data: Value::Null,
        }
    }
}

impl<T> ReactionWaiter<T> {
    pub fn with_data<U>(self, data: U) -> ReactionWaiter<U> {
        ReactionWaiter {
            message_id: self.message_id,
            command: self.command,
            expected_reaction: self.expected_reaction,
            expected_sender: self.expected_sender,
            persistent: self.persistent,
            data,
        }
    }

    pub fn expect_reaction(mut self, reaction: impl Into<String>) -> Self {
        self.expected_reaction = Some(reaction.into());
        self
    }

    pub fn expect_sender(mut self, sender: impl Into<UserId>) -> Self {
        self.expected_sender = Some(sender.into());
        self
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    /// Each constraint is optional; an unset one matches anything
    pub fn matches(&self, reaction: &str, reactor: &UserId) -> bool {
        self.expected_reaction.as_deref().map_or(true, |r| r == reaction)
            && self.expected_sender.as_ref().map_or(true, |s| s == reactor)
    }
}

/// Interest in a text reply to a prompt, from one specific user
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyWaiter {
    pub message_id: MessageId,
    pub command: String,
    pub expected_sender: UserId,
    pub data: Value,
}

impl ReplyWaiter {
    pub fn new(
        message_id: impl Into<MessageId>,
        command: impl Into<String>,
        expected_sender: impl Into<UserId>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            command: command.into(),
            expected_sender: expected_sender.into(),
            data: Value::Null,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Process-scoped correlation state, shared by the dispatcher and commands
#[derive(Clone)]
pub struct InteractionStore {
    pub reactions: WaiterTable<MessageId, ReactionWaiter>,
    pub replies: WaiterTable<ThreadId, ReplyWaiter>,
    pub loans: WaiterTable<MessageId, ReactionWaiter<LoanRequest>>,
}

impl InteractionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            reactions: WaiterTable::new(ttl),
            replies: WaiterTable::new(ttl),
            loans: WaiterTable::new(ttl),
        }
    }

    pub fn create_reaction(&self, waiter: ReactionWaiter) -> WaiterId {
        tracing::debug!(
            "Waiting for reaction on {} for command {}",
            waiter.message_id,
            waiter.command
        );
        let persistent = waiter.persistent;
        self.reactions.insert(waiter.message_id.clone(), waiter, persistent)
    }

    pub fn create_reply(&self, thread_id: ThreadId, waiter: ReplyWaiter) -> WaiterId {
        tracing::debug!(
            "Waiting for reply to {} in {} for command {}",
            waiter.message_id,
            thread_id,
            waiter.command
        );
        self.replies.insert(thread_id, waiter, false)
    }

    /// Register a loan prompt; only the lender's reaction can resolve it
    pub fn create_loan(&self, message_id: MessageId, request: LoanRequest) -> WaiterId {
        let waiter = ReactionWaiter::new(message_id.clone(), "loan")
            .expect_sender(request.lender_id.clone())
            .with_data(request);
        self.loans.insert(message_id, waiter, false)
    }

    /// First live reaction waiter on `message_id` accepting this reaction
    pub fn match_reaction(
        &self,
        message_id: &MessageId,
        reaction: &str,
        reactor: &UserId,
    ) -> Option<Pending<ReactionWaiter>> {
        self.reactions.find(message_id, |w| w.matches(reaction, reactor))
    }

    /// Consume the reply waiter for `prompt_id` in this thread, if `sender` is
    /// the user it waits for
    pub fn take_reply(
        &self,
        thread_id: &ThreadId,
        prompt_id: &MessageId,
        sender: &UserId,
    ) -> Option<ReplyWaiter> {
        self.replies
            .take(thread_id, |w| &w.message_id == prompt_id && &w.expected_sender == sender)
            .map(|p| p.value)
    }

    pub fn purge_expired(&self) -> usize {
        self.reactions.purge_expired() + self.replies.purge_expired() + self.loans.purge_expired()
    }
}

impl Default for InteractionStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(id: &str) -> UserId {
        UserId::new(id)
    }

    #[tokio::test]
    async fn test_specificity_levels() {
        let store = InteractionStore::default();
        let m1 = MessageId::new("m1");
        store.create_reaction(
            ReactionWaiter::new("m1", "poll")
                .expect_reaction("👍")
                .expect_sender("U1"),
        );

        assert!(store.match_reaction(&m1, "👍", &u("U2")).is_none());
        assert!(store.match_reaction(&m1, "👎", &u("U1")).is_none());
        assert!(store.match_reaction(&m1, "👍", &u("U1")).is_some());

        let m2 = MessageId::new("m2");
        store.create_reaction(ReactionWaiter::new("m2", "poll"));
        assert!(store.match_reaction(&m2, "😆", &u("anyone")).is_some());
    }

    #[tokio::test]
    async fn test_sender_only_and_reaction_only() {
        let store = InteractionStore::default();
        let m = MessageId::new("m");
        store.create_reaction(ReactionWaiter::new("m", "a").expect_sender("U1"));
        store.create_reaction(ReactionWaiter::new("m", "b").expect_reaction("❤"));

        let hit = store.match_reaction(&m, "❤", &u("U9")).unwrap();
        assert_eq!(hit.value.command, "b");
        let hit = store.match_reaction(&m, "❤", &u("U1")).unwrap();
        assert_eq!(hit.value.command, "a");
    }

    #[tokio::test]
    async fn test_reply_requires_prompt_and_sender() {
        let store = InteractionStore::default();
        let thread = ThreadId::new("t1");
        store.create_reply(thread.clone(), ReplyWaiter::new("p1", "cleanup", "owner"));

        assert!(store.take_reply(&thread, &MessageId::new("p2"), &u("owner")).is_none());
        assert!(store.take_reply(&thread, &MessageId::new("p1"), &u("other")).is_none());
        let waiter = store.take_reply(&thread, &MessageId::new("p1"), &u("owner")).unwrap();
        assert_eq!(waiter.command, "cleanup");
        assert!(store.take_reply(&thread, &MessageId::new("p1"), &u("owner")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_waiter_expires() {
        let store = InteractionStore::default();
        let thread = ThreadId::new("t1");
        store.create_reply(thread.clone(), ReplyWaiter::new("p1", "update", "owner"));

        tokio::time::advance(DEFAULT_TTL + Duration::from_secs(1)).await;
        assert!(store.take_reply(&thread, &MessageId::new("p1"), &u("owner")).is_none());
    }
}
