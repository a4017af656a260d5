use serde::{Deserialize, Serialize};

use super::{MessageId, ThreadId, UserId};

/// A message the bot's own message was replied to with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    #[serde(rename = "messageID")]
    pub message_id: MessageId,
    #[serde(rename = "senderID", default)]
    pub sender_id: Option<UserId>,
    #[serde(default)]
    pub body: String,
}

/// Inbound text message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadId,
    #[serde(rename = "messageID")]
    pub message_id: MessageId,
    #[serde(rename = "senderID")]
    pub sender_id: UserId,
    #[serde(default)]
    pub body: String,
    #[serde(rename = "messageReply", default)]
    pub message_reply: Option<ReplyRef>,
}

impl MessageEvent {
    pub fn new(
        thread_id: impl Into<ThreadId>,
        message_id: impl Into<MessageId>,
        sender_id: impl Into<UserId>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            message_id: message_id.into(),
            sender_id: sender_id.into(),
            body: body.into(),
            message_reply: None,
        }
    }

    pub fn replying_to(mut self, reply: ReplyRef) -> Self {
        self.message_reply = Some(reply);
        self
    }
}

/// Inbound reaction change
///
/// Reaction-added events place the reacting user in `userID`; `senderID` is
/// then the bot's own id or "0". A missing `reaction` means removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    #[serde(rename = "threadID")]
    pub thread_id: ThreadId,
    #[serde(rename = "messageID")]
    pub message_id: MessageId,
    #[serde(default)]
    pub reaction: Option<String>,
    #[serde(rename = "senderID", default)]
    pub sender_id: UserId,
    #[serde(rename = "userID", default)]
    pub user_id: Option<UserId>,
}

impl ReactionEvent {
    pub fn new(
        thread_id: impl Into<ThreadId>,
        message_id: impl Into<MessageId>,
        reaction: impl Into<String>,
        user_id: impl Into<UserId>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            message_id: message_id.into(),
            reaction: Some(reaction.into()),
            sender_id: UserId::default(),
            user_id: Some(user_id.into()),
        }
    }

    pub fn with_sender(mut self, sender_id: impl Into<UserId>) -> Self {
        self.sender_id = sender_id.into();
        self
    }

    /// The user who actually reacted
    pub fn actor(&self) -> &UserId {
        self.user_id
            .as_ref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.sender_id)
    }
}

/// Everything the platform adapter can deliver to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Message(MessageEvent),
    Reaction(ReactionEvent),
}

impl InboundEvent {
    pub fn thread_id(&self) -> &ThreadId {
        match self {
            InboundEvent::Message(m) => &m.thread_id,
            InboundEvent::Reaction(r) => &r.thread_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_prefers_user_id() {
        let event = ReactionEvent::new("t1", "m1", "👍", "U1").with_sender("0");
        assert_eq!(event.actor(), &UserId::new("U1"));

        let mut echo = event.clone();
        echo.user_id = None;
        assert_eq!(echo.actor(), &UserId::new("0"));
    }

    #[test]
    fn test_reaction_event_platform_shape() {
        let json = r#"{"type":"reaction","threadID":123,"messageID":"mid.9","reaction":"👍","senderID":"0","userID":" 77 "}"#;
        let event: InboundEvent = serde_json::from_str(json).unwrap();
        let InboundEvent::Reaction(reaction) = event else {
            panic!("expected reaction event");
        };
        assert_eq!(reaction.thread_id.as_str(), "123");
        assert_eq!(reaction.actor().as_str(), "77");
    }

    #[test]
    fn test_removal_has_no_reaction() {
        let json = r#"{"threadID":"t","messageID":"m","senderID":"0","userID":"5"}"#;
        let event: ReactionEvent = serde_json::from_str(json).unwrap();
        assert!(event.reaction.is_none());
    }
}
