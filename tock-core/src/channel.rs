//! Identifiers and the outbound side of a chat platform.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TockError};

/// Reaction that files a delivered reminder into the todo list.
pub const TODO_EMOJI: &str = "📝";

/// Reaction on a message the bot could not make sense of.
pub const WARNING_EMOJI: &str = "⚠️";

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(UserId);
string_id!(ChannelId);
string_id!(MessageId);

impl UserId {
    /// `<@id>`, the platform's mention syntax.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

/// A message the bot has posted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    pub channel: ChannelId,
    pub id: MessageId,
}

/// Where the bot's own messages go.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send(&self, channel: &ChannelId, text: &str) -> Result<MessageHandle>;

    async fn react(&self, message: &MessageHandle, emoji: &str) -> Result<()>;
}

/// One message captured by [`RecordingSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub handle: MessageHandle,
    pub text: String,
    pub reactions: Vec<String>,
}

/// Keeps every send in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.text.clone()).collect()
    }
}

#[async_trait]
impl ChannelSender for RecordingSender {
    async fn send(&self, channel: &ChannelId, text: &str) -> Result<MessageHandle> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TockError::Delivery(format!("channel {channel} unreachable")));
        }
        let mut sent = self.sent.lock();
        let handle = MessageHandle {
            channel: channel.clone(),
            id: MessageId::new(format!("m{}", sent.len() + 1)),
        };
        sent.push(SentMessage {
            handle: handle.clone(),
            text: text.to_string(),
            reactions: Vec::new(),
        });
        Ok(handle)
    }

    async fn react(&self, message: &MessageHandle, emoji: &str) -> Result<()> {
        let mut sent = self.sent.lock();
        let Some(entry) = sent.iter_mut().find(|m| m.handle == *message) else {
            return Err(TockError::Delivery(format!("no message {}", message.id)));
        };
        entry.reactions.push(emoji.to_string());
        Ok(())
    }
}
