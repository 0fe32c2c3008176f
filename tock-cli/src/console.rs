//! Terminal stand-in for a chat channel.
//!
//! Lines typed on stdin become messages from the configured user. Bot output
//! is printed with the message id it was given, so `!react <id>` can react
//! to a delivered reminder.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tock_core::{
    ChannelId, ChannelSender, ChatMessage, Clock, CommandProcessor, MessageHandle, MessageId,
    Outcome, TODO_EMOJI, TaskStore, TockError, UserId, WARNING_EMOJI,
};
use tracing::{debug, error};

/// Prints outgoing messages instead of posting them.
#[derive(Debug, Default)]
pub struct ConsoleSender {
    next_id: AtomicU64,
}

impl ConsoleSender {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChannelSender for ConsoleSender {
    async fn send(&self, channel: &ChannelId, text: &str) -> tock_core::Result<MessageHandle> {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let id = MessageId::new(format!("c{n}"));
        println!("[#{channel} {id}] {text}");
        Ok(MessageHandle {
            channel: channel.clone(),
            id,
        })
    }

    async fn react(&self, message: &MessageHandle, emoji: &str) -> tock_core::Result<()> {
        println!("[#{} {}] +{emoji}", message.channel, message.id);
        Ok(())
    }
}

pub struct Console {
    pub processor: CommandProcessor,
    pub store: Arc<TaskStore>,
    pub clock: Clock,
    pub user: UserId,
    pub channel: ChannelId,
}

enum Line<'a> {
    Quit,
    Now,
    React(&'a str),
    Say(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some(("!react", id)) => Line::React(id.trim()),
        _ if line == "!quit" => Line::Quit,
        _ if line == "!now" => Line::Now,
        _ => Line::Say(line),
    }
}

impl Console {
    pub async fn run(&self) -> Result<()> {
        println!(
            "Talking as <@{}> in #{}. `!react <id>` files a reminder as a todo, `!now` shows \
             the bot's clock, `!quit` exits.",
            self.user, self.channel
        );
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match classify(&line) {
                Line::Quit => break,
                Line::Now => println!("{}", self.clock.now().format("%Y-%m-%d %H:%M:%S UTC")),
                Line::React(id) => {
                    let id = MessageId::new(id);
                    let result = self
                        .processor
                        .handle_reaction(&self.user, &self.channel, &id, TODO_EMOJI)
                        .await;
                    self.show(result);
                }
                Line::Say("") => {}
                Line::Say(text) => {
                    let msg = ChatMessage::new(self.user.clone(), self.channel.clone(), text);
                    let result = self.processor.handle_message(&msg).await;
                    self.show(result);
                }
            }
            if let Err(e) = self.store.save() {
                error!(error = %e, "failed to save store");
            }
        }
        Ok(())
    }

    fn show(&self, result: tock_core::Result<Outcome>) {
        match result {
            Ok(Outcome::Ignored) => debug!("no command matched"),
            Ok(Outcome::Replied(reply)) => {
                println!("{}", reply.text);
                if reply.delete_original {
                    println!("(your message was removed)");
                }
            }
            Ok(Outcome::Warned(warnings)) => {
                for w in warnings {
                    println!("{WARNING_EMOJI} {w}");
                }
            }
            Err(e @ TockError::MissingTimezone) => println!("{e}"),
            Err(e) if e.is_user_correctable() => println!("{WARNING_EMOJI} {e}"),
            Err(e) => {
                error!(error = %e, "command failed");
                println!("Something broke: {e}");
            }
        }
    }
}
