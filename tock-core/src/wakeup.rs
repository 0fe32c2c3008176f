//! The daily todo digest ("wakeup").
//!
//! Each user has at most one. It fires at a fixed UTC clock reading every day
//! and posts the user's todo list to the channel it was set up in.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelId, UserId};
use crate::task::{Schedule, Task};
use crate::time::{on_today, tz_convert_time};

/// Local clock reading a new wakeup starts at.
pub const DEFAULT_LOCAL_HOUR: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wakeup {
    pub user: UserId,
    pub channel: ChannelId,
    /// UTC clock reading.
    pub time: NaiveTime,
    #[serde(default)]
    pub disabled: bool,
    #[serde(skip)]
    pub last_activated: Option<DateTime<Utc>>,
}

impl Wakeup {
    pub fn new(user: UserId, channel: ChannelId, time: NaiveTime) -> Self {
        Self {
            user,
            channel,
            time,
            disabled: false,
            last_activated: None,
        }
    }

    /// 6AM in the user's zone as a UTC reading; 6AM UTC without a zone.
    pub fn default_time(tz: Option<Tz>, now: DateTime<Utc>) -> NaiveTime {
        let six = NaiveTime::from_hms_opt(DEFAULT_LOCAL_HOUR, 0, 0).unwrap_or_default();
        match tz {
            Some(tz) => tz_convert_time(six, tz, Tz::UTC, now),
            None => six,
        }
    }

    /// The digest text, or `None` when there is nothing to remind about.
    pub fn digest(&self, todos: &[String]) -> Option<String> {
        if todos.is_empty() {
            return None;
        }
        Some(format!(
            "Good morning, {}! Here is your current todo list:\n{}",
            self.user.mention(),
            numbered_list(todos)
        ))
    }
}

/// A fenced, 1-based numbered list.
pub fn numbered_list(items: &[String]) -> String {
    let lines: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}) {item}", i + 1))
        .collect();
    format!("```\n{}\n```", lines.join("\n"))
}

impl Schedule for Wakeup {
    fn next_activation(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = on_today(self.time, now);
        if today < now {
            today + Duration::days(1)
        } else {
            today
        }
    }
}

impl Task for Wakeup {
    fn last_activated(&self) -> Option<DateTime<Utc>> {
        self.last_activated
    }

    fn record_activation(&mut self, at: DateTime<Utc>) {
        self.last_activated = Some(at);
    }

    fn should_activate(&self, now: DateTime<Utc>) -> bool {
        if self.disabled || !self.soon_past_activation(now) {
            return false;
        }
        self.last_activated
            .is_none_or(|last| now - last > Duration::seconds(crate::task::REPEAT_THRESHOLD_SECS))
    }
}
