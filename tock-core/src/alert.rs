//! User reminders: a message, who asked for it, where it goes, and when.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::channel::{ChannelId, ChannelSender, MessageHandle, TODO_EMOJI, UserId};
use crate::error::Result;
use crate::task::{Schedule, Task, Timing};
use crate::time::{date_suffix, logical_dt_repr, logical_time_repr};

pub type TaskId = u64;

const DAY_SECS: i64 = 86_400;
const WEEK_SECS: i64 = 7 * DAY_SECS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: TaskId,
    pub user: UserId,
    pub channel: ChannelId,
    pub message: String,
    /// Short label shown in listings, e.g. `[daily]`.
    #[serde(default)]
    pub tag: String,
    pub timing: Timing,
    #[serde(skip)]
    pub last_activated: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(
        id: TaskId,
        user: UserId,
        channel: ChannelId,
        message: impl Into<String>,
        timing: impl Into<Timing>,
    ) -> Self {
        Self {
            id,
            user,
            channel,
            message: message.into(),
            tag: String::new(),
            timing: timing.into(),
            last_activated: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn render(&self) -> String {
        format!(
            "Hey {}, this is a reminder to {}.",
            self.user.mention(),
            self.message
        )
    }

    /// Post the reminder and offer the todo reaction on it.
    pub async fn activate(&self, sender: &dyn ChannelSender) -> Result<MessageHandle> {
        let handle = sender.send(&self.channel, &self.render()).await?;
        sender.react(&handle, TODO_EMOJI).await?;
        Ok(handle)
    }

    /// Like [`Alert::activate`], but a failed delivery is logged, not returned.
    pub async fn deliver(&self, sender: &dyn ChannelSender) -> Option<MessageHandle> {
        match self.activate(sender).await {
            Ok(handle) => {
                debug!(alert = self.id, user = %self.user, "reminder delivered");
                Some(handle)
            }
            Err(e) => {
                warn!(alert = self.id, user = %self.user, "reminder delivery failed: {e}");
                None
            }
        }
    }

    /// Claim and deliver if due. `true` when the alert fired, even if the
    /// delivery itself failed.
    pub async fn maybe_activate(&mut self, now: DateTime<Utc>, sender: &dyn ChannelSender) -> bool {
        if !self.claim(now) {
            return false;
        }
        self.deliver(sender).await;
        true
    }

    /// The alert as the user would describe it, e.g.
    /// `your daily reminder at 8AM to wake up`.
    pub fn full_desc(&self, tz: Tz, now: DateTime<Utc>) -> String {
        let next = self.timing.next_activation(now);
        let when = match &self.timing {
            Timing::Periodic(p) if p.period_secs == DAY_SECS => {
                format!("daily reminder at {}", logical_time_repr(next, tz))
            }
            Timing::Periodic(p) if p.period_secs == WEEK_SECS => {
                format!(
                    "weekly reminder at {} on {}s",
                    logical_time_repr(next, tz),
                    next.with_timezone(&tz).format("%A")
                )
            }
            Timing::Periodic(_) => format!("repeating reminder at {}", logical_time_repr(next, tz)),
            Timing::Monthly(m) => format!(
                "reminder on the {}{} of each month at {}",
                m.day,
                date_suffix(m.day),
                logical_time_repr(next, tz)
            ),
            Timing::Single(s) => format!("reminder {}", logical_dt_repr(s.activation, tz, now)),
        };
        format!("your {when} to {}", self.message)
    }
}

impl Schedule for Alert {
    fn next_activation(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.timing.next_activation(now)
    }

    fn soon_past_activation(&self, now: DateTime<Utc>) -> bool {
        self.timing.soon_past_activation(now)
    }

    fn is_repeatable(&self) -> bool {
        self.timing.is_repeatable()
    }
}

impl Task for Alert {
    fn last_activated(&self) -> Option<DateTime<Utc>> {
        self.last_activated
    }

    fn record_activation(&mut self, at: DateTime<Utc>) {
        self.last_activated = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RecordingSender;
    use crate::task::{MonthlyTask, PeriodicTask, SingleTask};
    use chrono::{Duration, NaiveTime, TimeZone};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn eastern() -> Tz {
        "US/Eastern".parse().unwrap()
    }

    fn alert(timing: impl Into<Timing>) -> Alert {
        Alert::new(7, UserId::new("u1"), ChannelId::new("c1"), "wake up", timing)
    }

    #[test]
    fn describes_each_timing() {
        let now = utc(2026, 10, 18, 9, 0);
        let tz = eastern();

        let daily = alert(PeriodicTask::daily(utc(2026, 10, 18, 12, 0)));
        assert_eq!(daily.full_desc(tz, now), "your daily reminder at 8AM to wake up");

        let weekly = alert(PeriodicTask::weekly(utc(2026, 10, 20, 12, 30)));
        assert_eq!(
            weekly.full_desc(tz, now),
            "your weekly reminder at 8:30AM on Tuesdays to wake up"
        );

        let monthly = alert(MonthlyTask::new(3, NaiveTime::from_hms_opt(9, 0, 0).unwrap(), tz));
        assert_eq!(
            monthly.full_desc(tz, now),
            "your reminder on the 3rd of each month at 9AM to wake up"
        );

        let single = alert(SingleTask::new(utc(2026, 10, 21, 17, 5)));
        assert_eq!(
            single.full_desc(tz, now),
            "your reminder on the 21st at 1:05PM to wake up"
        );
    }

    #[test]
    fn persisted_form_drops_runtime_state() {
        let mut a = alert(SingleTask::new(utc(2026, 10, 21, 17, 5))).with_tag("[once]");
        a.last_activated = Some(utc(2026, 10, 21, 17, 5));
        let back: Alert = serde_json::from_str(&serde_json::to_string(&a).unwrap()).unwrap();
        assert_eq!(back.last_activated, None);
        assert_eq!(back.tag, "[once]");
        assert_eq!(back.timing, a.timing);
    }

    #[tokio::test]
    async fn maybe_activate_sends_once_and_reacts() {
        let sender = RecordingSender::new();
        let at = utc(2026, 10, 18, 12, 0);
        let mut a = alert(PeriodicTask::daily(at));

        assert!(!a.maybe_activate(at - Duration::minutes(1), &sender).await);
        assert!(a.maybe_activate(at, &sender).await);
        assert!(!a.maybe_activate(at + Duration::seconds(10), &sender).await);

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "Hey <@u1>, this is a reminder to wake up.");
        assert_eq!(sent[0].reactions, vec![TODO_EMOJI.to_string()]);
    }

    #[tokio::test]
    async fn failed_delivery_still_counts_as_fired() {
        let sender = RecordingSender::new();
        sender.set_failing(true);
        let at = utc(2026, 10, 18, 12, 0);
        let mut a = alert(SingleTask::new(at));
        assert!(a.maybe_activate(at + Duration::seconds(5), &sender).await);
        assert!(sender.sent().is_empty());
    }
}
