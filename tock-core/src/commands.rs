//! Chat commands: the grammar every message is parsed with, and the handlers
//! that act on the store.
//!
//! Handlers are synchronous and return an [`Outcome`] for the caller to show.
//! The only thing the processor posts on its own is the one-time wakeup
//! announcement, which goes to the channel the user is talking in.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::alert::Alert;
use crate::channel::{ChannelId, ChannelSender, MessageId, TODO_EMOJI, UserId};
use crate::clock::Clock;
use crate::error::{Result, TockError};
use crate::parse::{
    Arg, ArgParser, Chain, DateSpec, DateTimeExpr, DurationExpr, KleeneStar, Literal, Match,
    MonthlyTimeExpr, Num, ParsedCommand, Scope, TimeExpr, TimeZoneExpr, WeeklyTimeExpr,
};
use crate::store::TaskStore;
use crate::task::{MonthlyTask, PeriodicTask, Schedule, SingleTask, Timing};
use crate::time::{
    Replacement, Unit, date_suffix, localize, logical_dt_repr, logical_time_repr,
    relative_day_str, replace_down, utc_offset_hours,
};
use crate::wakeup::{Wakeup, numbered_list};

const SHOW: &[&str] = &["list", "show", "see", "view"];
const DELETE: &[&str] = &["delete", "remove"];
const TASKS: &[&str] = &["task", "tasks", "todo", "todos"];
const REMINDERS: &[&str] = &["reminder", "reminders"];

const PASSED: &str = "That time has already passed.";

const HELP: &str = "\
```
in {duration} {msg}        e.g. \"in 2d10h go play among us\"
at {time} [date] {msg}     e.g. \"at 9pm tomorrow call mom\", \"at 3/17 8am parade\"
daily {time} {msg}         e.g. \"daily 9am get out of bed\"
weekly {day} {time} {msg}  e.g. \"weekly friday 6pm game night\"
monthly {day} {time} {msg} e.g. \"monthly 20th 9am pay rent\"

see reminders / delete reminder {n}
todo {task} / see tasks / delete task {n}
wakeup {time} / wakeup set / wakeup enable / wakeup disable
timezone {zone}            e.g. \"timezone US/Eastern\", \"timezone UTC+5\", \"timezone 4:20pm\"
```";

/// What a message asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Help,
    SetTimezone,
    Greeting,
    ShowTodos,
    DeleteTodo,
    ShowReminders,
    DeleteReminder,
    AddTodo,
    WakeupDisable,
    WakeupEnable,
    WakeupSet,
    WakeupTime,
    Daily,
    Weekly,
    Monthly,
    In,
    At,
}

/// An incoming chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub user: UserId,
    pub channel: ChannelId,
    pub text: String,
}

impl ChatMessage {
    pub fn new(user: UserId, channel: ChannelId, text: impl Into<String>) -> Self {
        Self {
            user,
            channel,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// The user's message should be cleaned up after replying.
    pub delete_original: bool,
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delete_original: false,
        }
    }

    pub fn deleting_original(mut self) -> Self {
        self.delete_original = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not a command.
    Ignored,
    Replied(Reply),
    /// A near miss; the strings say what to fix.
    Warned(Vec<String>),
}

impl Outcome {
    fn reply(text: impl Into<String>) -> Self {
        Outcome::Replied(Reply::new(text))
    }

    fn reply_and_clean(text: impl Into<String>) -> Self {
        Outcome::Replied(Reply::new(text).deleting_original())
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Outcome::Replied(reply) => Some(&reply.text),
            _ => None,
        }
    }
}

/// Typed access to a command's argument values.
struct Args<'a>(&'a [Arg]);

impl Args<'_> {
    fn shape(&self, wanted: &str) -> TockError {
        TockError::ArgumentShape(format!("expected {wanted} in {:?}", self.0))
    }

    fn time(&self) -> Result<NaiveTime> {
        self.0
            .iter()
            .find_map(|a| match a {
                Arg::Time(t) => Some(*t),
                _ => None,
            })
            .ok_or_else(|| self.shape("a time"))
    }

    fn number(&self) -> Result<u64> {
        self.0
            .iter()
            .find_map(|a| match a {
                Arg::Number(n) => Some(*n),
                _ => None,
            })
            .ok_or_else(|| self.shape("a number"))
    }

    fn text(&self) -> Result<&str> {
        self.0
            .iter()
            .find_map(|a| match a {
                Arg::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .ok_or_else(|| self.shape("text"))
    }

    fn instant(&self) -> Result<DateTime<Utc>> {
        self.0
            .iter()
            .find_map(|a| match a {
                Arg::Instant(t) => Some(*t),
                _ => None,
            })
            .ok_or_else(|| self.shape("an instant"))
    }

    fn weekday(&self) -> Result<Weekday> {
        self.0
            .iter()
            .find_map(|a| match a {
                Arg::Weekday(d) => Some(*d),
                _ => None,
            })
            .ok_or_else(|| self.shape("a weekday"))
    }

    fn zone(&self) -> Result<Tz> {
        self.0
            .iter()
            .find_map(|a| match a {
                Arg::Zone(z) => Some(*z),
                _ => None,
            })
            .ok_or_else(|| self.shape("a zone"))
    }

    fn date(&self) -> Result<DateSpec> {
        self.0
            .iter()
            .find_map(|a| match a {
                Arg::Date(d) => Some(*d),
                _ => None,
            })
            .ok_or_else(|| self.shape("a date"))
    }
}

/// The registered grammar, in priority order.
pub fn grammar() -> ArgParser<Action> {
    ArgParser::new()
        .register(
            Chain::no_tz()
                .then(Literal::phrase("help reminder"))
                .handle(Action::Help),
        )
        .register(
            Chain::no_tz()
                .then(Literal::phrase("timezone"))
                .then(TimeZoneExpr)
                .handle(Action::SetTimezone),
        )
        .register(
            Chain::no_tz()
                .then(Literal::phrase("With a hey, ho"))
                .handle(Action::Greeting),
        )
        .register(
            Chain::new()
                .then(Literal::new(&[SHOW, TASKS]))
                .handle(Action::ShowTodos),
        )
        .register(
            Chain::new()
                .then(Literal::new(&[DELETE, TASKS]))
                .then(Num)
                .handle(Action::DeleteTodo),
        )
        .register(
            Chain::new()
                .then(Literal::new(&[SHOW, REMINDERS]))
                .handle(Action::ShowReminders),
        )
        .register(
            Chain::new()
                .then(Literal::new(&[DELETE, REMINDERS]))
                .then(Num)
                .handle(Action::DeleteReminder),
        )
        .register(
            Chain::new()
                .then(Literal::new(&[TASKS]))
                .then(KleeneStar)
                .handle(Action::AddTodo),
        )
        .register(
            Chain::new()
                .then(Literal::phrase("wakeup disable"))
                .handle(Action::WakeupDisable),
        )
        .register(
            Chain::new()
                .then(Literal::phrase("wakeup enable"))
                .handle(Action::WakeupEnable),
        )
        .register(
            Chain::new()
                .then(Literal::phrase("wakeup set"))
                .handle(Action::WakeupSet),
        )
        .register(
            Chain::new()
                .then(Literal::phrase("wakeup"))
                .then(TimeExpr)
                .handle(Action::WakeupTime),
        )
        .register(
            Chain::new()
                .then(Literal::phrase("daily"))
                .then(TimeExpr)
                .then(KleeneStar)
                .handle(Action::Daily),
        )
        .register(
            Chain::new()
                .then(Literal::phrase("weekly"))
                .then(WeeklyTimeExpr::default())
                .then(KleeneStar)
                .handle(Action::Weekly),
        )
        .register(
            Chain::new()
                .then(Literal::phrase("monthly"))
                .then(MonthlyTimeExpr::default())
                .then(KleeneStar)
                .handle(Action::Monthly),
        )
        .register(
            Chain::new()
                .then(Literal::phrase("in"))
                .then(DurationExpr)
                .then(KleeneStar)
                .handle(Action::In),
        )
        .register(
            Chain::new()
                .then(Literal::phrase("at"))
                .then(DateTimeExpr::default())
                .then(KleeneStar)
                .handle(Action::At),
        )
}

fn wakeup_intro(user: &UserId) -> String {
    format!(
        "Daily pings with your todo list will appear here, {}!\n`wakeup <time>` changes the \
         time, `wakeup set` resets the channel, and `wakeup disable` shuts it up.",
        user.mention()
    )
}

fn out_of_range(user: &UserId) -> Outcome {
    Outcome::reply_and_clean(format!("Hey {}, you're an idiot :D", user.mention()))
}

/// Clock reading `time` (local to `tz`) on `date`, as UTC.
fn local_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    localize(tz, date.and_time(time))
}

pub struct CommandProcessor {
    parser: ArgParser<Action>,
    store: Arc<TaskStore>,
    clock: Clock,
    sender: Arc<dyn ChannelSender>,
}

impl std::fmt::Debug for CommandProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandProcessor")
            .field("commands", &self.parser.len())
            .field("store", &self.store)
            .finish()
    }
}

impl CommandProcessor {
    pub fn new(store: Arc<TaskStore>, clock: Clock, sender: Arc<dyn ChannelSender>) -> Self {
        Self {
            parser: grammar(),
            store,
            clock,
            sender,
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// How `text` would be read right now, without acting on it.
    pub fn parse(&self, text: &str) -> Option<ParsedCommand<Action>> {
        self.parser.parse_message(text, &Scope::at(self.clock.now()))
    }

    pub async fn handle_message(&self, message: &ChatMessage) -> Result<Outcome> {
        let now = self.clock.now();
        let Some(parsed) = self.parser.parse_message(&message.text, &Scope::at(now)) else {
            return Ok(Outcome::Ignored);
        };
        if parsed.outcome == Match::NoMatch {
            return Ok(Outcome::Ignored);
        }
        if parsed.needs_tz && !self.store.has_timezone(&message.user) {
            return Err(TockError::MissingTimezone);
        }

        let outcome = match &parsed.outcome {
            Match::Warnings(warnings) => {
                debug!(user = %message.user, action = ?parsed.handler, "command warned");
                Outcome::Warned(warnings.iter().map(|w| w.to_string()).collect())
            }
            Match::Values(values) => {
                info!(user = %message.user, action = ?parsed.handler, "command");
                self.dispatch(parsed.handler, message, &Args(values), now)?
            }
            Match::NoMatch => Outcome::Ignored,
        };

        self.init_wakeup(&message.user, &message.channel, now).await;
        Ok(outcome)
    }

    /// A reaction on one of the bot's messages.
    pub async fn handle_reaction(
        &self,
        user: &UserId,
        channel: &ChannelId,
        message: &MessageId,
        emoji: &str,
    ) -> Result<Outcome> {
        if emoji != TODO_EMOJI {
            return Ok(Outcome::Ignored);
        }
        let Some(alert) = self.store.reminder_for_message(user, message) else {
            return Ok(Outcome::Ignored);
        };
        self.store.add_todo(user.clone(), alert.message.clone());
        let outcome = Outcome::reply(format!(
            "Got it, {}. Your reminder to {} was added to your todo list.",
            user.mention(),
            alert.message
        ));
        self.init_wakeup(user, channel, self.clock.now()).await;
        Ok(outcome)
    }

    /// Give a user with todos but no wakeup the default one.
    async fn init_wakeup(&self, user: &UserId, channel: &ChannelId, now: DateTime<Utc>) {
        if self.store.wakeup(user).is_some() || !self.store.has_todos(user) {
            return;
        }
        if let Err(e) = self.sender.send(channel, &wakeup_intro(user)).await {
            warn!(user = %user, "wakeup announcement failed: {e}");
        }
        let time = Wakeup::default_time(self.store.timezone(user).ok(), now);
        self.store
            .set_wakeup(Wakeup::new(user.clone(), channel.clone(), time));
    }

    fn dispatch(
        &self,
        action: Action,
        msg: &ChatMessage,
        args: &Args<'_>,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        match action {
            Action::Help => Ok(Outcome::reply_and_clean(format!(
                "Sure, {}. Here are the options:\n{HELP}",
                msg.user.mention()
            ))),
            Action::SetTimezone => self.set_timezone(msg, args.zone()?, now),
            Action::Greeting => Ok(Outcome::reply(":notes: the wind and the rain :notes:")),
            Action::ShowTodos => Ok(self.show_todos(&msg.user)),
            Action::DeleteTodo => Ok(self.delete_todo(&msg.user, args.number()?)),
            Action::ShowReminders => self.show_reminders(&msg.user, now),
            Action::DeleteReminder => self.delete_reminder(&msg.user, args.number()?, now),
            Action::AddTodo => Ok(self.add_todo(&msg.user, args.text()?)),
            Action::WakeupDisable => self.wakeup_disable(msg, now),
            Action::WakeupEnable => self.wakeup_enable(msg, now),
            Action::WakeupSet => self.wakeup_set(msg, now),
            Action::WakeupTime => self.wakeup_time(msg, args.time()?, now),
            Action::Daily => self.set_daily(msg, args.time()?, args.text()?, now),
            Action::Weekly => {
                self.set_weekly(msg, args.time()?, args.weekday()?, args.text()?, now)
            }
            Action::Monthly => self.set_monthly(msg, args.time()?, args.number()?, args.text()?, now),
            Action::In => self.set_in(msg, args.instant()?, args.text()?, now),
            Action::At => self.set_at(msg, args.time()?, args.date()?, args.text()?, now),
        }
    }

    fn set_timezone(&self, msg: &ChatMessage, tz: Tz, now: DateTime<Utc>) -> Result<Outcome> {
        self.store.set_timezone(msg.user.clone(), tz);
        let offset = utc_offset_hours(tz, now);
        let sign = if offset >= 0 { "+" } else { "" };
        Ok(Outcome::reply_and_clean(format!(
            "Got it, your timezone was set to {} (UTC{sign}{offset}).",
            tz.name()
        )))
    }

    // Todo list

    fn add_todo(&self, user: &UserId, item: &str) -> Outcome {
        self.store.add_todo(user.clone(), item);
        Outcome::reply_and_clean(format!(
            "Your task to `{item}` was added to your list. Try `see tasks` to view it."
        ))
    }

    fn show_todos(&self, user: &UserId) -> Outcome {
        let todos = self.store.todos_for(user);
        if todos.is_empty() {
            return Outcome::reply_and_clean("Your todo list is empty.");
        }
        Outcome::reply_and_clean(format!(
            "Here is your todo list, {}:\n{}",
            user.mention(),
            numbered_list(&todos)
        ))
    }

    fn delete_todo(&self, user: &UserId, index: u64) -> Outcome {
        let removed = usize::try_from(index)
            .ok()
            .and_then(|i| self.store.remove_todo(user, i));
        match removed {
            Some(item) => Outcome::reply_and_clean(format!(
                "Hey {}, your task `{item}` was deleted.",
                user.mention()
            )),
            None => out_of_range(user),
        }
    }

    // Reminder listing

    /// The user's alerts grouped by the local day of their next activation,
    /// days ascending, each day ordered by time.
    fn agenda(
        &self,
        user: &UserId,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> BTreeMap<NaiveDate, Vec<(DateTime<Utc>, Alert)>> {
        let mut days: BTreeMap<NaiveDate, Vec<(DateTime<Utc>, Alert)>> = BTreeMap::new();
        for alert in self.store.alerts_for(user) {
            let next = alert.next_activation(now);
            let day = next.with_timezone(&tz).date_naive();
            days.entry(day).or_default().push((next, alert));
        }
        for reminders in days.values_mut() {
            reminders.sort_by_key(|(at, alert)| (*at, alert.id));
        }
        days
    }

    fn show_reminders(&self, user: &UserId, now: DateTime<Utc>) -> Result<Outcome> {
        let tz = self.store.timezone(user)?;
        let agenda = self.agenda(user, tz, now);
        if agenda.is_empty() {
            return Ok(Outcome::reply(format!(
                "You have no reminders, {}.",
                user.mention()
            )));
        }

        let mut listing = String::new();
        for reminders in agenda.values() {
            let Some((first, _)) = reminders.first() else {
                continue;
            };
            let lines: Vec<String> = reminders
                .iter()
                .map(|(at, alert)| {
                    let tag = if alert.tag.is_empty() {
                        String::new()
                    } else {
                        format!(" {}", alert.tag)
                    };
                    format!("  {}{tag}: {}", logical_time_repr(*at, tz), alert.message)
                })
                .collect();
            listing.push_str(&relative_day_str(*first, tz, now));
            listing.push('\n');
            listing.push_str(&lines.join("\n"));
            listing.push('\n');
        }
        Ok(Outcome::reply(format!(
            "Here are your reminders, {}.\n```\n{listing}\n```",
            user.mention()
        )))
    }

    fn delete_reminder(&self, user: &UserId, index: u64, now: DateTime<Utc>) -> Result<Outcome> {
        let tz = self.store.timezone(user)?;
        let ordered: Vec<Alert> = self
            .agenda(user, tz, now)
            .into_values()
            .flatten()
            .map(|(_, alert)| alert)
            .collect();
        let picked = usize::try_from(index)
            .ok()
            .filter(|i| (1..=ordered.len()).contains(i))
            .map(|i| &ordered[i - 1]);
        let Some(alert) = picked else {
            return Ok(out_of_range(user));
        };
        self.store.remove(alert.id);
        Ok(Outcome::reply_and_clean(format!(
            "Hey {}, {} was deleted.",
            user.mention(),
            alert.full_desc(tz, now)
        )))
    }

    // Wakeup

    fn new_wakeup(&self, msg: &ChatMessage, now: DateTime<Utc>) -> Wakeup {
        let time = Wakeup::default_time(self.store.timezone(&msg.user).ok(), now);
        Wakeup::new(msg.user.clone(), msg.channel.clone(), time)
    }

    fn wakeup_disable(&self, msg: &ChatMessage, now: DateTime<Utc>) -> Result<Outcome> {
        let user = &msg.user;
        let Some(current) = self.store.wakeup(user) else {
            let mut wakeup = self.new_wakeup(msg, now);
            wakeup.disabled = true;
            self.store.set_wakeup(wakeup);
            return Ok(Outcome::reply_and_clean(
                "You don't have a wakeup set. Setting and disabling one. You can undo this \
                 with `wakeup enable`.",
            ));
        };
        if current.disabled {
            return Ok(Outcome::reply_and_clean("It's already disabled, galaxy brain."));
        }
        self.store.update_wakeup(user, |w| w.disabled = true);
        Ok(Outcome::reply_and_clean(format!(
            "Got it, {}, you will no longer receive daily todo reminders. You can undo this \
             with `wakeup enable`.",
            user.mention()
        )))
    }

    fn wakeup_enable(&self, msg: &ChatMessage, now: DateTime<Utc>) -> Result<Outcome> {
        let user = &msg.user;
        match self.store.wakeup(user) {
            None => {
                self.store.set_wakeup(self.new_wakeup(msg, now));
                Ok(Outcome::reply_and_clean(wakeup_intro(user)))
            }
            Some(current) if current.disabled => {
                self.store.update_wakeup(user, |w| w.disabled = false);
                Ok(Outcome::reply_and_clean("Re-enabled your daily todo reminders."))
            }
            Some(_) => Ok(Outcome::reply_and_clean("Already enabled, galaxy brain.")),
        }
    }

    fn wakeup_set(&self, msg: &ChatMessage, now: DateTime<Utc>) -> Result<Outcome> {
        let user = &msg.user;
        if self.store.wakeup(user).is_none() {
            self.store.set_wakeup(self.new_wakeup(msg, now));
            return Ok(Outcome::reply_and_clean(wakeup_intro(user)));
        }
        let channel = msg.channel.clone();
        self.store.update_wakeup(user, |w| w.channel = channel);
        Ok(Outcome::reply_and_clean(format!(
            "Got it, {}, your daily todo list will appear here now.",
            user.mention()
        )))
    }

    fn wakeup_time(&self, msg: &ChatMessage, time: NaiveTime, now: DateTime<Utc>) -> Result<Outcome> {
        let user = &msg.user;
        let tz = self.store.timezone(user)?;
        let local_today = now.with_timezone(&tz).date_naive();
        let at = local_instant(tz, local_today, time);
        let utc_time = at.time();

        if self.store.wakeup(user).is_none() {
            self.store
                .set_wakeup(Wakeup::new(user.clone(), msg.channel.clone(), utc_time));
            return Ok(Outcome::reply_and_clean(wakeup_intro(user)));
        }
        self.store.update_wakeup(user, |w| w.time = utc_time);
        Ok(Outcome::reply_and_clean(format!(
            "Got it, {}, your wakeup time was set to {}.",
            user.mention(),
            logical_time_repr(at, tz)
        )))
    }

    // Reminders

    fn add_alert(&self, msg: &ChatMessage, text: &str, timing: impl Into<Timing>) {
        self.append_tagged(msg, text, timing, "");
    }

    fn set_daily(
        &self,
        msg: &ChatMessage,
        time: NaiveTime,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let tz = self.store.timezone(&msg.user)?;
        let local_now = now.with_timezone(&tz).naive_local();
        let today = replace_down(&local_now, Unit::Hour, Replacement::From(&time))?;
        let mut first = localize(tz, today);
        if first < now {
            first = localize(tz, today + Duration::days(1));
        }
        self.append_tagged(msg, text, PeriodicTask::daily(first), "[daily]");
        Ok(Outcome::reply_and_clean(format!(
            "{}'s daily reminder at {} to \"{text}\" has been set.",
            msg.user.mention(),
            logical_time_repr(first, tz)
        )))
    }

    fn set_weekly(
        &self,
        msg: &ChatMessage,
        time: NaiveTime,
        weekday: Weekday,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let tz = self.store.timezone(&msg.user)?;
        let today = now.with_timezone(&tz).date_naive();
        let ahead = (7 + weekday.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
        let date = today + Duration::days(i64::from(ahead));
        let first = local_instant(tz, date, time);

        self.append_tagged(msg, text, PeriodicTask::weekly(first), "[weekly]");
        Ok(Outcome::reply_and_clean(format!(
            "{}'s weekly reminder at {} on {}s to \"{text}\" has been set.",
            msg.user.mention(),
            logical_time_repr(first, tz),
            first.with_timezone(&tz).format("%A")
        )))
    }

    fn set_monthly(
        &self,
        msg: &ChatMessage,
        time: NaiveTime,
        day: u64,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let tz = self.store.timezone(&msg.user)?;
        let day = u32::try_from(day)
            .ok()
            .filter(|d| (1..=31).contains(d))
            .ok_or_else(|| TockError::ArgumentShape(format!("day of month {day}")))?;
        let task = MonthlyTask::new(day, time, tz);
        let next = task.next_activation(now);

        self.append_tagged(msg, text, task, "[monthly]");
        Ok(Outcome::reply_and_clean(format!(
            "{}'s monthly reminder on the {day}{} of each month at {} to \"{text}\" has been set.",
            msg.user.mention(),
            date_suffix(day),
            logical_time_repr(next, tz)
        )))
    }

    fn set_in(
        &self,
        msg: &ChatMessage,
        at: DateTime<Utc>,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let tz = self.store.timezone(&msg.user)?;
        self.add_alert(msg, text, SingleTask::new(at));
        Ok(Outcome::reply_and_clean(format!(
            "{}'s reminder {} to \"{text}\" has been set.",
            msg.user.mention(),
            logical_dt_repr(at, tz, now)
        )))
    }

    fn set_at(
        &self,
        msg: &ChatMessage,
        time: NaiveTime,
        date: DateSpec,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let tz = self.store.timezone(&msg.user)?;
        let Some(at) = date.resolve(time, tz, now) else {
            return Ok(Outcome::Warned(vec![PASSED.to_string()]));
        };
        self.add_alert(msg, text, SingleTask::new(at));
        Ok(Outcome::reply_and_clean(format!(
            "{}'s reminder {} to \"{text}\" has been set.",
            msg.user.mention(),
            logical_dt_repr(at, tz, now)
        )))
    }

    fn append_tagged(
        &self,
        msg: &ChatMessage,
        text: &str,
        timing: impl Into<Timing>,
        tag: &str,
    ) {
        let alert = Alert::new(
            self.store.next_id(),
            msg.user.clone(),
            msg.channel.clone(),
            text,
            timing,
        )
        .with_tag(tag);
        self.store.append(alert);
    }
}
