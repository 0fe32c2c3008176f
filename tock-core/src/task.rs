//! Timing model for everything the scheduler can fire.
//!
//! Design:
//! - A [`Schedule`] only answers "when is the next activation?". Whether an
//!   activation is due is derived from that by looking a little into the past.
//! - A [`Task`] adds the runtime guard that stops a repeating schedule from
//!   firing twice inside one recognition window.
//! - [`Timing`] is the closed set of schedules alerts can carry. It is
//!   serialized with an explicit `kind` tag so stored tasks reload as the
//!   same variant.

use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::time::{clamped_date, localize};

/// How far back an activation still counts as "just happened".
pub const ACTIVATION_THRESHOLD_SECS: i64 = 30;

/// Minimum gap between two firings of the same repeating task.
pub const REPEAT_THRESHOLD_SECS: i64 = 60;

/// Boundary jitter tolerated by periodic schedules.
const PERIODIC_SLACK_MS: i64 = 500;

pub trait Schedule {
    /// The next activation instant, seen from `now`.
    fn next_activation(&self, now: DateTime<Utc>) -> DateTime<Utc>;

    fn activation_threshold(&self) -> Duration {
        Duration::seconds(ACTIVATION_THRESHOLD_SECS)
    }

    /// Whether an activation happened within the last threshold.
    fn soon_past_activation(&self, now: DateTime<Utc>) -> bool {
        self.next_activation(now - self.activation_threshold()) != self.next_activation(now)
    }

    fn is_repeatable(&self) -> bool {
        true
    }
}

/// A schedule plus the record of its last firing.
pub trait Task: Schedule {
    fn last_activated(&self) -> Option<DateTime<Utc>>;

    fn record_activation(&mut self, at: DateTime<Utc>);

    fn should_activate(&self, now: DateTime<Utc>) -> bool {
        if !self.soon_past_activation(now) {
            return false;
        }
        match self.last_activated() {
            Some(last) => now - last > Duration::seconds(REPEAT_THRESHOLD_SECS),
            None => true,
        }
    }

    /// Check and record in one step; `true` means the caller must deliver.
    fn claim(&mut self, now: DateTime<Utc>) -> bool {
        let due = self.should_activate(now);
        if due {
            self.record_activation(now);
        }
        due
    }
}

/// Fires every `periodicity` starting at `first_activation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicTask {
    /// Seconds.
    pub period_secs: i64,
    pub first_activation: DateTime<Utc>,
}

impl PeriodicTask {
    pub fn new(periodicity: Duration, first_activation: DateTime<Utc>) -> Self {
        Self {
            period_secs: periodicity.num_seconds().max(1),
            first_activation,
        }
    }

    pub fn daily(first_activation: DateTime<Utc>) -> Self {
        Self::new(Duration::days(1), first_activation)
    }

    pub fn weekly(first_activation: DateTime<Utc>) -> Self {
        Self::new(Duration::weeks(1), first_activation)
    }

    pub fn periodicity(&self) -> Duration {
        Duration::seconds(self.period_secs)
    }
}

impl Schedule for PeriodicTask {
    fn next_activation(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let period_ms = self.period_secs * 1000;
        let elapsed_ms = (now - self.first_activation).num_milliseconds() + PERIODIC_SLACK_MS;
        // Ceiling division, never before the first activation.
        let k = if elapsed_ms <= 0 {
            0
        } else {
            (elapsed_ms + period_ms - 1) / period_ms
        };
        self.first_activation + Duration::seconds(self.period_secs * k)
    }
}

/// Fires on `day` of every month at the wall-clock `time` in `zone`.
///
/// Months without that day fire on their last day instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTask {
    pub day: u32,
    pub time: NaiveTime,
    pub zone: Tz,
}

impl MonthlyTask {
    pub fn new(day: u32, time: NaiveTime, zone: Tz) -> Self {
        Self {
            day: day.clamp(1, 31),
            time,
            zone,
        }
    }

    fn occurrence(&self, year: i32, month: u32) -> Option<DateTime<Utc>> {
        let date = clamped_date(year, month, self.day)?;
        Some(localize(self.zone, date.and_time(self.time)))
    }
}

impl Schedule for MonthlyTask {
    fn next_activation(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.zone).date_naive();
        let this_month = self.occurrence(local.year(), local.month());
        if let Some(at) = this_month.filter(|at| *at >= now) {
            return at;
        }
        local
            .with_day(1)
            .and_then(|first| first.checked_add_months(Months::new(1)))
            .and_then(|next| self.occurrence(next.year(), next.month()))
            // Only reachable at the end of the representable calendar.
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Fires once at `activation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleTask {
    pub activation: DateTime<Utc>,
}

impl SingleTask {
    pub fn new(activation: DateTime<Utc>) -> Self {
        Self { activation }
    }

    /// The firing window closed without the task being claimed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.activation > self.activation_threshold()
    }
}

impl Schedule for SingleTask {
    fn next_activation(&self, _now: DateTime<Utc>) -> DateTime<Utc> {
        self.activation
    }

    fn soon_past_activation(&self, now: DateTime<Utc>) -> bool {
        let since = now - self.activation;
        since >= Duration::zero() && since <= self.activation_threshold()
    }

    fn is_repeatable(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Timing {
    Periodic(PeriodicTask),
    Monthly(MonthlyTask),
    Single(SingleTask),
}

impl Timing {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Timing::Single(single) => single.is_expired(now),
            _ => false,
        }
    }

    fn schedule(&self) -> &dyn Schedule {
        match self {
            Timing::Periodic(t) => t,
            Timing::Monthly(t) => t,
            Timing::Single(t) => t,
        }
    }
}

impl Schedule for Timing {
    fn next_activation(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.schedule().next_activation(now)
    }

    fn soon_past_activation(&self, now: DateTime<Utc>) -> bool {
        self.schedule().soon_past_activation(now)
    }

    fn is_repeatable(&self) -> bool {
        self.schedule().is_repeatable()
    }
}

impl From<PeriodicTask> for Timing {
    fn from(t: PeriodicTask) -> Self {
        Timing::Periodic(t)
    }
}

impl From<MonthlyTask> for Timing {
    fn from(t: MonthlyTask) -> Self {
        Timing::Monthly(t)
    }
}

impl From<SingleTask> for Timing {
    fn from(t: SingleTask) -> Self {
        Timing::Single(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    struct Probe<S> {
        schedule: S,
        last: Option<DateTime<Utc>>,
    }

    impl<S: Schedule> Schedule for Probe<S> {
        fn next_activation(&self, now: DateTime<Utc>) -> DateTime<Utc> {
            self.schedule.next_activation(now)
        }
        fn soon_past_activation(&self, now: DateTime<Utc>) -> bool {
            self.schedule.soon_past_activation(now)
        }
        fn is_repeatable(&self) -> bool {
            self.schedule.is_repeatable()
        }
    }

    impl<S: Schedule> Task for Probe<S> {
        fn last_activated(&self) -> Option<DateTime<Utc>> {
            self.last
        }
        fn record_activation(&mut self, at: DateTime<Utc>) {
            self.last = Some(at);
        }
    }

    #[test]
    fn periodic_next_is_the_ceiling_boundary() {
        let first = utc(2026, 10, 18, 12, 0, 0);
        let daily = PeriodicTask::daily(first);

        assert_eq!(daily.next_activation(utc(2026, 10, 1, 0, 0, 0)), first);
        assert_eq!(daily.next_activation(utc(2026, 10, 18, 11, 0, 0)), first);
        assert_eq!(
            daily.next_activation(utc(2026, 10, 20, 13, 0, 0)),
            utc(2026, 10, 21, 12, 0, 0)
        );

        for t in [utc(2026, 10, 19, 3, 7, 9), utc(2026, 11, 2, 23, 59, 1)] {
            let next = daily.next_activation(t);
            assert!(next >= t && next < t + daily.periodicity());
        }
    }

    #[test]
    fn periodic_next_is_strictly_after_a_boundary() {
        let first = utc(2026, 10, 18, 12, 0, 0);
        let weekly = PeriodicTask::weekly(first);
        let next = weekly.next_activation(utc(2026, 10, 19, 0, 0, 0));
        assert_eq!(weekly.next_activation(next), next + Duration::weeks(1));
    }

    #[test]
    fn soon_past_covers_the_threshold_after_each_boundary() {
        let daily = PeriodicTask::daily(utc(2026, 10, 18, 8, 0, 0));
        assert!(!daily.soon_past_activation(utc(2026, 10, 19, 7, 59, 50)));
        assert!(daily.soon_past_activation(utc(2026, 10, 19, 8, 0, 0)));
        assert!(daily.soon_past_activation(utc(2026, 10, 19, 8, 0, 20)));
        assert!(!daily.soon_past_activation(utc(2026, 10, 19, 8, 0, 45)));
    }

    #[test]
    fn monthly_clamps_to_short_months() {
        let task = MonthlyTask::new(31, NaiveTime::from_hms_opt(9, 0, 0).unwrap(), Tz::UTC);
        assert_eq!(
            task.next_activation(utc(2026, 4, 2, 0, 0, 0)),
            utc(2026, 4, 30, 9, 0, 0)
        );
        assert_eq!(
            task.next_activation(utc(2026, 1, 31, 10, 0, 0)),
            utc(2026, 2, 28, 9, 0, 0)
        );
        assert_eq!(
            task.next_activation(utc(2028, 2, 1, 0, 0, 0)),
            utc(2028, 2, 29, 9, 0, 0)
        );
    }

    #[test]
    fn monthly_follows_the_local_wall_clock() {
        let eastern: Tz = "US/Eastern".parse().unwrap();
        let task = MonthlyTask::new(3, NaiveTime::from_hms_opt(21, 0, 0).unwrap(), eastern);
        // 9PM EDT on the 3rd is already the 4th in UTC.
        assert_eq!(
            task.next_activation(utc(2026, 10, 1, 0, 0, 0)),
            utc(2026, 10, 4, 1, 0, 0)
        );
        assert_eq!(
            task.next_activation(utc(2026, 10, 4, 2, 0, 0)),
            utc(2026, 11, 4, 2, 0, 0)
        );
    }

    #[test]
    fn single_window_is_after_only() {
        let at = utc(2026, 10, 18, 12, 0, 0);
        let single = SingleTask::new(at);
        assert!(!single.is_repeatable());
        assert!(!single.soon_past_activation(at - Duration::seconds(1)));
        assert!(single.soon_past_activation(at));
        assert!(single.soon_past_activation(at + Duration::seconds(30)));
        assert!(!single.soon_past_activation(at + Duration::seconds(31)));
        assert!(!single.is_expired(at + Duration::seconds(30)));
        assert!(single.is_expired(at + Duration::seconds(31)));
    }

    #[test]
    fn claim_fires_once_per_window() {
        let mut task = Probe {
            schedule: PeriodicTask::daily(utc(2026, 10, 18, 8, 0, 0)),
            last: None,
        };
        let boundary = utc(2026, 10, 19, 8, 0, 0);
        assert!(task.claim(boundary));
        assert!(!task.claim(boundary + Duration::seconds(1)));
        assert!(!task.claim(boundary + Duration::seconds(29)));
        assert!(task.claim(boundary + Duration::days(1) + Duration::seconds(2)));
    }

    #[test]
    fn timing_round_trips_with_its_kind() {
        let timing = Timing::from(PeriodicTask::daily(utc(2026, 10, 18, 8, 0, 0)));
        let json = serde_json::to_value(&timing).unwrap();
        assert_eq!(json["kind"], "periodic");
        assert_eq!(serde_json::from_value::<Timing>(json).unwrap(), timing);

        let monthly = Timing::from(MonthlyTask::new(
            3,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            "Asia/Tokyo".parse().unwrap(),
        ));
        let text = serde_json::to_string(&monthly).unwrap();
        assert_eq!(serde_json::from_str::<Timing>(&text).unwrap(), monthly);
    }
}
