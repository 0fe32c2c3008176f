//! Calendar dates for one-off reminders (`at 9am tomorrow`, `at 3/17 9pm`).
//!
//! A date is kept symbolic ([`DateSpec`]) until the handler knows the user's
//! zone, because "today" in UTC is not always "today" for the user.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use super::expr::{Arg, Expr, ExprGroup, Match, Scope, Tokens};
use super::leaves::{DayOfMonthExpr, SingleLiteral, TimeExpr, is_number};
use crate::time::{clamped_date, localize};

/// A date as the user wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSpec {
    Today,
    Tomorrow,
    /// `9th`: this month, or next month if that moment has passed.
    DayOfMonth(u32),
    /// `3/17`: this year, or next year if that moment has passed.
    MonthDay { month: u32, day: u32 },
    /// `3/17/27`
    Full(NaiveDate),
}

impl DateSpec {
    /// The UTC instant of `time` (a wall-clock reading in `tz`) on this date.
    ///
    /// `None` when the moment is already past and the date form has no
    /// natural "next" occurrence.
    pub fn resolve(self, time: NaiveTime, tz: Tz, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.with_timezone(&tz).date_naive();
        let at = |date: NaiveDate| localize(tz, date.and_time(time));
        let upcoming = |instant: DateTime<Utc>| Some(instant).filter(|t| *t >= now);

        match self {
            DateSpec::Today => upcoming(at(today)),
            DateSpec::Tomorrow => today.succ_opt().map(at),
            DateSpec::Full(date) => upcoming(at(date)),
            DateSpec::DayOfMonth(day) => {
                let this = at(clamped_date(today.year(), today.month(), day)?);
                upcoming(this).or_else(|| {
                    let next = today.with_day(1)?.checked_add_months(Months::new(1))?;
                    Some(at(clamped_date(next.year(), next.month(), day)?))
                })
            }
            DateSpec::MonthDay { month, day } => {
                let this = at(clamped_date(today.year(), month, day)?);
                upcoming(this).or_else(|| Some(at(clamped_date(today.year() + 1, month, day)?)))
            }
        }
    }
}

const INVALID_DATE: &str = "Invalid date arguments.";

/// `M/D` or `M/D/Y` (two-digit years are 20YY).
#[derive(Debug, Clone, Copy)]
struct SlashedDateExpr {
    with_year: bool,
}

impl Expr for SlashedDateExpr {
    fn match_tokens(&self, tokens: &mut Tokens, _scope: &Scope) -> Match {
        let Some(token) = tokens.front() else {
            return Match::ran_out();
        };
        let parts: Vec<&str> = token.split('/').collect();
        let wanted = if self.with_year { 3 } else { 2 };
        if parts.len() != wanted || !parts.iter().all(|p| is_number(p)) {
            return Match::NoMatch;
        }
        let numbers: Option<Vec<u32>> = parts.iter().map(|p| p.parse().ok()).collect();
        tokens.pop_front();

        let spec = match numbers.as_deref() {
            Some([month, day]) => {
                // Any year that has the date; Feb 29 clamps in common years.
                NaiveDate::from_ymd_opt(2000, *month, *day)
                    .map(|_| DateSpec::MonthDay { month: *month, day: *day })
            }
            Some([month, day, year]) => {
                let year = if *year < 100 { *year + 2000 } else { *year };
                i32::try_from(year)
                    .ok()
                    .and_then(|y| NaiveDate::from_ymd_opt(y, *month, *day))
                    .map(DateSpec::Full)
            }
            _ => None,
        };
        match spec {
            Some(spec) => Match::value(Arg::Date(spec)),
            None => Match::warn(INVALID_DATE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateForm {
    Today,
    Tomorrow,
    DayOfMonth,
    Slashed,
}

/// `today`, `tomorrow`, `9th`, `3/17`, `3/17/27`. Yields `[Date]`.
#[derive(Debug)]
pub struct DateExpr {
    group: ExprGroup<DateForm>,
}

impl Default for DateExpr {
    fn default() -> Self {
        let group = ExprGroup::new()
            .option(vec![Box::new(SingleLiteral::new("today"))], DateForm::Today)
            .option(vec![Box::new(SingleLiteral::new("tomorrow"))], DateForm::Tomorrow)
            .option(vec![Box::new(DayOfMonthExpr)], DateForm::DayOfMonth)
            .option(
                vec![Box::new(SlashedDateExpr { with_year: false })],
                DateForm::Slashed,
            )
            .option(
                vec![Box::new(SlashedDateExpr { with_year: true })],
                DateForm::Slashed,
            );
        Self { group }
    }
}

impl Expr for DateExpr {
    fn match_tokens(&self, tokens: &mut Tokens, scope: &Scope) -> Match {
        let (outcome, form) = self.group.match_best(tokens, scope);
        let values = match outcome {
            Match::Values(values) => values,
            other => return other,
        };
        let spec = match (form, values.as_slice()) {
            (Some(DateForm::Today), _) => DateSpec::Today,
            (Some(DateForm::Tomorrow), _) => DateSpec::Tomorrow,
            (Some(DateForm::DayOfMonth), [Arg::Number(d)]) => DateSpec::DayOfMonth(*d as u32),
            (Some(DateForm::Slashed), [Arg::Date(spec)]) => *spec,
            _ => return Match::NoMatch,
        };
        Match::value(Arg::Date(spec))
    }
}

/// A time with an optional date on either side, `on` allowed in between.
/// Yields `[Time, Date]`; a bare time means today.
#[derive(Debug)]
pub struct DateTimeExpr {
    group: ExprGroup<()>,
}

impl Default for DateTimeExpr {
    fn default() -> Self {
        let on = || Box::new(SingleLiteral::new("on")) as Box<dyn Expr>;
        let group = ExprGroup::new()
            .option(vec![Box::new(TimeExpr)], ())
            .option(vec![Box::new(TimeExpr), on(), Box::new(DateExpr::default())], ())
            .option(vec![Box::new(TimeExpr), Box::new(DateExpr::default())], ())
            .option(vec![Box::new(DateExpr::default()), on(), Box::new(TimeExpr)], ())
            .option(vec![Box::new(DateExpr::default()), Box::new(TimeExpr)], ());
        Self { group }
    }
}

impl Expr for DateTimeExpr {
    fn match_tokens(&self, tokens: &mut Tokens, scope: &Scope) -> Match {
        match self.group.match_best(tokens, scope).0 {
            Match::Values(values) => match values.as_slice() {
                [Arg::Time(t)] => Match::Values(vec![Arg::Time(*t), Arg::Date(DateSpec::Today)]),
                [Arg::Time(t), Arg::Date(d)] | [Arg::Date(d), Arg::Time(t)] => {
                    Match::Values(vec![Arg::Time(*t), Arg::Date(*d)])
                }
                _ => Match::NoMatch,
            },
            other => other,
        }
    }
}
