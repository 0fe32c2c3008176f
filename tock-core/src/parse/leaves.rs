//! Leaf expressions: literals, numbers, durations, times of day, weekly and
//! monthly anchors, and the trailing free-text capture.

use chrono::{NaiveTime, Weekday};

use super::expr::{Arg, Expr, ExprGroup, Match, Scope, Tokens, almost_number, edit_distance_one};
use crate::time::{date_suffix, parse_duration};

/// Longest token run [`DurationExpr`] will try to glue together.
const MAX_DURATION_TOKENS: usize = 16;

pub(crate) fn is_number(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

/// One literal word, with single-edit typo tolerance.
#[derive(Debug, Clone)]
pub struct SingleLiteral {
    word: String,
}

impl SingleLiteral {
    pub fn new(word: &str) -> Self {
        Self {
            word: word.to_lowercase(),
        }
    }
}

impl Expr for SingleLiteral {
    fn match_tokens(&self, tokens: &mut Tokens, _scope: &Scope) -> Match {
        let Some(actual) = tokens.front().map(|t| t.to_lowercase()) else {
            return Match::ran_out();
        };
        if actual == self.word {
            tokens.pop_front();
            Match::Values(vec![])
        } else if edit_distance_one(&actual, &self.word) {
            tokens.pop_front();
            Match::warn(format!(
                "Did you mean `{}` instead of `{actual}`?",
                self.word
            ))
        } else {
            Match::NoMatch
        }
    }
}

/// A phrase built from slots of alternatives, e.g. `[list|show] [task|tasks]`.
///
/// Every combination of one alternative per slot is an option; each option is
/// split into words and matched word by word.
#[derive(Debug)]
pub struct Literal {
    group: ExprGroup<()>,
}

impl Literal {
    pub fn new(slots: &[&[&str]]) -> Self {
        let mut phrases: Vec<Vec<&str>> = vec![Vec::new()];
        for slot in slots {
            phrases = phrases
                .iter()
                .flat_map(|prefix| {
                    slot.iter().map(move |alt| {
                        let mut next = prefix.clone();
                        next.push(*alt);
                        next
                    })
                })
                .collect();
        }

        let group = phrases.into_iter().fold(ExprGroup::new(), |group, phrase| {
            let words: Vec<Box<dyn Expr>> = phrase
                .iter()
                .flat_map(|part| part.split_whitespace())
                .map(|w| Box::new(SingleLiteral::new(w)) as Box<dyn Expr>)
                .collect();
            group.option(words, ())
        });
        Self { group }
    }

    pub fn phrase(text: &str) -> Self {
        Self::new(&[&[text]])
    }
}

impl Expr for Literal {
    fn match_tokens(&self, tokens: &mut Tokens, scope: &Scope) -> Match {
        self.group.match_best(tokens, scope).0
    }
}

/// A plain non-negative integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Num;

impl Expr for Num {
    fn match_tokens(&self, tokens: &mut Tokens, _scope: &Scope) -> Match {
        let Some(token) = tokens.front() else {
            return Match::ran_out();
        };
        if almost_number(token) {
            let token = tokens.pop_front().unwrap_or_default();
            return Match::warn(format!("Expected number; got `{token}`."));
        }
        if !is_number(token) {
            return Match::NoMatch;
        }
        let token = tokens.pop_front().unwrap_or_default();
        match token.parse() {
            Ok(n) => Match::value(Arg::Number(n)),
            Err(_) => Match::warn(format!("Expected number; got `{token}`.")),
        }
    }
}

/// The longest token prefix that reads as a duration, resolved against now.
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationExpr;

impl Expr for DurationExpr {
    fn match_tokens(&self, tokens: &mut Tokens, scope: &Scope) -> Match {
        let mut best = None;
        let mut text = String::new();
        let mut last_failed = false;
        for (i, token) in tokens.iter().take(MAX_DURATION_TOKENS).enumerate() {
            text.push_str(token);
            match parse_duration(&text, scope.now) {
                Ok(at) => {
                    last_failed = false;
                    best = Some((i, at));
                }
                Err(_) if last_failed => break,
                Err(_) => last_failed = true,
            }
        }

        if let Some((last, at)) = best {
            tokens.drain(..=last);
            return Match::value(Arg::Instant(at));
        }

        // Nothing parsed: explain using the first one or two tokens.
        let Some(first) = tokens.pop_front() else {
            return Match::ran_out();
        };
        if !first.starts_with(|c: char| c.is_ascii_digit()) {
            return Match::NoMatch;
        }
        let attempt = if is_number(&first) {
            match tokens.pop_front() {
                Some(unit) => format!("{first}{unit}"),
                None => {
                    return Match::warn(format!("Didn't find a time unit after `{first}`"));
                }
            }
        } else {
            first
        };
        match parse_duration(&attempt, scope.now) {
            Ok(at) => Match::value(Arg::Instant(at)),
            Err(why) => Match::warn(why),
        }
    }
}

/// A time of day: `4pm`, `4 pm`, `420pm`, `4:20pm`, `4:20 PM`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeExpr;

impl Expr for TimeExpr {
    fn match_tokens(&self, tokens: &mut Tokens, _scope: &Scope) -> Match {
        let Some(first) = tokens.pop_front() else {
            return Match::ran_out();
        };
        if first.matches(':').count() > 1 {
            return Match::NoMatch;
        }
        let first = first.replace(':', "");
        if first.is_empty() {
            return Match::NoMatch;
        }

        let (num, marker) = if is_number(&first) {
            match tokens.pop_front() {
                Some(marker) => (first, marker.to_lowercase()),
                None => return Match::ran_out(),
            }
        } else {
            let Some((split, _)) = first.char_indices().rev().nth(1) else {
                return Match::NoMatch;
            };
            if split == 0 {
                return Match::NoMatch;
            }
            let (num, marker) = first.split_at(split);
            if !is_number(num) {
                return Match::NoMatch;
            }
            (num.to_string(), marker.to_lowercase())
        };

        if num.len() > 4 {
            return Match::NoMatch;
        }
        let (hour, minute) = if num.len() <= 2 {
            (num.as_str(), "0")
        } else {
            num.split_at(num.len() - 2)
        };
        let (Ok(hour), Ok(minute)) = (hour.parse::<u32>(), minute.parse::<u32>()) else {
            return Match::NoMatch;
        };

        if hour == 0 || hour > 12 {
            return Match::warn(format!("Found invalid hour: {hour}"));
        }
        if minute >= 60 {
            return Match::warn(format!("Found invalid minute: {minute}"));
        }
        let pm = match marker.as_str() {
            "am" => false,
            "pm" => true,
            other => {
                return Match::warn(format!(
                    "Expected time signature `am` or `pm`, found {other}."
                ));
            }
        };

        let hour = hour % 12 + if pm { 12 } else { 0 };
        match NaiveTime::from_hms_opt(hour, minute, 0) {
            Some(time) => Match::value(Arg::Time(time)),
            None => Match::NoMatch,
        }
    }
}

pub(crate) const WEEKDAYS: [(Weekday, &str); 7] = [
    (Weekday::Mon, "monday"),
    (Weekday::Tue, "tuesday"),
    (Weekday::Wed, "wednesday"),
    (Weekday::Thu, "thursday"),
    (Weekday::Fri, "friday"),
    (Weekday::Sat, "saturday"),
    (Weekday::Sun, "sunday"),
];

/// A weekday name and a time, in either order. Yields `[Time, Weekday]`.
#[derive(Debug)]
pub struct WeeklyTimeExpr {
    group: ExprGroup<Weekday>,
}

impl Default for WeeklyTimeExpr {
    fn default() -> Self {
        let group = WEEKDAYS.iter().fold(ExprGroup::new(), |group, (day, name)| {
            group
                .option(
                    vec![Box::new(SingleLiteral::new(name)), Box::new(TimeExpr)],
                    *day,
                )
                .option(
                    vec![Box::new(TimeExpr), Box::new(SingleLiteral::new(name))],
                    *day,
                )
        });
        Self { group }
    }
}

impl Expr for WeeklyTimeExpr {
    fn match_tokens(&self, tokens: &mut Tokens, scope: &Scope) -> Match {
        if tokens.len() < 2 {
            return Match::ran_out();
        }
        match self.group.match_best(tokens, scope) {
            (Match::Values(mut values), Some(day)) => {
                values.push(Arg::Weekday(day));
                Match::Values(values)
            }
            (outcome, _) => outcome,
        }
    }
}

/// A bare or ordinal-suffixed number: `3`, `3rd`, `21st`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuffixedNumExpr;

impl Expr for SuffixedNumExpr {
    fn match_tokens(&self, tokens: &mut Tokens, _scope: &Scope) -> Match {
        let Some(token) = tokens.front() else {
            return Match::ran_out();
        };
        let lower = token.to_lowercase();
        let (digits, suffix) = if is_number(&lower) {
            (lower.as_str(), None)
        } else if lower.len() >= 3 && lower.is_char_boundary(lower.len() - 2) {
            let (digits, suffix) = lower.split_at(lower.len() - 2);
            if !is_number(digits) || !matches!(suffix, "st" | "nd" | "rd" | "th") {
                return Match::NoMatch;
            }
            (digits, Some(suffix))
        } else {
            return Match::NoMatch;
        };

        let Ok(n) = digits.parse::<u64>() else {
            return Match::NoMatch;
        };
        tokens.pop_front();
        match suffix {
            Some(suffix) if u32::try_from(n).is_ok_and(|d| date_suffix(d) != suffix) => {
                let d = n as u32;
                Match::warn(format!("Did you mean `{d}{}`?", date_suffix(d)))
            }
            _ => Match::value(Arg::Number(n)),
        }
    }
}

fn day_of_month(outcome: Match) -> Match {
    let values = match outcome {
        Match::Values(values) => values,
        other => return other,
    };
    let day = match values.as_slice() {
        [Arg::Number(d)] => *d,
        _ => return Match::NoMatch,
    };
    if (1..=31).contains(&day) {
        Match::Values(values)
    } else {
        Match::warn(format!("Found invalid day of month: {day}"))
    }
}

/// [`SuffixedNumExpr`] restricted to 1 through 31.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DayOfMonthExpr;

impl Expr for DayOfMonthExpr {
    fn match_tokens(&self, tokens: &mut Tokens, scope: &Scope) -> Match {
        day_of_month(SuffixedNumExpr.match_tokens(tokens, scope))
    }
}

/// A day of the month and a time, in either order. Yields `[Time, Number]`.
#[derive(Debug)]
pub struct MonthlyTimeExpr {
    group: ExprGroup<()>,
}

impl Default for MonthlyTimeExpr {
    fn default() -> Self {
        let group = ExprGroup::new()
            .option(vec![Box::new(DayOfMonthExpr), Box::new(TimeExpr)], ())
            .option(vec![Box::new(TimeExpr), Box::new(DayOfMonthExpr)], ());
        Self { group }
    }
}

impl Expr for MonthlyTimeExpr {
    fn match_tokens(&self, tokens: &mut Tokens, scope: &Scope) -> Match {
        if tokens.len() < 2 {
            return Match::ran_out();
        }
        match self.group.match_best(tokens, scope).0 {
            Match::Values(mut values) => {
                if matches!(values.first(), Some(Arg::Number(_))) {
                    values.swap(0, 1);
                }
                Match::Values(values)
            }
            other => other,
        }
    }
}

/// Everything left, joined by single spaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct KleeneStar;

impl Expr for KleeneStar {
    fn match_tokens(&self, tokens: &mut Tokens, _scope: &Scope) -> Match {
        if tokens.is_empty() {
            return Match::ran_out();
        }
        let text = tokens.drain(..).collect::<Vec<_>>().join(" ");
        Match::value(Arg::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::expr::tokenize;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    fn run(expr: &dyn Expr, msg: &str) -> (Match, Tokens) {
        let mut tokens = tokenize(msg);
        let outcome = expr.match_tokens(&mut tokens, &Scope::at(now()));
        (outcome, tokens)
    }

    fn hm(h: u32, m: u32) -> Arg {
        Arg::Time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    #[test]
    fn literal_exact_fuzzy_and_miss() {
        let lit = Literal::new(&[&["list", "show"], &["reminder", "reminders"]]);
        assert_eq!(run(&lit, "show reminders now"), (Match::Values(vec![]), tokenize("now")));
        let (outcome, rest) = run(&lit, "shwo reminders");
        assert_eq!(outcome, Match::warn("Did you mean `show` instead of `shwo`?"));
        assert!(rest.is_empty());
        assert_eq!(run(&lit, "delete reminders").0, Match::NoMatch);
    }

    #[test]
    fn literal_multi_word_phrase() {
        let lit = Literal::phrase("help reminder");
        assert_eq!(run(&lit, "HELP Reminder").0, Match::Values(vec![]));
        assert_eq!(run(&lit, "help").0, Match::ran_out());
    }

    #[test]
    fn numbers() {
        assert_eq!(run(&Num, "12 x").0, Match::value(Arg::Number(12)));
        assert_eq!(run(&Num, "1o").0, Match::warn("Expected number; got `1o`."));
        assert_eq!(run(&Num, "ten").0, Match::NoMatch);
    }

    #[test]
    fn durations_take_the_longest_prefix() {
        let expected = now() + Duration::days(3) + Duration::hours(8) + Duration::minutes(5)
            + Duration::seconds(4);
        let (outcome, rest) = run(&DurationExpr, "3d8h5m4s wake up");
        assert_eq!(outcome, Match::value(Arg::Instant(expected)));
        assert_eq!(rest, tokenize("wake up"));

        let (outcome, rest) = run(&DurationExpr, "3 days 2 hours wake up");
        assert_eq!(
            outcome,
            Match::value(Arg::Instant(now() + Duration::days(3) + Duration::hours(2)))
        );
        assert_eq!(rest, tokenize("wake up"));
    }

    #[test]
    fn duration_diagnostics() {
        assert_eq!(
            run(&DurationExpr, "3x wake").0,
            Match::warn("`x` is not a valid unit of time.")
        );
        assert_eq!(
            run(&DurationExpr, "3 fortnights").0,
            Match::warn("`fortnights` is not a valid unit of time.")
        );
        assert_eq!(
            run(&DurationExpr, "3").0,
            Match::warn("Didn't find a time unit after `3`")
        );
        assert_eq!(run(&DurationExpr, "soon").0, Match::NoMatch);
    }

    #[test]
    fn times_of_day() {
        assert_eq!(run(&TimeExpr, "8am").0, Match::value(hm(8, 0)));
        assert_eq!(run(&TimeExpr, "12am").0, Match::value(hm(0, 0)));
        assert_eq!(run(&TimeExpr, "12pm").0, Match::value(hm(12, 0)));
        assert_eq!(run(&TimeExpr, "4:20 PM").0, Match::value(hm(16, 20)));
        assert_eq!(run(&TimeExpr, "420pm").0, Match::value(hm(16, 20)));
        assert_eq!(run(&TimeExpr, "1130pm").0, Match::value(hm(23, 30)));
    }

    #[test]
    fn time_of_day_warnings_and_failures() {
        assert_eq!(run(&TimeExpr, "25pm").0, Match::warn("Found invalid hour: 25"));
        assert_eq!(run(&TimeExpr, "0am").0, Match::warn("Found invalid hour: 0"));
        assert_eq!(run(&TimeExpr, "4:75pm").0, Match::warn("Found invalid minute: 75"));
        assert_eq!(
            run(&TimeExpr, "4 wake").0,
            Match::warn("Expected time signature `am` or `pm`, found wake.")
        );
        assert_eq!(run(&TimeExpr, "4").0, Match::ran_out());
        assert_eq!(run(&TimeExpr, "1:2:3pm").0, Match::NoMatch);
        assert_eq!(run(&TimeExpr, "12345pm").0, Match::NoMatch);
        assert_eq!(run(&TimeExpr, "pm").0, Match::NoMatch);
        assert_eq!(run(&TimeExpr, "friday").0, Match::NoMatch);
    }

    #[test]
    fn weekly_either_order() {
        let weekly = WeeklyTimeExpr::default();
        let expected = Match::Values(vec![hm(18, 0), Arg::Weekday(Weekday::Fri)]);
        assert_eq!(run(&weekly, "friday 6pm trash"), (expected.clone(), tokenize("trash")));
        assert_eq!(run(&weekly, "6 pm Friday trash"), (expected, tokenize("trash")));
        assert_eq!(run(&weekly, "friday").0, Match::ran_out());
        assert_eq!(
            run(&weekly, "fridya 6pm").0,
            Match::warn("Did you mean `friday` instead of `fridya`?")
        );
    }

    #[test]
    fn suffixed_numbers() {
        assert_eq!(run(&SuffixedNumExpr, "3").0, Match::value(Arg::Number(3)));
        assert_eq!(run(&SuffixedNumExpr, "21st").0, Match::value(Arg::Number(21)));
        assert_eq!(run(&SuffixedNumExpr, "3th").0, Match::warn("Did you mean `3rd`?"));
        assert_eq!(run(&SuffixedNumExpr, "third").0, Match::NoMatch);
    }

    #[test]
    fn monthly_either_order_and_day_check() {
        let monthly = MonthlyTimeExpr::default();
        let expected = Match::Values(vec![hm(9, 0), Arg::Number(3)]);
        assert_eq!(run(&monthly, "3rd 9am rent").0, expected);
        assert_eq!(run(&monthly, "9am 3 rent").0, expected);
        assert_eq!(
            run(&monthly, "32nd 9am").0,
            Match::warn("Found invalid day of month: 32")
        );
    }

    #[test]
    fn kleene_star_joins_the_rest() {
        assert_eq!(
            run(&KleeneStar, "wake   up now"),
            (Match::value(Arg::Text("wake up now".into())), Tokens::new())
        );
    }
}
