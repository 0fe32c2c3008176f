//! Shared vocabulary of the grammar: tokens, typed argument values, match
//! outcomes, their ranking, and the alternative group.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use std::cmp::Reverse;
use std::collections::VecDeque;
use std::fmt;

use super::date::DateSpec;

/// Remaining words of a message, front first.
pub type Tokens = VecDeque<String>;

pub const RAN_OUT: &str = "Ran out of tokens while parsing.";
pub const UNEXPECTED_TOKENS: &str = "Unexpected tokens after parsing.";

/// Split a message the way every command sees it.
pub fn tokenize(message: &str) -> Tokens {
    message.split_whitespace().map(str::to_string).collect()
}

/// Context a match is evaluated in.
#[derive(Debug, Clone, Copy)]
pub struct Scope {
    pub now: DateTime<Utc>,
}

impl Scope {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

/// A typed value produced by an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Number(u64),
    /// Absolute UTC instant (durations resolve to one).
    Instant(DateTime<Utc>),
    /// Wall-clock reading as the user wrote it, not yet zone-converted.
    Time(NaiveTime),
    Weekday(Weekday),
    Zone(Tz),
    Date(DateSpec),
    Text(String),
}

/// A recoverable near-miss shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning(String);

impl Warning {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn ran_out() -> Self {
        Self::new(RAN_OUT)
    }

    pub fn is_ran_out(&self) -> bool {
        self.0.starts_with("Ran out")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of matching an expression against a token prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum Match {
    Values(Vec<Arg>),
    /// Never empty.
    Warnings(Vec<Warning>),
    NoMatch,
}

/// Lower is better: `(class, warning count)`.
pub type Rank = (u8, usize);

impl Match {
    pub fn value(arg: Arg) -> Self {
        Match::Values(vec![arg])
    }

    pub fn warn(text: impl Into<String>) -> Self {
        Match::Warnings(vec![Warning::new(text)])
    }

    pub fn ran_out() -> Self {
        Match::Warnings(vec![Warning::ran_out()])
    }

    /// Success, then specific warnings, then "ran out of tokens", then no match.
    /// Among warning lists, fewer warnings rank better.
    pub fn rank(&self) -> Rank {
        match self {
            Match::Values(_) => (0, 0),
            Match::Warnings(warnings) => {
                let class = if warnings.first().is_some_and(Warning::is_ran_out) {
                    2
                } else {
                    1
                };
                (class, warnings.len())
            }
            Match::NoMatch => (3, 0),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Match::Values(_))
    }
}

/// A grammar fragment consuming a prefix of the token stream.
///
/// Implementations may assume nothing about the stream length; an empty
/// stream yields [`Match::ran_out`].
pub trait Expr: fmt::Debug + Send + Sync {
    fn match_tokens(&self, tokens: &mut Tokens, scope: &Scope) -> Match;
}

/// Alternative expression sequences over the same input; the best one wins.
///
/// "Best" is the lowest [`Match::rank`], then the most tokens consumed, then
/// the earliest registered option.
#[derive(Debug)]
pub struct ExprGroup<T> {
    options: Vec<(Vec<Box<dyn Expr>>, T)>,
}

impl<T> Default for ExprGroup<T> {
    fn default() -> Self {
        Self {
            options: Vec::new(),
        }
    }
}

impl<T: Clone> ExprGroup<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn option(mut self, exprs: Vec<Box<dyn Expr>>, tag: T) -> Self {
        self.options.push((exprs, tag));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Consume what the winning option consumed; return its outcome and tag.
    pub fn match_best(&self, tokens: &mut Tokens, scope: &Scope) -> (Match, Option<T>) {
        let mut best: Option<(Match, usize, &T)> = None;
        for (exprs, tag) in &self.options {
            let mut trial = tokens.clone();
            let outcome = match_sequence(exprs, &mut trial, scope);
            let consumed = tokens.len() - trial.len();
            let better = match &best {
                None => true,
                Some((held, held_consumed, _)) => {
                    (outcome.rank(), Reverse(consumed)) < (held.rank(), Reverse(*held_consumed))
                }
            };
            if better {
                best = Some((outcome, consumed, tag));
            }
        }

        match best {
            Some((outcome, consumed, tag)) => {
                tokens.drain(..consumed);
                (outcome, Some(tag.clone()))
            }
            None => (Match::NoMatch, None),
        }
    }
}

/// Run `exprs` in order; a hard failure ends the sequence, warnings accumulate.
pub(crate) fn match_sequence(exprs: &[Box<dyn Expr>], tokens: &mut Tokens, scope: &Scope) -> Match {
    let mut values = Vec::new();
    let mut warnings = Vec::new();
    for expr in exprs {
        if tokens.is_empty() {
            return Match::ran_out();
        }
        match expr.match_tokens(tokens, scope) {
            Match::NoMatch => return Match::NoMatch,
            Match::Warnings(w) => warnings.extend(w),
            Match::Values(v) => values.extend(v),
        }
    }
    if warnings.is_empty() {
        Match::Values(values)
    } else {
        Match::Warnings(warnings)
    }
}

/// True when `x` and `y` differ by exactly one substitution, insertion,
/// deletion, or swap of adjacent characters.
pub fn edit_distance_one(x: &str, y: &str) -> bool {
    if x == y {
        return false;
    }
    let a: Vec<char> = x.chars().collect();
    let b: Vec<char> = y.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.len() == long.len() {
        let diffs: Vec<usize> = (0..short.len()).filter(|&i| short[i] != long[i]).collect();
        return match diffs.as_slice() {
            [_] => true,
            [i, j] => *j == i + 1 && short[*i] == long[*j] && short[*j] == long[*i],
            _ => false,
        };
    }
    if short.len() + 1 == long.len() {
        let split = short.iter().zip(&long).take_while(|(p, q)| p == q).count();
        return short[split..] == long[split + 1..];
    }
    false
}

/// All characters but one are digits.
pub fn almost_number(token: &str) -> bool {
    let len = token.chars().count();
    len > 0 && token.chars().filter(char::is_ascii_digit).count() == len - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug)]
    struct Word(&'static str);

    impl Expr for Word {
        fn match_tokens(&self, tokens: &mut Tokens, _scope: &Scope) -> Match {
            match tokens.front() {
                Some(t) if t == self.0 => {
                    tokens.pop_front();
                    Match::Values(vec![])
                }
                Some(_) => {
                    tokens.pop_front();
                    Match::warn(format!("wanted {}", self.0))
                }
                None => Match::ran_out(),
            }
        }
    }

    fn scope() -> Scope {
        Scope::at(Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap())
    }

    #[test]
    fn edit_distance_cases() {
        assert!(!edit_distance_one("daily", "daily"));
        assert!(edit_distance_one("dialy", "daily"));
        assert!(edit_distance_one("daly", "daily"));
        assert!(edit_distance_one("dailyy", "daily"));
        assert!(edit_distance_one("dbily", "daily"));
        assert!(!edit_distance_one("dbilx", "daily"));
        assert!(!edit_distance_one("da", "daily"));
        assert!(!edit_distance_one("ydail", "daily"));
    }

    #[test]
    fn almost_numbers() {
        assert!(almost_number("1o"));
        assert!(almost_number("x"));
        assert!(!almost_number("12"));
        assert!(!almost_number("abc"));
        assert!(!almost_number(""));
    }

    #[test]
    fn ranking_prefers_specific_warnings_over_running_out() {
        let specific = Match::warn("Found invalid hour: 25");
        let ran_out = Match::ran_out();
        let two = Match::Warnings(vec![Warning::new("a"), Warning::new("b")]);
        assert!(Match::Values(vec![]).rank() < specific.rank());
        assert!(specific.rank() < two.rank());
        assert!(two.rank() < ran_out.rank());
        assert!(ran_out.rank() < Match::NoMatch.rank());
    }

    #[test]
    fn group_prefers_rank_then_consumption_then_order() {
        let group = ExprGroup::new()
            .option(vec![Box::new(Word("a")) as Box<dyn Expr>], "one")
            .option(vec![Box::new(Word("a")), Box::new(Word("b"))], "two")
            .option(vec![Box::new(Word("a")), Box::new(Word("b"))], "three");
        let mut tokens = tokenize("a b c");
        let (outcome, tag) = group.match_best(&mut tokens, &scope());
        assert_eq!(outcome, Match::Values(vec![]));
        assert_eq!(tag, Some("two"));
        assert_eq!(tokens, tokenize("c"));
    }

    #[test]
    fn sequence_runs_out_of_tokens() {
        let exprs: Vec<Box<dyn Expr>> = vec![Box::new(Word("a")), Box::new(Word("b"))];
        let mut tokens = tokenize("a");
        assert_eq!(match_sequence(&exprs, &mut tokens, &scope()), Match::ran_out());
    }
}
