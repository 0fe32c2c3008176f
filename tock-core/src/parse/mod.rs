//! Combinator grammar for chat commands.
//!
//! A message is split on whitespace and offered to every registered
//! [`Command`]. Each command runs its expressions over the tokens and ends in
//! one of three outcomes (values, warnings, no match). The [`ArgParser`] keeps
//! the best-ranked one so a near miss produces a targeted correction rather
//! than a generic failure.

pub mod command;
pub mod date;
pub mod expr;
pub mod leaves;
pub mod zone;

pub use command::{ArgParser, Chain, Command, ParsedCommand};
pub use date::{DateExpr, DateSpec, DateTimeExpr};
pub use expr::{
    Arg, Expr, ExprGroup, Match, RAN_OUT, Rank, Scope, Tokens, UNEXPECTED_TOKENS, Warning,
    edit_distance_one, tokenize,
};
pub use leaves::{
    DurationExpr, KleeneStar, Literal, MonthlyTimeExpr, Num, SingleLiteral, SuffixedNumExpr,
    TimeExpr, WeeklyTimeExpr,
};
pub use zone::{MOST_COMMON, TimeZoneExpr, zone_by_name};
