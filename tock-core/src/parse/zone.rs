//! Timezone expression: a UTC offset, the user's current local time, or a
//! region name.

use chrono::{NaiveTime, Timelike};
use chrono_tz::{TZ_VARIANTS, Tz};

use super::expr::{Arg, Expr, Match, Scope, Tokens};
use super::leaves::TimeExpr;
use crate::time::utc_offset_seconds;

/// Tried before the full database, in this order.
pub const MOST_COMMON: [&str; 27] = [
    "US/Alaska",
    "US/Arizona",
    "US/Central",
    "US/Eastern",
    "US/Hawaii",
    "US/Mountain",
    "US/Pacific",
    "Asia/Shanghai",
    "Asia/Kolkata",
    "Asia/Tehran",
    "Asia/Tokyo",
    "Brazil/East",
    "Asia/Dhaka",
    "Asia/Jakarta",
    "Asia/Chongqing",
    "Africa/Lagos",
    "Asia/Manila",
    "Africa/Cairo",
    "Asia/Seoul",
    "Europe/Istanbul",
    "Europe/Moscow",
    "America/Mexico_City",
    "Europe/Paris",
    "Europe/London",
    "America/Bogota",
    "Asia/Karachi",
    "UTC",
];

/// A candidate this close (in seconds) ends the search.
const CLOSE_ENOUGH: i64 = 20 * 60;
const DAY: i64 = 86_400;

fn candidates() -> impl Iterator<Item = Tz> {
    MOST_COMMON
        .iter()
        .filter_map(|name| name.parse::<Tz>().ok())
        .chain(TZ_VARIANTS.iter().copied())
}

/// First candidate minimising `distance`, stopping early once one is close enough.
fn nearest(distance: impl Fn(Tz) -> i64) -> Option<Tz> {
    let mut best: Option<(i64, Tz)> = None;
    for tz in candidates() {
        let d = distance(tz);
        if best.is_none_or(|(held, _)| d < held) {
            best = Some((d, tz));
        }
        if best.is_some_and(|(held, _)| held < CLOSE_ENOUGH) {
            break;
        }
    }
    best.map(|(_, tz)| tz)
}

/// `+5`, `-4`, `+5:30`, `9` as seconds east of UTC.
fn parse_offset(text: &str) -> Option<i64> {
    let (sign, rest) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i64 = hours.parse().ok()?;
    let minutes: i64 = minutes.parse().ok()?;
    if !(0..60).contains(&minutes) {
        return None;
    }
    Some(sign * (hours * 3_600 + minutes * 60))
}

/// Case-insensitive lookup in the zone database.
pub fn zone_by_name(name: &str) -> Option<Tz> {
    name.parse::<Tz>().ok().or_else(|| {
        TZ_VARIANTS
            .iter()
            .copied()
            .find(|tz| tz.name().eq_ignore_ascii_case(name))
    })
}

fn seconds_of_day(time: NaiveTime) -> i64 {
    time.num_seconds_from_midnight() as i64
}

fn not_found() -> Match {
    Match::warn("Did not find any matching timezones.")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimeZoneExpr;

impl Expr for TimeZoneExpr {
    fn match_tokens(&self, tokens: &mut Tokens, scope: &Scope) -> Match {
        let Some(first) = tokens.front().cloned() else {
            return Match::ran_out();
        };
        let now = scope.now;

        if let Some(offset) = first.strip_prefix("UTC").filter(|o| !o.is_empty()) {
            tokens.pop_front();
            let Some(wanted) = parse_offset(offset) else {
                return Match::warn(format!("Could not parse offset {offset}."));
            };
            return match nearest(|tz| (utc_offset_seconds(tz, now) - wanted).abs()) {
                Some(tz) => Match::value(Arg::Zone(tz)),
                None => not_found(),
            };
        }

        let mut trial = tokens.clone();
        match TimeExpr.match_tokens(&mut trial, scope) {
            Match::NoMatch => {}
            outcome => {
                *tokens = trial;
                let stated = match outcome {
                    Match::Values(values) => match values.first() {
                        Some(Arg::Time(stated)) => seconds_of_day(*stated),
                        _ => return Match::NoMatch,
                    },
                    warnings => return warnings,
                };
                let found = nearest(|tz| {
                    let local = seconds_of_day(now.with_timezone(&tz).time());
                    let d = (stated - local).rem_euclid(DAY);
                    d.min(DAY - d)
                });
                return match found {
                    Some(tz) => Match::value(Arg::Zone(tz)),
                    None => not_found(),
                };
            }
        }

        tokens.pop_front();
        match zone_by_name(&first) {
            Some(tz) => Match::value(Arg::Zone(tz)),
            None => Match::warn(format!(
                "{first} is not a valid region, UTC offset, or time. Try Google to find \
                 your region name, which might look like \"US/Eastern\", or try providing \
                 your local time or UTC offset."
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::expr::tokenize;
    use chrono::{TimeZone, Utc};

    fn scope() -> Scope {
        // 09:00 UTC, 05:00 in US/Eastern (EDT).
        Scope::at(Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap())
    }

    fn zone(msg: &str) -> Match {
        TimeZoneExpr.match_tokens(&mut tokenize(msg), &scope())
    }

    fn tz(name: &str) -> Match {
        Match::value(Arg::Zone(name.parse().unwrap()))
    }

    #[test]
    fn region_names() {
        assert_eq!(zone("US/Eastern"), tz("US/Eastern"));
        assert_eq!(zone("europe/paris"), tz("Europe/Paris"));
        assert_eq!(zone("UTC"), tz("UTC"));
    }

    #[test]
    fn offsets_pick_the_first_close_candidate() {
        assert_eq!(zone("UTC-4"), tz("US/Eastern"));
        assert_eq!(zone("UTC+9"), tz("Asia/Tokyo"));
        assert_eq!(zone("UTC+0"), tz("UTC"));
        assert_eq!(zone("UTC+five"), Match::warn("Could not parse offset +five."));
    }

    #[test]
    fn local_time_infers_the_zone() {
        assert_eq!(zone("5am"), tz("US/Eastern"));
        assert_eq!(zone("6:10 pm"), tz("Asia/Tokyo"));
        assert_eq!(zone("25pm"), Match::warn("Found invalid hour: 25"));
    }

    #[test]
    fn unknown_region_explains_the_accepted_forms() {
        let Match::Warnings(w) = zone("Mars/Olympus") else {
            panic!("expected a warning");
        };
        assert!(w[0].as_str().starts_with("Mars/Olympus is not a valid region"));
    }

    #[test]
    fn offset_parsing() {
        assert_eq!(parse_offset("+5"), Some(5 * 3_600));
        assert_eq!(parse_offset("-4"), Some(-4 * 3_600));
        assert_eq!(parse_offset("+5:30"), Some(5 * 3_600 + 30 * 60));
        assert_eq!(parse_offset("+5:75"), None);
    }
}
