//! Time utilities: field replacement, zone conversion, duration parsing and the
//! human renderings used in replies.
//!
//! Every function that depends on "now" takes it as an argument; callers read it
//! from the injected [`crate::clock::Clock`].

use chrono::{
    DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime,
    Offset, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use thiserror::Error;

/// Programming errors raised by the time primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("requested {0:?} from a bare time of day")]
    DateFromTime(Unit),

    #[error("no such date: {year}-{month}-{day}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("no such time: {hour}:{minute}:{second}.{micro}")]
    InvalidTime {
        hour: u32,
        minute: u32,
        second: u32,
        micro: u32,
    },
}

/// Calendar/clock fields ordered from finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Unit {
    Microsecond,
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl Unit {
    const ALL: [Unit; 7] = [
        Unit::Microsecond,
        Unit::Second,
        Unit::Minute,
        Unit::Hour,
        Unit::Day,
        Unit::Month,
        Unit::Year,
    ];

    pub fn is_date(self) -> bool {
        self >= Unit::Day
    }
}

/// Anything with clock fields and possibly calendar fields.
pub trait Stamp {
    fn date_part(&self) -> Option<NaiveDate>;
    fn time_part(&self) -> NaiveTime;
    fn with_parts(&self, date: Option<NaiveDate>, time: NaiveTime) -> Self
    where
        Self: Sized;
}

impl Stamp for NaiveTime {
    fn date_part(&self) -> Option<NaiveDate> {
        None
    }

    fn time_part(&self) -> NaiveTime {
        *self
    }

    fn with_parts(&self, _date: Option<NaiveDate>, time: NaiveTime) -> Self {
        time
    }
}

impl Stamp for NaiveDateTime {
    fn date_part(&self) -> Option<NaiveDate> {
        Some(self.date())
    }

    fn time_part(&self) -> NaiveTime {
        self.time()
    }

    fn with_parts(&self, date: Option<NaiveDate>, time: NaiveTime) -> Self {
        NaiveDateTime::new(date.unwrap_or(self.date()), time)
    }
}

impl Stamp for DateTime<Utc> {
    fn date_part(&self) -> Option<NaiveDate> {
        Some(self.date_naive())
    }

    fn time_part(&self) -> NaiveTime {
        self.time()
    }

    fn with_parts(&self, date: Option<NaiveDate>, time: NaiveTime) -> Self {
        Utc.from_utc_datetime(&NaiveDateTime::new(date.unwrap_or(self.date_naive()), time))
    }
}

/// Where [`replace_down`] takes its new field values from.
#[derive(Clone, Copy)]
pub enum Replacement<'a> {
    From(&'a dyn Stamp),
    /// Date fields become 1, clock fields become 0.
    Zero,
}

#[derive(Debug, Clone, Copy)]
struct Fields([u32; 7], i32);

impl Fields {
    fn of(date: Option<NaiveDate>, time: NaiveTime) -> Self {
        let (year, month, day) = date.map_or((1, 1, 1), |d| (d.year(), d.month(), d.day()));
        Fields(
            [
                time.nanosecond() / 1_000,
                time.second(),
                time.minute(),
                time.hour(),
                day,
                month,
                0,
            ],
            year,
        )
    }

    fn zero() -> Self {
        Fields([0, 0, 0, 0, 1, 1, 0], 1)
    }
}

/// Copy of `dest` with every field at or below `unit` overwritten.
///
/// Fails with [`TimeError::DateFromTime`] when `unit` reaches into the calendar
/// and either side is a bare time of day.
pub fn replace_down<S: Stamp>(
    dest: &S,
    unit: Unit,
    source: Replacement<'_>,
) -> Result<S, TimeError> {
    let dest_date = dest.date_part();
    let src = match source {
        Replacement::From(src) => {
            if unit.is_date() && (dest_date.is_none() || src.date_part().is_none()) {
                return Err(TimeError::DateFromTime(unit));
            }
            Fields::of(src.date_part(), src.time_part())
        }
        Replacement::Zero => {
            if unit.is_date() && dest_date.is_none() {
                return Err(TimeError::DateFromTime(unit));
            }
            Fields::zero()
        }
    };

    let mut out = Fields::of(dest_date, dest.time_part());
    for (i, field) in Unit::ALL.iter().enumerate() {
        if *field > unit {
            break;
        }
        if *field == Unit::Year {
            out.1 = src.1;
        } else {
            out.0[i] = src.0[i];
        }
    }

    let [micro, second, minute, hour, day, month, _] = out.0;
    let time = NaiveTime::from_hms_micro_opt(hour, minute, second, micro).ok_or(
        TimeError::InvalidTime {
            hour,
            minute,
            second,
            micro,
        },
    )?;
    let date = match dest_date {
        Some(_) => Some(NaiveDate::from_ymd_opt(out.1, month, day).ok_or(
            TimeError::InvalidDate {
                year: out.1,
                month,
                day,
            },
        )?),
        None => None,
    };
    Ok(dest.with_parts(date, time))
}

/// `day` of the given month, clamped to the month's last day.
pub fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map_or(31, |d| d.day());
    NaiveDate::from_ymd_opt(year, month, day.clamp(1, last))
}

/// Interpret a wall-clock reading in `tz` as a UTC instant.
///
/// Ambiguous readings (DST fall-back) take the earlier instant. Readings inside
/// a DST gap are shifted forward by applying the offset in force just before.
pub fn localize(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            let offset = tz.offset_from_utc_datetime(&local).fix();
            Utc.from_utc_datetime(&(local - Duration::seconds(offset.local_minus_utc() as i64)))
        }
    }
}

/// Reinterpret `time` as a reading on `now`'s UTC date in `src`, then read it in `dst`.
pub fn tz_convert_time(time: NaiveTime, src: Tz, dst: Tz, now: DateTime<Utc>) -> NaiveTime {
    let local = NaiveDateTime::new(now.date_naive(), time);
    localize(src, local).with_timezone(&dst).time()
}

/// Today's (UTC) instant carrying `time` as its clock reading.
pub fn on_today(time: NaiveTime, now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&NaiveDateTime::new(now.date_naive(), time))
}

fn unit_alias(unit: &str) -> Option<char> {
    let unit = unit.to_lowercase();
    let base = unit.strip_suffix('s').filter(|b| b.len() > 1).unwrap_or(&unit);
    Some(match base {
        "s" | "sec" | "second" => 's',
        "m" | "min" | "minute" => 'm',
        "h" | "hr" | "hour" => 'h',
        "d" | "day" => 'd',
        "w" | "wk" | "week" => 'w',
        "n" | "month" => 'n',
        "y" | "yr" | "year" => 'y',
        _ => return None,
    })
}

/// Add a written duration like `3d8h5m4s` to `from`.
///
/// Errors are user-facing strings naming the offending piece.
pub fn parse_duration(text: &str, from: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let mut chars = text.chars().peekable();
    let mut at = from;

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut digits = String::new();
        while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            digits.push(d);
            chars.next();
        }
        if digits.is_empty() {
            return Err(format!("Didn't find a numerical value at character {c}."));
        }

        let mut unit = String::new();
        while let Some(&u) = chars.peek().filter(|u| u.is_alphabetic()) {
            unit.push(u);
            chars.next();
        }
        if unit.is_empty() {
            return Err(format!(
                "Didn't find a time unit corresponding to the value `{digits}`."
            ));
        }
        let Some(unit_char) = unit_alias(&unit) else {
            return Err(format!("`{unit}` is not a valid unit of time."));
        };

        let too_large = || format!("`{digits}{unit}` is too far in the future.");
        let amount: i64 = digits.parse().map_err(|_| too_large())?;
        let next = match unit_char {
            'n' | 'y' => {
                let months = if unit_char == 'y' {
                    amount.checked_mul(12)
                } else {
                    Some(amount)
                };
                months
                    .and_then(|m| u32::try_from(m).ok())
                    .and_then(|m| at.checked_add_months(Months::new(m)))
            }
            _ => {
                let seconds_per = match unit_char {
                    's' => 1,
                    'm' => 60,
                    'h' => 3_600,
                    'd' => 86_400,
                    _ => 7 * 86_400,
                };
                amount
                    .checked_mul(seconds_per)
                    .and_then(Duration::try_seconds)
                    .and_then(|d| at.checked_add_signed(d))
            }
        };
        at = next.ok_or_else(too_large)?;
    }
    Ok(at)
}

/// Ordinal suffix by the last-two-digit rule.
pub fn date_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// `8AM`, `4:05PM`: the instant's clock reading in `tz`.
pub fn logical_time_repr(stamp: DateTime<Utc>, tz: Tz) -> String {
    let local = stamp.with_timezone(&tz);
    let fmt = if local.minute() == 0 { "%I%p" } else { "%I:%M%p" };
    let out = local.format(fmt).to_string();
    out.strip_prefix('0').map(str::to_string).unwrap_or(out)
}

/// `at 8AM`, `on the 21st at 1:05PM`, `on Nov 3rd at 9AM`, `on 1/2/27 at 9AM`.
///
/// The date is mentioned only as far as it differs from `now` in `tz`.
pub fn logical_dt_repr(stamp: DateTime<Utc>, tz: Tz, now: DateTime<Utc>) -> String {
    let local = stamp.with_timezone(&tz);
    let curr = now.with_timezone(&tz);
    let day = local.day();

    let date = if local.year() != curr.year() {
        format!("on {} ", local.format("%-m/%-d/%y"))
    } else if local.month() != curr.month() {
        format!("on {} {day}{} ", local.format("%b"), date_suffix(day))
    } else if day != curr.day() {
        format!("on the {day}{} ", date_suffix(day))
    } else {
        String::new()
    };
    format!("{date}at {}", logical_time_repr(stamp, tz))
}

/// Day heading for reminder listings: `Today`, `Tomorrow`, `21st`, `Nov 3rd`, `1/2/27`.
pub fn relative_day_str(stamp: DateTime<Utc>, tz: Tz, now: DateTime<Utc>) -> String {
    let local = stamp.with_timezone(&tz);
    let curr = now.with_timezone(&tz);
    let day = local.day();

    if curr.date_naive().succ_opt() == Some(local.date_naive()) {
        "Tomorrow".to_string()
    } else if local.year() != curr.year() {
        local.format("%-m/%-d/%y").to_string()
    } else if local.month() != curr.month() {
        format!("{} {day}{}", local.format("%b"), date_suffix(day))
    } else if day != curr.day() {
        format!("{day}{}", date_suffix(day))
    } else {
        "Today".to_string()
    }
}

/// Offset of `tz` from UTC at `now`, in seconds.
pub fn utc_offset_seconds(tz: Tz, now: DateTime<Utc>) -> i64 {
    tz.offset_from_utc_datetime(&now.naive_utc())
        .fix()
        .local_minus_utc() as i64
}

/// Offset of `tz` from UTC at `now`, rounded to whole hours (ties to even).
pub fn utc_offset_hours(tz: Tz, now: DateTime<Utc>) -> i64 {
    (utc_offset_seconds(tz, now) as f64 / 3600.0).round_ties_even() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn parse_duration_units_and_calendar_months() {
        let reference = utc(2023, 1, 1, 0, 0, 0);
        assert_eq!(parse_duration("8m", reference), Ok(utc(2023, 1, 1, 0, 8, 0)));
        assert_eq!(parse_duration("3d8m", reference), Ok(utc(2023, 1, 4, 0, 8, 0)));
        assert_eq!(parse_duration("4n", reference), Ok(utc(2023, 5, 1, 0, 0, 0)));
        assert_eq!(parse_duration("2y4n", reference), Ok(utc(2025, 5, 1, 0, 0, 0)));
        assert_eq!(
            parse_duration("1 week 2 Days", reference),
            Ok(utc(2023, 1, 10, 0, 0, 0))
        );
    }

    #[test]
    fn parse_duration_is_associative() {
        let t0 = utc(2026, 10, 18, 9, 0, 0);
        let stepped = parse_duration("3d", t0).and_then(|t| parse_duration("8m", t));
        assert_eq!(parse_duration("3d8m", t0), stepped);
    }

    #[test]
    fn parse_duration_clamps_month_end() {
        let jan31 = utc(2026, 1, 31, 12, 0, 0);
        assert_eq!(parse_duration("1n", jan31), Ok(utc(2026, 2, 28, 12, 0, 0)));
    }

    #[test]
    fn parse_duration_errors() {
        let t0 = utc(2023, 1, 1, 0, 0, 0);
        assert_eq!(
            parse_duration("23", t0),
            Err("Didn't find a time unit corresponding to the value `23`.".to_string())
        );
        assert_eq!(
            parse_duration("23g", t0),
            Err("`g` is not a valid unit of time.".to_string())
        );
        assert_eq!(
            parse_duration("d3", t0),
            Err("Didn't find a numerical value at character d.".to_string())
        );
    }

    #[test]
    fn replace_down_round_trips_sub_hour_fields() {
        let original = utc(2026, 10, 18, 13, 5, 4);
        let other = utc(2001, 2, 3, 4, 6, 7);
        let scrambled = replace_down(&original, Unit::Hour, Replacement::From(&other)).unwrap();
        assert_eq!(scrambled, utc(2026, 10, 18, 4, 6, 7));
        let restored = replace_down(&scrambled, Unit::Hour, Replacement::From(&original)).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn replace_down_zero_and_time_sources() {
        let stamp = utc(2026, 10, 18, 13, 5, 4);
        assert_eq!(
            replace_down(&stamp, Unit::Hour, Replacement::Zero).unwrap(),
            utc(2026, 10, 18, 0, 0, 0)
        );
        assert_eq!(
            replace_down(&stamp, Unit::Hour, Replacement::From(&hm(8, 30))).unwrap(),
            utc(2026, 10, 18, 8, 30, 0)
        );
    }

    #[test]
    fn replace_down_rejects_dates_from_bare_times() {
        let stamp = utc(2026, 10, 18, 13, 5, 4);
        assert_eq!(
            replace_down(&stamp, Unit::Day, Replacement::From(&hm(8, 0))),
            Err(TimeError::DateFromTime(Unit::Day))
        );
        assert_eq!(
            replace_down(&hm(8, 0), Unit::Year, Replacement::From(&stamp)),
            Err(TimeError::DateFromTime(Unit::Year))
        );
    }

    #[test]
    fn clamped_dates() {
        let d = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
        assert_eq!(clamped_date(2026, 4, 31), d(2026, 4, 30));
        assert_eq!(clamped_date(2026, 2, 31), d(2026, 2, 28));
        assert_eq!(clamped_date(2028, 2, 30), d(2028, 2, 29));
        assert_eq!(clamped_date(2026, 12, 31), d(2026, 12, 31));
        assert_eq!(clamped_date(2026, 13, 1), None);
    }

    #[test]
    fn tz_convert_time_uses_offset_of_the_day() {
        let summer = utc(2026, 7, 1, 12, 0, 0);
        let winter = utc(2026, 1, 15, 12, 0, 0);
        let eastern: Tz = "US/Eastern".parse().unwrap();
        assert_eq!(tz_convert_time(hm(8, 0), eastern, Tz::UTC, summer), hm(12, 0));
        assert_eq!(tz_convert_time(hm(8, 0), eastern, Tz::UTC, winter), hm(13, 0));
        assert_eq!(tz_convert_time(hm(12, 0), Tz::UTC, eastern, summer), hm(8, 0));
    }

    #[test]
    fn localize_resolves_dst_gap() {
        let eastern: Tz = "US/Eastern".parse().unwrap();
        // 2:30AM does not exist on 2026-03-08 in US/Eastern.
        let gap = NaiveDate::from_ymd_opt(2026, 3, 8)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        assert_eq!(localize(eastern, gap), utc(2026, 3, 8, 7, 30, 0));
    }

    #[test]
    fn suffixes() {
        let got: Vec<_> = [1, 2, 3, 4, 11, 12, 13, 21, 22, 23, 31, 101, 111]
            .iter()
            .map(|d| date_suffix(*d))
            .collect();
        assert_eq!(
            got,
            ["st", "nd", "rd", "th", "th", "th", "th", "st", "nd", "rd", "st", "st", "th"]
        );
    }

    #[test]
    fn renders_relative_to_now() {
        let eastern: Tz = "US/Eastern".parse().unwrap();
        let now = utc(2026, 10, 18, 9, 0, 0);
        assert_eq!(logical_time_repr(utc(2026, 10, 18, 12, 0, 0), eastern), "8AM");
        assert_eq!(
            logical_dt_repr(utc(2026, 10, 21, 17, 5, 4), eastern, now),
            "on the 21st at 1:05PM"
        );
        assert_eq!(
            logical_dt_repr(utc(2026, 11, 3, 14, 0, 0), eastern, now),
            "on Nov 3rd at 9AM"
        );
        assert_eq!(
            logical_dt_repr(utc(2027, 1, 2, 14, 0, 0), eastern, now),
            "on 1/2/27 at 9AM"
        );
        assert_eq!(logical_dt_repr(utc(2026, 10, 18, 20, 30, 0), eastern, now), "at 4:30PM");
    }

    #[test]
    fn relative_day_headings() {
        let eastern: Tz = "US/Eastern".parse().unwrap();
        let now = utc(2026, 10, 18, 9, 0, 0);
        assert_eq!(relative_day_str(utc(2026, 10, 18, 20, 0, 0), eastern, now), "Today");
        assert_eq!(relative_day_str(utc(2026, 10, 19, 20, 0, 0), eastern, now), "Tomorrow");
        assert_eq!(relative_day_str(utc(2026, 10, 21, 20, 0, 0), eastern, now), "21st");
        assert_eq!(relative_day_str(utc(2026, 11, 3, 20, 0, 0), eastern, now), "Nov 3rd");
        assert_eq!(relative_day_str(utc(2027, 1, 2, 20, 0, 0), eastern, now), "1/2/27");
    }

    #[test]
    fn offsets_round_to_whole_hours() {
        let now = utc(2026, 10, 18, 9, 0, 0);
        let eastern: Tz = "US/Eastern".parse().unwrap();
        let kolkata: Tz = "Asia/Kolkata".parse().unwrap();
        assert_eq!(utc_offset_hours(eastern, now), -4);
        assert_eq!(utc_offset_hours(kolkata, now), 6);
        assert_eq!(utc_offset_hours(Tz::UTC, now), 0);
    }
}
