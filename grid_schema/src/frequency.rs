//! Chunking cadences used to split a requested range into report-sized windows.
//!
//! A [`Frequency`] names where chunk boundaries fall. Anchored variants
//! (`DAY_START`, `MONTH_START`, ...) cut at calendar boundaries in the
//! operator's local zone; [`Frequency::Days`] steps a fixed number of local
//! calendar days from the range start; [`Frequency::Minutes`] cuts on
//! UTC-aligned multiples of a minute count.
//!
//! ```
//! use grid_schema::frequency::Frequency;
//!
//! let f: Frequency = "31D".parse().unwrap();
//! assert_eq!(f.to_string(), "31D");
//! assert_eq!("MONTH_START".parse::<Frequency>().unwrap(), Frequency::MonthStart);
//! ```

use std::{fmt, num::NonZeroU32, str::FromStr};

use chrono::{DateTime, Datelike, Duration, DurationRound, NaiveDate, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::tz::{DstPolicy, localize_with_policy, start_of_day};

/// Where chunk boundaries fall when splitting a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// Every `n` minutes, aligned to UTC.
    Minutes(NonZeroU32),
    /// Top of every hour.
    HourStart,
    /// Local midnight.
    DayStart,
    /// Local midnight of the first of each month.
    MonthStart,
    /// Local midnight of January 1st.
    YearStart,
    /// Every `n` local calendar days counted from the range start.
    Days(NonZeroU32),
}

/// A frequency string that is not one of the known spellings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown frequency `{0}`")]
pub struct FrequencyParseError(pub String);

impl Frequency {
    /// First boundary strictly after `t`.
    pub fn next_after(&self, t: DateTime<Tz>) -> DateTime<Tz> {
        let tz = t.timezone();
        match *self {
            Frequency::Minutes(n) => step_utc(t, Duration::minutes(i64::from(n.get()))),
            Frequency::HourStart => step_utc(t, Duration::hours(1)),
            Frequency::DayStart => midnight(t.date_naive().succ_opt(), tz, t),
            Frequency::MonthStart => {
                let d = t.date_naive();
                let next = if d.month() == 12 {
                    NaiveDate::from_ymd_opt(d.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(d.year(), d.month() + 1, 1)
                };
                midnight(next, tz, t)
            }
            Frequency::YearStart => {
                midnight(NaiveDate::from_ymd_opt(t.year() + 1, 1, 1), tz, t)
            }
            Frequency::Days(n) => {
                let wall = t.naive_local() + Duration::days(i64::from(n.get()));
                localize_with_policy(wall, tz, DstPolicy::ShiftForward)
                    .unwrap_or_else(|_| t + Duration::days(i64::from(n.get())))
            }
        }
    }
}

fn step_utc(t: DateTime<Tz>, width: Duration) -> DateTime<Tz> {
    let utc = t.with_timezone(&Utc);
    let floor = utc.duration_trunc(width).unwrap_or(utc);
    (floor + width).with_timezone(&t.timezone())
}

fn midnight(date: Option<NaiveDate>, tz: Tz, fallback: DateTime<Tz>) -> DateTime<Tz> {
    date.and_then(|d| start_of_day(d, tz).ok())
        .unwrap_or_else(|| fallback + Duration::days(1))
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Minutes(n) => write!(f, "{n}_MIN"),
            Frequency::HourStart => f.write_str("HOUR_START"),
            Frequency::DayStart => f.write_str("DAY_START"),
            Frequency::MonthStart => f.write_str("MONTH_START"),
            Frequency::YearStart => f.write_str("YEAR_START"),
            Frequency::Days(n) => write!(f, "{n}D"),
        }
    }
}

impl FromStr for Frequency {
    type Err = FrequencyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || FrequencyParseError(s.to_string());
        match s {
            "HOUR_START" => return Ok(Frequency::HourStart),
            "DAY_START" => return Ok(Frequency::DayStart),
            "MONTH_START" => return Ok(Frequency::MonthStart),
            "YEAR_START" => return Ok(Frequency::YearStart),
            _ => {}
        }
        let positive = |digits: &str| {
            digits
                .parse::<u32>()
                .ok()
                .and_then(NonZeroU32::new)
                .ok_or_else(err)
        };
        if let Some(digits) = s.strip_suffix("_MIN") {
            return positive(digits).map(Frequency::Minutes);
        }
        if let Some(digits) = s.strip_suffix('D') {
            return positive(digits).map(Frequency::Days);
        }
        Err(err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(tz: Tz, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        tz.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    #[test]
    fn display_round_trips() {
        for s in ["5_MIN", "HOUR_START", "DAY_START", "MONTH_START", "YEAR_START", "31D", "365D"] {
            let f: Frequency = s.parse().unwrap();
            assert_eq!(f.to_string(), s);
        }
    }

    #[test]
    fn rejects_unknown_and_zero() {
        assert!("0D".parse::<Frequency>().is_err());
        assert!("WEEKLY".parse::<Frequency>().is_err());
        assert!("_MIN".parse::<Frequency>().is_err());
    }

    #[test]
    fn day_start_crosses_spring_forward() {
        let tz = chrono_tz::America::New_York;
        let t = at(tz, 2024, 3, 10, 0, 0);
        let next = Frequency::DayStart.next_after(t);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        assert_eq!(next - t, Duration::hours(23));
    }

    #[test]
    fn month_and_year_start() {
        let tz = chrono_tz::America::Chicago;
        let t = at(tz, 2023, 12, 15, 13, 0);
        assert_eq!(Frequency::MonthStart.next_after(t), at(tz, 2024, 1, 1, 0, 0));
        assert_eq!(Frequency::YearStart.next_after(t), at(tz, 2024, 1, 1, 0, 0));
        let mid_year = at(tz, 2024, 5, 2, 0, 0);
        assert_eq!(Frequency::MonthStart.next_after(mid_year), at(tz, 2024, 6, 1, 0, 0));
    }

    #[test]
    fn minutes_are_utc_aligned() {
        let tz = chrono_tz::America::Los_Angeles;
        let five: Frequency = "5_MIN".parse().unwrap();
        assert_eq!(five.next_after(at(tz, 2024, 1, 1, 0, 3)), at(tz, 2024, 1, 1, 0, 5));
        assert_eq!(five.next_after(at(tz, 2024, 1, 1, 0, 5)), at(tz, 2024, 1, 1, 0, 10));
        assert_eq!(
            Frequency::HourStart.next_after(at(tz, 2024, 1, 1, 7, 59)),
            at(tz, 2024, 1, 1, 8, 0)
        );
    }

    #[test]
    fn days_keep_wall_clock() {
        let tz = chrono_tz::America::New_York;
        let t = at(tz, 2024, 3, 1, 0, 0);
        let f: Frequency = "31D".parse().unwrap();
        assert_eq!(f.next_after(t), at(tz, 2024, 4, 1, 0, 0));
    }
}
