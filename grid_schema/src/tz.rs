//! Time zone parsing and localization helpers.
//!
//! Operators publish civil wall-clock times in their local zone. Turning those
//! into instants needs care twice a year:
//! - "spring forward" skips an hour, so some wall times never happen;
//! - "fall back" repeats an hour, so some wall times happen twice.
//!
//! What this module provides:
//! - [`localize_with_policy`]: one wall time to one instant under a [`DstPolicy`].
//! - [`localize_hinted`]: same, but the row carries an explicit [`DstHint`]
//!   (an `EDT`/`EST` column, a repeated-hour flag, an `02X` hour label).
//! - [`SequenceLocalizer`]: resolves ambiguous wall times from the order in
//!   which they appear. Once the clock steps backwards or repeats itself
//!   inside the ambiguous hour, later ambiguous times belong to standard time.
//! - [`parse_instant`]: timestamps that already carry an offset or `Z`.
//!
//! Examples (America/New_York):
//! - 2024-03-10 02:30 does not exist; [`DstPolicy::ShiftForward`] lands on 03:00 (07:00Z).
//! - 2024-11-03 01:30 occurs twice: earliest is 05:30Z, latest is 06:30Z.

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
    offset::LocalResult,
};
use chrono_tz::Tz;

use crate::error::DstError;

/// Policy for handling DST edge cases when converting local naive timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstPolicy {
    /// Error on ambiguous (fall-back) or nonexistent (spring-forward) local times.
    Strict,
    /// For ambiguous local times pick the earlier instant (the daylight-time one).
    PreferEarliest,
    /// For ambiguous local times pick the later instant (the standard-time one).
    PreferLatest,
    /// For nonexistent local times shift forward in one-minute steps until the
    /// first valid instant (capped at 2 hours). Ambiguous times take the earliest.
    ShiftForward,
}

/// Per-row evidence about which side of a fall-back transition a wall time is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DstHint {
    /// The row carries no evidence.
    #[default]
    Unknown,
    /// The row is stamped in daylight time (e.g. `EDT`, or not the repeated hour).
    Daylight,
    /// The row is stamped in standard time (e.g. `EST`, or the repeated hour).
    Standard,
}

impl DstHint {
    /// Interpret a zone abbreviation column such as NYISO's `Time Zone`.
    ///
    /// Any abbreviation ending in `DT` is daylight time, one ending in `ST`
    /// is standard time; everything else gives no evidence.
    pub fn from_abbreviation(abbr: &str) -> Self {
        let abbr = abbr.trim().to_ascii_uppercase();
        if abbr.ends_with("DT") {
            DstHint::Daylight
        } else if abbr.ends_with("ST") {
            DstHint::Standard
        } else {
            DstHint::Unknown
        }
    }

    /// Interpret a repeated-hour flag (`Y` means the second, standard-time pass).
    pub fn from_repeated_flag(repeated: bool) -> Self {
        if repeated {
            DstHint::Standard
        } else {
            DstHint::Daylight
        }
    }
}

/// Parse an IANA zone name such as `America/New_York`.
pub fn parse_zone(name: &str) -> Result<Tz, DstError> {
    name.parse::<Tz>()
        .map_err(|_| DstError::UnknownZone(name.to_string()))
}

/// Convert a naive local timestamp to an aware one under a DST policy.
///
/// - A wall time that maps to a single instant is returned as is.
/// - An ambiguous wall time follows the policy: `PreferEarliest` and
///   `ShiftForward` pick the earlier instant, `PreferLatest` the later one,
///   `Strict` errors.
/// - A nonexistent wall time errors unless the policy is `ShiftForward`.
pub fn localize_with_policy(
    naive: NaiveDateTime,
    tz: Tz,
    policy: DstPolicy,
) -> Result<DateTime<Tz>, DstError> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, latest) => match policy {
            DstPolicy::PreferEarliest | DstPolicy::ShiftForward => Ok(earliest),
            DstPolicy::PreferLatest => Ok(latest),
            DstPolicy::Strict => Err(DstError::Ambiguous { local: naive, tz }),
        },
        LocalResult::None => match policy {
            DstPolicy::ShiftForward => {
                let mut t = naive;
                for _ in 0..120 {
                    t += Duration::minutes(1);
                    if let LocalResult::Single(dt) = tz.from_local_datetime(&t) {
                        return Ok(dt);
                    }
                }
                Err(DstError::Nonexistent { local: naive, tz })
            }
            _ => Err(DstError::Nonexistent { local: naive, tz }),
        },
    }
}

/// Strict localization: errors on ambiguous and nonexistent wall times.
pub fn localize(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Tz>, DstError> {
    localize_with_policy(naive, tz, DstPolicy::Strict)
}

/// Localize using an explicit per-row hint; without a hint this is strict.
pub fn localize_hinted(
    naive: NaiveDateTime,
    tz: Tz,
    hint: DstHint,
) -> Result<DateTime<Tz>, DstError> {
    let policy = match hint {
        DstHint::Unknown => DstPolicy::Strict,
        DstHint::Daylight => DstPolicy::PreferEarliest,
        DstHint::Standard => DstPolicy::PreferLatest,
    };
    localize_with_policy(naive, tz, policy)
}

/// Local midnight that starts `date`.
///
/// Midnight itself is skipped in a handful of zones, so this shifts forward
/// to the first instant of the day when needed.
pub fn start_of_day(date: NaiveDate, tz: Tz) -> Result<DateTime<Tz>, DstError> {
    localize_with_policy(date.and_time(NaiveTime::MIN), tz, DstPolicy::ShiftForward)
}

/// Resolves a run of wall times whose only DST evidence is their order.
///
/// Feed the wall times of one series (one location, one fuel) in the order
/// the report lists them. Ambiguous wall times resolve to daylight time until
/// the clock is seen stepping backwards or giving the same wall time twice,
/// after which they resolve to standard time. Leaving the ambiguous hour
/// resets the state. An hourly file stamps the repeated hour with the same
/// `01:00` both times, so a repeat is the only evidence there is; rows of
/// different series must therefore go to different localizers.
#[derive(Debug, Clone)]
pub struct SequenceLocalizer {
    tz: Tz,
    previous: Option<NaiveDateTime>,
    repeated: bool,
}

impl SequenceLocalizer {
    /// Start a new sequence in `tz`.
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            previous: None,
            repeated: false,
        }
    }

    /// Localize the next wall time of the sequence.
    pub fn next(&mut self, naive: NaiveDateTime) -> Result<DateTime<Tz>, DstError> {
        let resolved = match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => {
                self.repeated = false;
                dt
            }
            LocalResult::Ambiguous(earliest, latest) => {
                if self.previous.is_some_and(|prev| prev >= naive) {
                    self.repeated = true;
                }
                if self.repeated { latest } else { earliest }
            }
            LocalResult::None => {
                return Err(DstError::Nonexistent {
                    local: naive,
                    tz: self.tz,
                });
            }
        };
        self.previous = Some(naive);
        Ok(resolved)
    }
}

/// Parse a timestamp that carries its own offset and convert it to `tz`.
///
/// Accepts RFC 3339 (`2024-01-01T06:00:00Z`, `2024-01-01T00:00:00-06:00`),
/// the same with a space separator, and compact offsets (`-0600`).
pub fn parse_instant(s: &str, tz: Tz) -> Option<DateTime<Tz>> {
    parse_offset_datetime(s).map(|dt| dt.with_timezone(&tz))
}

/// Parse a timestamp with an explicit offset, keeping the offset.
pub fn parse_offset_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%.f %z",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
}

/// Parse a naive timestamp that is known to be UTC and convert it to `tz`.
pub fn parse_utc_naive(s: &str, formats: &[&str], tz: Tz) -> Option<DateTime<Tz>> {
    let naive = parse_naive(s, formats)?;
    Some(Utc.from_utc_datetime(&naive).with_timezone(&tz))
}

/// Try each `strftime` format in turn.
pub fn parse_naive(s: &str, formats: &[&str]) -> Option<NaiveDateTime> {
    let s = s.trim();
    formats
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Format an aware timestamp as RFC 3339 with its local offset.
pub fn to_rfc3339<T: TimeZone>(dt: &DateTime<T>) -> String
where
    T::Offset: std::fmt::Display,
{
    dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ny() -> Tz {
        parse_zone("America/New_York").unwrap()
    }

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn ny_spring_forward_gap_is_error_strict() {
        // America/New_York jumps from 02:00 to 03:00 on 2024-03-10.
        let res = localize(local(2024, 3, 10, 2, 30), ny());
        assert!(matches!(res, Err(DstError::Nonexistent { .. })));
    }

    #[test]
    fn ny_spring_forward_gap_shift_forward_to_3am() {
        let got = localize_with_policy(local(2024, 3, 10, 2, 30), ny(), DstPolicy::ShiftForward)
            .unwrap();
        let want = Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap();
        assert_eq!(got.with_timezone(&Utc), want);
    }

    #[test]
    fn ny_fall_back_ambiguous_is_error_strict() {
        let res = localize(local(2024, 11, 3, 1, 30), ny());
        assert!(matches!(res, Err(DstError::Ambiguous { .. })));
    }

    #[test]
    fn ny_fall_back_prefer_earliest_and_latest() {
        let naive = local(2024, 11, 3, 1, 30);
        let earliest = localize_with_policy(naive, ny(), DstPolicy::PreferEarliest).unwrap();
        let latest = localize_with_policy(naive, ny(), DstPolicy::PreferLatest).unwrap();
        assert_eq!(
            earliest.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 11, 3, 5, 30, 0).unwrap()
        );
        assert_eq!(
            latest.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 11, 3, 6, 30, 0).unwrap()
        );
    }

    #[test]
    fn hints_pick_the_matching_side() {
        let naive = local(2024, 11, 3, 1, 0);
        let edt = localize_hinted(naive, ny(), DstHint::from_abbreviation("EDT")).unwrap();
        let est = localize_hinted(naive, ny(), DstHint::from_abbreviation("est")).unwrap();
        assert_eq!(est - edt, Duration::hours(1));
        assert!(localize_hinted(naive, ny(), DstHint::Unknown).is_err());
    }

    #[test]
    fn sequence_resolves_repeated_hour_in_order() {
        let mut seq = SequenceLocalizer::new(ny());
        let walls = [
            local(2024, 11, 3, 0, 30),
            local(2024, 11, 3, 1, 0),
            local(2024, 11, 3, 1, 30),
            local(2024, 11, 3, 1, 0),
            local(2024, 11, 3, 1, 30),
            local(2024, 11, 3, 2, 0),
        ];
        let got: Vec<_> = walls
            .iter()
            .map(|w| seq.next(*w).unwrap().with_timezone(&Utc))
            .collect();
        for pair in got.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::minutes(30));
        }
    }

    #[test]
    fn sequence_treats_a_repeated_hour_stamp_as_the_switch() {
        // hourly file: 00:00, 01:00, 01:00, 02:00 on the fall-back day
        let mut seq = SequenceLocalizer::new(ny());
        let walls = [
            local(2024, 11, 3, 0, 0),
            local(2024, 11, 3, 1, 0),
            local(2024, 11, 3, 1, 0),
            local(2024, 11, 3, 2, 0),
        ];
        let got: Vec<_> = walls
            .iter()
            .map(|w| seq.next(*w).unwrap().with_timezone(&Utc))
            .collect();
        for pair in got.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::hours(1));
        }
        let after = seq.next(local(2024, 11, 4, 1, 0)).unwrap();
        assert_eq!(to_rfc3339(&after), "2024-11-04T01:00:00-05:00");
    }

    #[test]
    fn sequence_resets_after_leaving_the_ambiguous_hour() {
        let mut seq = SequenceLocalizer::new(ny());
        seq.next(local(2024, 11, 3, 1, 0)).unwrap();
        seq.next(local(2024, 11, 3, 1, 0)).unwrap();
        seq.next(local(2024, 11, 3, 2, 0)).unwrap();
        // a fresh series on the next transition starts on daylight time again
        let next_year = seq.next(local(2025, 11, 2, 1, 0)).unwrap();
        assert_eq!(to_rfc3339(&next_year), "2025-11-02T01:00:00-04:00");
    }

    #[test]
    fn start_of_day_on_transition_days() {
        let spring = start_of_day(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(), ny()).unwrap();
        let next = start_of_day(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(), ny()).unwrap();
        assert_eq!(next - spring, Duration::hours(23));
    }

    #[test]
    fn parse_instant_variants() {
        let tz = parse_zone("America/Chicago").unwrap();
        let want = Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();
        for s in [
            "2024-01-01T06:00:00Z",
            "2024-01-01T00:00:00-06:00",
            "2024-01-01 00:00:00-0600",
            "2024-01-01 00:00:00-06:00",
        ] {
            let got = parse_instant(s, tz).unwrap_or_else(|| panic!("failed on {s}"));
            assert_eq!(got.with_timezone(&Utc), want, "{s}");
        }
        assert!(parse_instant("not a time", tz).is_none());
    }

    #[test]
    fn unknown_zone_is_reported() {
        assert_eq!(
            parse_zone("Mars/Olympus"),
            Err(DstError::UnknownZone("Mars/Olympus".into()))
        );
    }
}
