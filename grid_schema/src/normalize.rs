//! Steps that turn a parsed report into a canonical time-series table.
//!
//! Parsers produce operator-native tables whose time column already holds
//! localized timestamps. From there a typical pipeline is:
//!
//! 1. [`attach_intervals`] (or one of its variants) to derive `Time`,
//!    `Interval Start` and `Interval End`;
//! 2. a [`ColumnMap`](crate::columns::ColumnMap) rename;
//! 3. per chunk, [`concat_checked`], [`dedup_last_wins`] and
//!    [`restrict_to_window`] in the facade.
//!
//! Interval arithmetic is done on absolute instants, so a day that loses or
//! gains an hour to DST gets 23 or 25 hours of intervals.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDateTime};
use chrono_tz::Tz;
use polars::prelude::UniqueKeepStrategy;
use tracing::debug;

use crate::{
    columns::{INTERVAL_END, INTERVAL_START, LOCATION, LOCATION_TYPE, TIME},
    error::SchemaError,
    range::Window,
    table::{Table, Value, ValueKey},
    tz::{DstHint, SequenceLocalizer, localize_hinted, parse_naive, to_rfc3339},
};

/// Which edge of its interval a native timestamp marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    /// The timestamp is the interval start (also used for instantaneous samples).
    Start,
    /// The timestamp is the interval end ("hour ending").
    End,
}

fn put_interval_columns(
    table: &mut Table,
    starts: Vec<DateTime<Tz>>,
    ends: Vec<DateTime<Tz>>,
) -> Result<(), SchemaError> {
    for (row, (s, e)) in starts.iter().zip(&ends).enumerate() {
        if s >= e {
            return Err(SchemaError::EmptyInterval {
                row,
                start: to_rfc3339(s),
                end: to_rfc3339(e),
            });
        }
    }
    let starts: Vec<Value> = starts.into_iter().map(Value::Timestamp).collect();
    let ends: Vec<Value> = ends.into_iter().map(Value::Timestamp).collect();
    table.insert_column(0, TIME, starts.clone())?;
    table.insert_column(1, INTERVAL_START, starts)?;
    table.insert_column(2, INTERVAL_END, ends)?;
    Ok(())
}

/// Replace `time_col` with `Time`, `Interval Start` and `Interval End` at the
/// front of the table, given the native interval `length`.
pub fn attach_intervals(
    table: &mut Table,
    time_col: &str,
    stamp: Stamp,
    length: Duration,
) -> Result<(), SchemaError> {
    let times = table.timestamps(time_col)?;
    table.drop_columns(&[time_col])?;
    let (starts, ends) = match stamp {
        Stamp::Start => {
            let ends = times.iter().map(|t| *t + length).collect();
            (times, ends)
        }
        Stamp::End => {
            let starts = times.iter().map(|t| *t - length).collect();
            (starts, times)
        }
    };
    put_interval_columns(table, starts, ends)
}

/// Like [`attach_intervals`] for reports that carry both bounds.
pub fn attach_intervals_from_bounds(
    table: &mut Table,
    start_col: &str,
    end_col: &str,
) -> Result<(), SchemaError> {
    let starts = table.timestamps(start_col)?;
    let ends = table.timestamps(end_col)?;
    table.drop_columns(&[start_col, end_col])?;
    put_interval_columns(table, starts, ends)
}

/// For instantaneous samples at irregular spacing: each interval runs until
/// the next distinct timestamp, the last one for `last_length`.
pub fn attach_intervals_from_sequence(
    table: &mut Table,
    time_col: &str,
    last_length: Duration,
) -> Result<(), SchemaError> {
    let times = table.timestamps(time_col)?;
    let mut distinct: Vec<DateTime<Tz>> = times.clone();
    distinct.sort();
    distinct.dedup();
    let next: HashMap<DateTime<Tz>, DateTime<Tz>> = distinct
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .collect();
    let ends = times
        .iter()
        .map(|t| next.get(t).copied().unwrap_or(*t + last_length))
        .collect();
    table.drop_columns(&[time_col])?;
    put_interval_columns(table, times, ends)
}

/// Convert a text column of local wall-clock times into timestamps.
///
/// Rows are localized in report order with a [`SequenceLocalizer`], one per
/// distinct value of `group_by` when given, so that the repeated fall-back
/// hour is told apart within each location's sequence: by the clock stepping
/// back, or by the same wall time showing up again.
pub fn localize_column(
    table: &mut Table,
    column: &str,
    formats: &[&str],
    group_by: Option<&str>,
    tz: Tz,
) -> Result<(), SchemaError> {
    let i = table.require(column)?;
    let g = group_by.map(|g| table.require(g)).transpose()?;
    let mut localizers: HashMap<ValueKey, SequenceLocalizer> = HashMap::new();
    let mut out = Vec::with_capacity(table.len());
    for (row, values) in table.rows().iter().enumerate() {
        let raw = values[i].to_string();
        let naive: NaiveDateTime =
            parse_naive(&raw, formats).ok_or_else(|| SchemaError::InvalidValue {
                column: column.to_string(),
                row,
                message: format!("unrecognized time `{raw}`"),
            })?;
        let key = g.map_or(ValueKey::Null, |g| values[g].key());
        let localizer = localizers
            .entry(key)
            .or_insert_with(|| SequenceLocalizer::new(tz));
        out.push(Value::Timestamp(localizer.next(naive)?));
    }
    table.set_column(column, out)
}

/// Like [`localize_column`] for reports where every row carries its own DST
/// evidence in `hint_col` (a zone abbreviation, a repeated-hour flag).
///
/// Rows whose hint reads [`DstHint::Unknown`] fail on an ambiguous wall time.
pub fn localize_column_hinted(
    table: &mut Table,
    column: &str,
    formats: &[&str],
    hint_col: &str,
    hint: impl Fn(&Value) -> DstHint,
    tz: Tz,
) -> Result<(), SchemaError> {
    let i = table.require(column)?;
    let h = table.require(hint_col)?;
    let out = table
        .rows()
        .iter()
        .enumerate()
        .map(|(row, values)| {
            let raw = values[i].to_string();
            let naive = parse_naive(&raw, formats).ok_or_else(|| SchemaError::InvalidValue {
                column: column.to_string(),
                row,
                message: format!("unrecognized time `{raw}`"),
            })?;
            Ok(Value::Timestamp(localize_hinted(naive, tz, hint(&values[h]))?))
        })
        .collect::<Result<Vec<_>, SchemaError>>()?;
    table.set_column(column, out)
}

/// Remove rows whose `keys` repeat a later row.
///
/// The last occurrence of each key wins and rows keep their relative order.
/// Returns how many rows were removed.
pub fn dedup_last_wins(table: &mut Table, keys: &[&str]) -> Result<usize, SchemaError> {
    for k in keys {
        table.require(k)?;
    }
    let subset: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    let before = table.len();
    let unique = table
        .frame()
        .unique_stable(Some(&subset), UniqueKeepStrategy::Last, None)?;
    *table = Table::from(unique);
    let removed = before - table.len();
    if removed > 0 {
        debug!(removed, "dropped duplicate rows");
    }
    Ok(removed)
}

/// Key columns for [`dedup_last_wins`]: interval start, plus location when
/// the table has one.
pub fn dedup_keys(table: &Table) -> Vec<&'static str> {
    if table.has_column(LOCATION) {
        vec![INTERVAL_START, LOCATION]
    } else {
        vec![INTERVAL_START]
    }
}

/// Stable sort by `Interval Start`.
pub fn sort_chronological(table: &mut Table) -> Result<(), SchemaError> {
    table.sort_by_columns(&[INTERVAL_START])
}

fn bounds(table: &Table) -> Result<Option<(DateTime<Tz>, DateTime<Tz>)>, SchemaError> {
    let starts = table.timestamps(INTERVAL_START)?;
    let ends = table.timestamps(INTERVAL_END)?;
    Ok(starts.into_iter().min().zip(ends.into_iter().max()))
}

/// Concatenate chunk tables in order and sort the result chronologically.
///
/// Parts may carry different columns (a fuel that only appears in a later
/// chunk); the result has the union, null where a part had no value.
/// With `max_gap` set, a hole between the last interval of one non-empty part
/// and the first interval of the next that is longer than `max_gap` is a
/// [`SchemaError::Gap`].
pub fn concat_checked(parts: Vec<Table>, max_gap: Option<Duration>) -> Result<Table, SchemaError> {
    let mut out = Table::default();
    let mut previous_end: Option<DateTime<Tz>> = None;
    for part in parts {
        if part.is_empty() && !out.columns().is_empty() {
            continue;
        }
        if let (Some(gap), Some((start, end))) = (max_gap, bounds(&part)?) {
            if let Some(prev) = previous_end {
                if start - prev > gap {
                    return Err(SchemaError::Gap {
                        previous_end: to_rfc3339(&prev),
                        next_start: to_rfc3339(&start),
                        interval_minutes: gap.num_minutes(),
                    });
                }
            }
            previous_end = Some(previous_end.map_or(end, |p| p.max(end)));
        }
        out.append(part)?;
    }
    if out.has_column(INTERVAL_START) {
        sort_chronological(&mut out)?;
    }
    Ok(out)
}

/// Keep rows whose `Interval Start` falls inside `window`.
pub fn restrict_to_window(table: &mut Table, window: &Window) -> Result<(), SchemaError> {
    let i = table.require(INTERVAL_START)?;
    let before = table.len();
    table.retain_rows(|row| {
        row.values()[i]
            .as_timestamp()
            .is_some_and(|t| window.contains(&t))
    })?;
    let dropped = before - table.len();
    if dropped > 0 {
        debug!(dropped, "dropped rows outside the requested window");
    }
    Ok(())
}

/// Check that every interval is non-empty.
pub fn check_intervals(table: &Table) -> Result<(), SchemaError> {
    let starts = table.timestamps(INTERVAL_START)?;
    let ends = table.timestamps(INTERVAL_END)?;
    for (row, (s, e)) in starts.iter().zip(&ends).enumerate() {
        if s >= e {
            return Err(SchemaError::EmptyInterval {
                row,
                start: to_rfc3339(s),
                end: to_rfc3339(e),
            });
        }
    }
    Ok(())
}

/// Which pricing locations to keep.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LocationFilter {
    /// Every location in the report.
    #[default]
    All,
    /// Only these location ids (case-insensitive).
    Only(Vec<String>),
}

impl LocationFilter {
    /// Filter for the given ids.
    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LocationFilter::Only(ids.into_iter().map(Into::into).collect())
    }

    /// Whether `location` passes.
    pub fn matches(&self, location: &str) -> bool {
        match self {
            LocationFilter::All => true,
            LocationFilter::Only(ids) => ids.iter().any(|id| id.eq_ignore_ascii_case(location)),
        }
    }
}

/// Keep rows whose `Location` passes `filter`.
pub fn filter_locations(table: &mut Table, filter: &LocationFilter) -> Result<(), SchemaError> {
    if matches!(filter, LocationFilter::All) {
        return Ok(());
    }
    let i = table.require(LOCATION)?;
    table.retain_rows(|row| filter.matches(&row.values()[i].to_string()))

}

/// Keep rows whose `Location Type` equals `location_type` (case-insensitive).
pub fn filter_location_type(table: &mut Table, location_type: &str) -> Result<(), SchemaError> {
    let i = table.require(LOCATION_TYPE)?;
    table.retain_rows(|row| {
        row.values()[i]
            .as_str()
            .is_some_and(|t| t.eq_ignore_ascii_case(location_type))
    })
}

/// The row with the latest `Interval Start`, per location when the table
/// has one.
pub fn latest_per_location(table: &Table) -> Result<Table, SchemaError> {
    let mut sorted = table.clone();
    sort_chronological(&mut sorted)?;
    if !sorted.has_column(LOCATION) {
        return Ok(sorted.tail(1));
    }
    let subset = vec![LOCATION.to_string()];
    let latest = sorted
        .frame()
        .unique_stable(Some(&subset), UniqueKeepStrategy::Last, None)?;
    Ok(Table::from(latest))
}

/// The last row as a one-row table.
pub fn last_row(table: &Table) -> Table {
    table.tail(1)
}

/// Replace nulls in `columns` with `value`.
pub fn fill_null(table: &mut Table, columns: &[&str], value: Value) -> Result<(), SchemaError> {
    for c in columns {
        table.map_column(c, |v| if v.is_null() { value.clone() } else { v.clone() })?;
    }
    Ok(())
}

/// Row-wise sum of numeric columns; nulls count as zero, a row of only
/// nulls sums to null.
pub fn sum_columns(table: &Table, columns: &[&str]) -> Result<Vec<Value>, SchemaError> {
    let idx = columns
        .iter()
        .map(|c| table.require(c))
        .collect::<Result<Vec<_>, _>>()?;
    table
        .rows()
        .iter()
        .enumerate()
        .map(|(row, values)| {
            let mut total: Option<f64> = None;
            for &i in &idx {
                match &values[i] {
                    Value::Null => {}
                    v => {
                        let x = v.as_f64().ok_or_else(|| SchemaError::InvalidValue {
                            column: table.columns()[i].clone(),
                            row,
                            message: format!("expected a number, found {v:?}"),
                        })?;
                        total = Some(total.unwrap_or(0.0) + x);
                    }
                }
            }
            Ok(Value::from(total))
        })
        .collect()
}

/// Drop rows where every column other than `except` is null.
pub fn drop_empty_rows(table: &mut Table, except: &[&str]) -> Result<usize, SchemaError> {
    let check: Vec<usize> = table
        .columns()
        .into_iter()
        .enumerate()
        .filter(|(_, c)| !except.contains(&c.as_str()))
        .map(|(i, _)| i)
        .collect();
    let before = table.len();
    table.retain_rows(|row| check.iter().any(|&i| !row.values()[i].is_null()))?;
    let dropped = before - table.len();
    if dropped > 0 {
        debug!(dropped, "dropped rows with no values");
    }
    Ok(dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    const LA: Tz = chrono_tz::America::Los_Angeles;

    fn five_minute_day(date: NaiveDate, tz: Tz) -> Table {
        let w = Window::day(date, tz).unwrap();
        let mut rows = Vec::new();
        let mut t = w.start;
        while t < w.end {
            rows.push(vec![Value::Timestamp(t), Value::Float(1.0)]);
            t += Duration::minutes(5);
        }
        Table::from_rows(["ts", "Load"], rows).unwrap()
    }

    #[test]
    fn zone_abbreviations_resolve_the_repeated_hour() {
        let ny = chrono_tz::America::New_York;
        let rows = ["EDT", "EST", "EST"]
            .iter()
            .zip(["11/03/2024 01:30", "11/03/2024 01:30", "11/03/2024 02:00"])
            .map(|(z, t)| vec![Value::text(t), Value::text(*z)])
            .collect();
        let mut t = Table::from_rows(["Time Stamp", "Time Zone"], rows).unwrap();
        localize_column_hinted(
            &mut t,
            "Time Stamp",
            &["%m/%d/%Y %H:%M"],
            "Time Zone",
            |v| DstHint::from_abbreviation(&v.to_string()),
            ny,
        )
        .unwrap();
        let ts = t.timestamps("Time Stamp").unwrap();
        assert_eq!(ts[1] - ts[0], Duration::hours(1));
        assert_eq!(ts[2] - ts[1], Duration::minutes(30));
    }

    #[test]
    fn end_stamped_intervals() {
        let t0 = LA.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let mut t = Table::from_rows(["HE", "LMP"], vec![vec![t0.into(), 20.0.into()]]).unwrap();
        attach_intervals(&mut t, "HE", Stamp::End, Duration::hours(1)).unwrap();
        assert_eq!(t.columns(), [TIME, INTERVAL_START, INTERVAL_END, "LMP"]);
        assert_eq!(
            t.rows()[0][1],
            Value::Timestamp(LA.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(t.rows()[0][0], t.rows()[0][1]);
    }

    fn hourly_wall_times(date: &str, hours: &[u32]) -> Table {
        let rows = hours
            .iter()
            .map(|h| vec![Value::text(format!("{date} {h:02}:00")), Value::Float(f64::from(*h))])
            .collect();
        Table::from_rows(["ts", "Load"], rows).unwrap()
    }

    fn distinct_starts(t: &Table) -> usize {
        let mut starts = t.timestamps(INTERVAL_START).unwrap();
        starts.sort();
        starts.dedup();
        starts.len()
    }

    #[test]
    fn dst_days_have_fewer_and_more_intervals() {
        let ny = chrono_tz::America::New_York;
        let fmt = ["%Y-%m-%d %H:%M"];

        let mut fall: Vec<u32> = vec![0, 1];
        fall.extend(1..24);
        let mut t = hourly_wall_times("2024-11-03", &fall);
        localize_column(&mut t, "ts", &fmt, None, ny).unwrap();
        attach_intervals(&mut t, "ts", Stamp::Start, Duration::hours(1)).unwrap();
        let keys = dedup_keys(&t);
        assert_eq!(dedup_last_wins(&mut t, &keys).unwrap(), 0);
        assert_eq!(t.len(), 25);
        assert_eq!(distinct_starts(&t), 25);

        let spring: Vec<u32> = (0..24).filter(|h| *h != 2).collect();
        let mut t = hourly_wall_times("2024-03-10", &spring);
        localize_column(&mut t, "ts", &fmt, None, ny).unwrap();
        attach_intervals(&mut t, "ts", Stamp::Start, Duration::hours(1)).unwrap();
        let keys = dedup_keys(&t);
        dedup_last_wins(&mut t, &keys).unwrap();
        assert_eq!(distinct_starts(&t), 23);

        let mut t = hourly_wall_times("2024-03-10", &[1, 2]);
        assert!(localize_column(&mut t, "ts", &fmt, None, ny).is_err());
    }

    #[test]
    fn sequence_intervals_run_to_next_sample() {
        let t0 = LA.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = t0 + Duration::minutes(7);
        let mut t = Table::from_rows(
            ["ts", "Wind"],
            vec![vec![t0.into(), 1.0.into()], vec![t1.into(), 2.0.into()]],
        )
        .unwrap();
        attach_intervals_from_sequence(&mut t, "ts", Duration::minutes(5)).unwrap();
        assert_eq!(t.rows()[0][2], Value::Timestamp(t1));
        assert_eq!(t.rows()[1][2], Value::Timestamp(t1 + Duration::minutes(5)));
    }

    #[test]
    fn dedup_keeps_last_occurrence_in_order() {
        let t0 = LA.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = t0 + Duration::minutes(5);
        let mut t = Table::from_rows(
            [INTERVAL_START, LOCATION, "LMP"],
            vec![
                vec![t0.into(), "A".into(), 1.0.into()],
                vec![t1.into(), "A".into(), 2.0.into()],
                vec![t0.into(), "A".into(), 3.0.into()],
                vec![t0.into(), "B".into(), 4.0.into()],
            ],
        )
        .unwrap();
        let keys = dedup_keys(&t);
        assert_eq!(dedup_last_wins(&mut t, &keys).unwrap(), 1);
        assert_eq!(t.len(), 3);
        let lmps: Vec<Value> = t.rows().into_iter().map(|r| r[2].clone()).collect();
        assert_eq!(lmps, [Value::Float(2.0), Value::Float(3.0), Value::Float(4.0)]);
    }

    fn chunk(day: u32) -> Table {
        let mut t = five_minute_day(NaiveDate::from_ymd_opt(2024, 1, day).unwrap(), LA);
        attach_intervals(&mut t, "ts", Stamp::Start, Duration::minutes(5)).unwrap();
        t
    }

    #[test]
    fn concat_detects_gaps() {
        let joined = concat_checked(vec![chunk(1), chunk(2)], Some(Duration::minutes(5))).unwrap();
        assert_eq!(joined.len(), 2 * 288);

        let err = concat_checked(vec![chunk(1), chunk(3)], Some(Duration::minutes(5))).unwrap_err();
        assert!(matches!(err, SchemaError::Gap { interval_minutes: 5, .. }));

        // unchecked concatenation tolerates the hole
        assert!(concat_checked(vec![chunk(1), chunk(3)], None).is_ok());
    }

    fn fuel_chunk(start: DateTime<Tz>, fuels: &[&str]) -> Table {
        let mut columns = vec![INTERVAL_START.to_string(), INTERVAL_END.to_string()];
        columns.extend(fuels.iter().map(|f| f.to_string()));
        let rows = (0..3)
            .map(|i| {
                let t = start + Duration::minutes(5 * i);
                let mut row = vec![Value::Timestamp(t), Value::Timestamp(t + Duration::minutes(5))];
                row.extend(fuels.iter().map(|_| Value::Float(10.0)));
                row
            })
            .collect();
        Table::from_rows(columns, rows).unwrap()
    }

    #[test]
    fn concat_unions_fuel_columns_across_chunks() {
        let t0 = LA.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let early = fuel_chunk(t0, &["Hydro", "Wind"]);
        let late = fuel_chunk(t0 + Duration::minutes(15), &["Hydro", "Wind", "Other Renewables"]);
        let joined = concat_checked(vec![late, early], Some(Duration::minutes(5))).unwrap();
        assert_eq!(
            joined.columns(),
            [INTERVAL_START, INTERVAL_END, "Hydro", "Wind", "Other Renewables"]
        );
        assert_eq!(joined.len(), 6);
        let other = joined.column("Other Renewables").unwrap();
        assert!(other[..3].iter().all(Value::is_null));
        assert!(other[3..].iter().all(|v| *v == Value::Float(10.0)));
    }

    #[test]
    fn concat_sorts_out_of_order_parts() {
        let joined = concat_checked(vec![chunk(2), chunk(1)], Some(Duration::minutes(5))).unwrap();
        let starts = joined.timestamps(INTERVAL_START).unwrap();
        assert!(starts.windows(2).all(|p| p[0] < p[1]));
    }

    #[test]
    fn restrict_and_latest() {
        let mut t = concat_checked(vec![chunk(1), chunk(2)], None).unwrap();
        let w = Window::day(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), LA).unwrap();
        restrict_to_window(&mut t, &w).unwrap();
        assert_eq!(t.len(), 288);
        let latest = latest_per_location(&t).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest, last_row(&t));
    }

    #[test]
    fn localize_column_groups_by_location() {
        let ny = chrono_tz::America::New_York;
        let rows = ["01:30", "01:30", "01:30", "01:30"]
            .iter()
            .zip(["A", "B", "A", "B"])
            .map(|(t, loc)| vec![format!("2024-11-03 {t}").into(), loc.into()])
            .collect();
        let mut t = Table::from_rows(["ts", LOCATION], rows).unwrap();
        localize_column(&mut t, "ts", &["%Y-%m-%d %H:%M"], Some(LOCATION), ny).unwrap();
        let ts = t.timestamps("ts").unwrap();
        assert_eq!(ts[0], ts[1]);
        assert_eq!(ts[2], ts[3]);
        assert_eq!(ts[2] - ts[0], Duration::hours(1));

        let rows = ["01:55", "01:00"]
            .iter()
            .map(|t| vec![format!("2024-11-03 {t}").into(), "A".into()])
            .collect();
        let mut t = Table::from_rows(["ts", LOCATION], rows).unwrap();
        localize_column(&mut t, "ts", &["%Y-%m-%d %H:%M"], Some(LOCATION), ny).unwrap();
        let ts = t.timestamps("ts").unwrap();
        assert_eq!(ts[1] - ts[0], Duration::minutes(5));
    }

    #[test]
    fn sums_skip_nulls() {
        let t = Table::from_rows(
            ["a", "b"],
            vec![
                vec![1.0.into(), Value::Null],
                vec![Value::Null, Value::Null],
                vec![2.0.into(), 3.0.into()],
            ],
        )
        .unwrap();
        assert_eq!(
            sum_columns(&t, &["a", "b"]).unwrap(),
            vec![Value::Float(1.0), Value::Null, Value::Float(5.0)]
        );
    }

    #[test]
    fn location_filters() {
        let mut t = Table::from_rows(
            [LOCATION, LOCATION_TYPE],
            vec![
                vec!["HB_HOUSTON".into(), "Trading Hub".into()],
                vec!["LZ_WEST".into(), "Load Zone".into()],
            ],
        )
        .unwrap();
        let mut only = t.clone();
        filter_locations(&mut only, &LocationFilter::only(["hb_houston"])).unwrap();
        assert_eq!(only.len(), 1);
        filter_location_type(&mut t, "load zone").unwrap();
        assert_eq!(t.rows()[0][0], Value::Text("LZ_WEST".into()));
    }
}
