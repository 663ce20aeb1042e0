//! ISO New England.
//!
//! Every report is a CSV with a block of `"C"` comment lines, a header line
//! and a units line before the `"D"` data rows, and a trailing `"T"` line.
//! The site only answers with CSV once the session carries its cookies, so
//! each request first loads the home page.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use grid_schema::{
    Market, RangePlan, Schema, SchemaError, Stamp, Table, Value, Window,
    columns::{
        CONGESTION, ENERGY, INTERVAL_START, LMP, LMP_COLUMNS, LOAD, LOCATION, LOCATION_TYPE,
        LOSS, MARKET,
    },
    frequency::Frequency,
    normalize::{
        attach_intervals, attach_intervals_from_sequence, fill_null, last_row,
        latest_per_location, localize_column, sort_chronological,
    },
};
use tracing::{debug, warn};

use super::{
    SourceAdapter, Span, is_current_day,
    payload::{numbers, read_csv_lines},
};
use crate::{
    errors::{Error, UpstreamError},
    http::{HttpClient, NO_QUERY, Payload},
    models::{
        operator::Operator,
        request::{Dataset, Query},
    },
};

const TZ: Tz = chrono_tz::America::New_York;
const HOME: &str = "https://www.iso-ne.com/";
const TRANSFORM: &str = "https://www.iso-ne.com/transform/csv";
const HIST_REPORTS: &str = "https://www.iso-ne.com/static-transform/csv/histRpts";

const SKIP_ROWS: [usize; 5] = [0, 1, 2, 3, 5];
const CSV_ATTEMPTS: u32 = 3;

const TIME_FORMATS: [&str; 4] = [
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M",
];
const STAMP: &str = "Stamp";

/// The six 4-hour files a day of preliminary 5-minute prices is split into.
const FIVE_MINUTE_FILES: [&str; 6] = ["00-04", "04-08", "08-12", "12-16", "16-20", "20-24"];

const MARKETS: [Market; 3] = [
    Market::RealTime5Min,
    Market::RealTimeHourly,
    Market::DayAheadHourly,
];

const LOCATION_TYPES: [&str; 4] = ["HUB", "LOAD ZONE", "NETWORK NODE", "EXT. NODE"];

/// Read a report body, dropping the comment block, the units line, the
/// trailer and the record-type column.
pub fn read_report(report: &str, body: &[u8]) -> Result<Table, SchemaError> {
    let mut table = read_csv_lines(report, body, &SKIP_ROWS, 1)?;
    table.drop_columns(&["H"])?;
    Ok(table)
}

fn joined(table: &Table, date_col: &str, time_col: &str) -> Result<Vec<Value>, SchemaError> {
    let d = table.require(date_col)?;
    let t = table.require(time_col)?;
    Ok(table
        .rows()
        .iter()
        .map(|r| Value::Text(format!("{} {}", r[d], r[t])))
        .collect())
}

/// Fuel mix from one `genfuelmix` day.
///
/// Samples come at irregular times; each interval runs until the next
/// sample. Fuels missing from a sample count as zero.
pub fn shape_fuel_mix(raw: Table) -> Result<Table, SchemaError> {
    let mut raw = raw;
    let stamps = joined(&raw, "Date", "Time")?;
    raw.push_column(STAMP, stamps)?;
    localize_column(&mut raw, STAMP, &TIME_FORMATS, Some("Fuel Category"), TZ)?;
    numbers(&mut raw, &["Gen Mw"])?;
    let mut wide = raw.pivot(&[STAMP], "Fuel Category", "Gen Mw")?;
    let fuels: Vec<String> = wide.columns()[1..].to_vec();
    let fuels: Vec<&str> = fuels.iter().map(String::as_str).collect();
    fill_null(&mut wide, &fuels, Value::Float(0.0))?;
    attach_intervals_from_sequence(&mut wide, STAMP, Duration::minutes(5))?;
    sort_chronological(&mut wide)?;
    Ok(wide)
}

/// Five-minute system load from one `fiveminutesystemload` day.
pub fn shape_load(raw: Table) -> Result<Table, SchemaError> {
    let mut raw = raw;
    localize_column(&mut raw, "Date/Time", &TIME_FORMATS, None, TZ)?;
    numbers(&mut raw, &["Native Load"])?;
    raw.rename_column("Native Load", LOAD)?;
    let mut out = raw.select(&["Date/Time", LOAD])?;
    attach_intervals(&mut out, "Date/Time", Stamp::Start, Duration::minutes(5))?;
    Ok(out)
}

/// Start of the hour labelled `label` on `date`.
///
/// Labels count hours ending; a 23-hour day skips `02` and a 25-hour day
/// repeats it as `02X`.
pub fn hour_ending_start(date: NaiveDate, label: &str) -> Result<DateTime<Tz>, SchemaError> {
    let day = Window::day(date, TZ).map_err(|e| SchemaError::parse("hour ending", e))?;
    let label = label.trim();
    let hours = day.duration().num_hours();
    let invalid = || SchemaError::parse("hour ending", format!("unrecognized hour `{label}`"));
    let index = if label.eq_ignore_ascii_case("02X") {
        2
    } else {
        let he: i64 = label.parse().map_err(|_| invalid())?;
        if !(1..=24).contains(&he) {
            return Err(invalid());
        }
        match hours {
            23 if he >= 3 => he - 2,
            25 if he >= 3 => he,
            _ => he - 1,
        }
    };
    Ok(day.start + Duration::hours(index))
}

/// Day-ahead or real-time hourly prices from one day file.
pub fn shape_hourly_lmp(raw: Table, market: Market) -> Result<Table, SchemaError> {
    let mut raw = raw;
    let date_i = raw.require("Date")?;
    let he_i = raw.require("Hour Ending")?;
    let starts = raw
        .rows()
        .iter()
        .map(|r| {
            let date = NaiveDate::parse_from_str(&r[date_i].to_string(), "%m/%d/%Y")
                .or_else(|_| NaiveDate::parse_from_str(&r[date_i].to_string(), "%Y-%m-%d"))
                .map_err(|e| SchemaError::parse("hour ending", e))?;
            hour_ending_start(date, &r[he_i].to_string()).map(Value::Timestamp)
        })
        .collect::<Result<Vec<_>, _>>()?;
    raw.push_column(STAMP, starts)?;
    raw.rename_any(&["Location Name"], LOCATION)?;
    finish_lmp(raw, market, Duration::hours(1))
}

/// Five-minute prices from the 4-hour files of one day. The files carry only
/// location ids; names and types come from `locations`, keyed by id.
pub fn shape_five_minute_lmp(
    raw: Table,
    date: NaiveDate,
    locations: &HashMap<String, (String, String)>,
) -> Result<Table, SchemaError> {
    let mut raw = raw;
    raw.map_column("Local Time", |v| Value::Text(format!("{date} {v}")))?;
    localize_column(&mut raw, "Local Time", &TIME_FORMATS, Some("Location ID"), TZ)?;
    raw.rename_column("Local Time", STAMP)?;
    let id_i = raw.require("Location ID")?;
    let (names, types): (Vec<Value>, Vec<Value>) = raw
        .rows()
        .iter()
        .map(|r| match locations.get(&r[id_i].to_string()) {
            Some((name, kind)) => (Value::text(name), Value::text(kind)),
            None => (Value::Null, Value::Null),
        })
        .unzip();
    raw.push_column(LOCATION, names)?;
    raw.set_column(LOCATION_TYPE, types)?;
    finish_lmp(raw, Market::RealTime5Min, Duration::minutes(5))
}

/// Map location ids to `(name, type)` from a day-ahead file.
pub fn location_index(day_ahead: &Table) -> Result<HashMap<String, (String, String)>, SchemaError> {
    let id = day_ahead.require("Location ID")?;
    let name = day_ahead.require("Location Name")?;
    let kind = day_ahead.require(LOCATION_TYPE)?;
    Ok(day_ahead
        .rows()
        .iter()
        .map(|r| (r[id].to_string(), (r[name].to_string(), r[kind].to_string())))
        .collect())
}

fn finish_lmp(mut raw: Table, market: Market, length: Duration) -> Result<Table, SchemaError> {
    raw.rename_any(&["Locational Marginal Price", LMP], LMP)?;
    raw.rename_any(&["Energy Component"], ENERGY)?;
    raw.rename_any(&["Congestion Component"], CONGESTION)?;
    raw.rename_any(&["Marginal Loss Component", "Loss Component"], LOSS)?;
    numbers(&mut raw, &[LMP, ENERGY, CONGESTION, LOSS])?;
    attach_intervals(&mut raw, STAMP, Stamp::Start, length)?;
    raw.fill_column(MARKET, Value::text(market.as_str()))?;
    let mut out = raw.select(&LMP_COLUMNS)?;
    out.sort_by_columns(&[INTERVAL_START, LOCATION])?;
    Ok(out)
}

/// ISO-NE adapter.
#[derive(Debug, Clone)]
pub struct Isone {
    http: HttpClient,
}

impl Isone {
    /// Adapter on the given client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// GET a CSV report, priming the session cookies first. The site
    /// sometimes answers with an HTML page; that is retried a few times.
    async fn csv(&self, url: &str) -> Result<Payload, UpstreamError> {
        let mut attempt = 1;
        loop {
            self.http.get(HOME, NO_QUERY).await?;
            let payload = self.http.get(url, NO_QUERY).await?;
            match payload.expect_content_type("text/csv") {
                Ok(()) => return Ok(payload),
                Err(e) if attempt < CSV_ATTEMPTS => {
                    warn!(url, attempt, error = %e, "expected csv, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn report(&self, url: &str) -> Result<Table, Error> {
        let payload = self.csv(url).await?;
        Ok(read_report(url, &payload.body)?)
    }

    async fn day_ahead(&self, date: NaiveDate) -> Result<Table, Error> {
        self.report(&format!(
            "{HIST_REPORTS}/da-lmp/WW_DALMP_ISO_{}.csv",
            date.format("%Y%m%d")
        ))
        .await
    }

    async fn five_minute(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<Table, Error> {
        let today = is_current_day(date, TZ, now);
        let hour = now.with_timezone(&TZ).hour();
        let mut raw = Table::default();
        for (i, file) in FIVE_MINUTE_FILES.iter().enumerate() {
            // files for the current day appear once their four hours are over
            if today && (i as u32 + 1) * 4 > hour {
                break;
            }
            let url = format!(
                "{HIST_REPORTS}/5min-rt-prelim/lmp_5min_{}_{file}.csv",
                date.format("%Y%m%d")
            );
            match self.report(&url).await {
                Ok(part) => raw.append(part)?,
                Err(Error::Upstream(e)) if e.is_not_found() => debug!(%url, "not published"),
                Err(e) => return Err(e),
            }
        }
        if raw.is_empty() {
            return Err(Error::no_data(Dataset::Lmp, date.to_string()));
        }
        let locations = location_index(&self.day_ahead(date).await?)?;
        Ok(shape_five_minute_lmp(raw, date, &locations)?)
    }
}

#[async_trait]
impl SourceAdapter for Isone {
    fn operator(&self) -> Operator {
        Operator::Isone
    }

    fn lmp_markets(&self) -> &'static [Market] {
        &MARKETS
    }

    fn location_types(&self) -> &'static [&'static str] {
        &LOCATION_TYPES
    }

    fn range_plan(&self, _query: &Query, _window: &Window, _now: DateTime<Utc>) -> RangePlan {
        RangePlan::every(Frequency::DayStart)
    }

    fn native_interval(&self, query: &Query) -> Option<Duration> {
        match query.dataset {
            Dataset::Load => Some(Duration::minutes(5)),
            Dataset::Lmp => query.market.map(|m| Duration::minutes(m.interval_minutes())),
            _ => None,
        }
    }

    async fn fuel_mix(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        let date = span.resolve(TZ, now)?.start.date_naive();
        let raw = self
            .report(&format!("{TRANSFORM}/genfuelmix?start={}", date.format("%Y%m%d")))
            .await?;
        let table = shape_fuel_mix(raw)?;
        Schema::FuelMix.validate(&table)?;
        Ok(match span {
            Span::Latest => last_row(&table),
            Span::Window(_) => table,
        })
    }

    async fn load(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        let date = span.resolve(TZ, now)?.start.date_naive();
        let day = date.format("%Y%m%d");
        let raw = self
            .report(&format!("{TRANSFORM}/fiveminutesystemload?start={day}&end={day}"))
            .await?;
        let table = shape_load(raw)?;
        Ok(match span {
            Span::Latest => last_row(&table),
            Span::Window(_) => table,
        })
    }

    async fn lmp(&self, query: &Query, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        let market = query
            .market
            .ok_or_else(|| Error::InvalidRequest("lmp requires a market".into()))?;
        let date = span.resolve(TZ, now)?.start.date_naive();
        let table = match market {
            Market::DayAheadHourly => shape_hourly_lmp(self.day_ahead(date).await?, market)?,
            Market::RealTimeHourly => {
                if date > now.with_timezone(&TZ).date_naive() {
                    return Err(Error::InvalidRequest(format!(
                        "real-time prices for {date} are not published yet"
                    )));
                }
                let raw = self
                    .report(&format!(
                        "{HIST_REPORTS}/rt-lmp/lmp_rt_prelim_{}.csv",
                        date.format("%Y%m%d")
                    ))
                    .await?;
                shape_hourly_lmp(raw, market)?
            }
            Market::RealTime5Min => self.five_minute(date, now).await?,
            other => {
                return Err(Error::not_supported(Operator::Isone, format!("market {other}")));
            }
        };
        Ok(match span {
            Span::Latest => latest_per_location(&table)?,
            Span::Window(_) => table,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_schema::{
        columns::{INTERVAL_END, TIME},
        normalize::{dedup_keys, dedup_last_wins},
        tz::to_rfc3339,
    };

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn wrap(header: &str, units: &str, rows: &[&str]) -> Vec<u8> {
        let mut body = String::from(
            "\"C\",\"Report\"\n\"C\",\"Generated\"\n\"C\",\"For\"\n\"C\",\"Notes\"\n",
        );
        body.push_str(header);
        body.push('\n');
        body.push_str(units);
        body.push('\n');
        for r in rows {
            body.push_str(r);
            body.push('\n');
        }
        body.push_str("\"T\",\"4\"\n");
        body.into_bytes()
    }

    #[test]
    fn hour_ending_labels_follow_dst() {
        let ts = |d, l| to_rfc3339(&hour_ending_start(day(d), l).unwrap());
        assert_eq!(ts("2024-01-02", "01"), "2024-01-02T00:00:00-05:00");
        assert_eq!(ts("2024-01-02", "24"), "2024-01-02T23:00:00-05:00");
        assert_eq!(ts("2024-03-10", "03"), "2024-03-10T01:00:00-05:00");
        assert_eq!(ts("2024-03-10", "04"), "2024-03-10T03:00:00-04:00");
        assert_eq!(ts("2024-11-03", "02"), "2024-11-03T01:00:00-04:00");
        assert_eq!(ts("2024-11-03", "02X"), "2024-11-03T01:00:00-05:00");
        assert_eq!(ts("2024-11-03", "03"), "2024-11-03T02:00:00-05:00");
        assert!(hour_ending_start(day("2024-01-02"), "25").is_err());
    }

    #[test]
    fn day_ahead_prices() {
        let body = wrap(
            "\"H\",\"Date\",\"Hour Ending\",\"Location ID\",\"Location Name\",\"Location Type\",\"Locational Marginal Price\",\"Energy Component\",\"Congestion Component\",\"Marginal Loss Component\"",
            "\"H\",\"\",\"\",\"\",\"\",\"\",\"$/MWh\",\"$/MWh\",\"$/MWh\",\"$/MWh\"",
            &[
                "\"D\",\"11/03/2024\",\"02X\",\"4000\",\".H.INTERNAL_HUB\",\"HUB\",\"31.2\",\"30.0\",\"0.5\",\"0.7\"",
                "\"D\",\"11/03/2024\",\"02\",\"4000\",\".H.INTERNAL_HUB\",\"HUB\",\"35.2\",\"34.0\",\"0.5\",\"0.7\"",
            ],
        );
        let raw = read_report("da", &body).unwrap();
        let lmp = shape_hourly_lmp(raw, Market::DayAheadHourly).unwrap();
        Schema::Lmp.validate(&lmp).unwrap();
        assert_eq!(lmp.len(), 2);
        assert_eq!(lmp.rows()[0][6], Value::Float(35.2));
        let starts = lmp.timestamps(INTERVAL_START).unwrap();
        assert_eq!(starts[1] - starts[0], Duration::hours(1));
        assert_eq!(lmp.rows()[0][5], Value::text("HUB"));
    }

    #[test]
    fn load_and_fuel_mix() {
        let load = wrap(
            "\"H\",\"Date/Time\",\"Native Load\",\"ARD Demand\"",
            "\"H\",\"\",\"MW\",\"MW\"",
            &[
                "\"D\",\"01/02/2024 00:00\",\"12000.5\",\"10\"",
                "\"D\",\"01/02/2024 00:05\",\"11950\",\"11\"",
            ],
        );
        let load = shape_load(read_report("load", &load).unwrap()).unwrap();
        Schema::Load.validate(&load).unwrap();
        assert_eq!(load.columns().len(), 4);
        assert_eq!(load.rows()[1][3], Value::Float(11950.0));

        let mix = wrap(
            "\"H\",\"Date\",\"Time\",\"Fuel Category\",\"Gen Mw\",\"Fuel Category Rollup\",\"Marginal Flag\"",
            "\"H\",\"\",\"\",\"\",\"\",\"\",\"\"",
            &[
                "\"D\",\"01/02/2024\",\"00:01:37\",\"Nuclear\",\"3300\",\"Nuclear\",\"N\"",
                "\"D\",\"01/02/2024\",\"00:01:37\",\"Wind\",\"400\",\"Renewables\",\"N\"",
                "\"D\",\"01/02/2024\",\"00:06:12\",\"Nuclear\",\"3301\",\"Nuclear\",\"N\"",
            ],
        );
        let mix = shape_fuel_mix(read_report("mix", &mix).unwrap()).unwrap();
        Schema::FuelMix.validate(&mix).unwrap();
        assert_eq!(mix.len(), 2);
        assert_eq!(mix.rows()[1][4], Value::Float(0.0));
        let ends = mix.timestamps(INTERVAL_END).unwrap();
        let starts = mix.timestamps(INTERVAL_START).unwrap();
        assert_eq!(ends[0], starts[1]);
        assert_eq!(ends[1] - starts[1], Duration::minutes(5));
        assert_eq!(mix.timestamps(TIME).unwrap(), starts);
    }

    fn five_minute_load_day(date: &str, hours: &[u32]) -> Table {
        let rows: Vec<String> = hours
            .iter()
            .flat_map(|h| (0..60).step_by(5).map(move |m| (*h, m)))
            .map(|(h, m)| format!("\"D\",\"{date} {h:02}:{m:02}\",\"12000\",\"10\""))
            .collect();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let body = wrap(
            "\"H\",\"Date/Time\",\"Native Load\",\"ARD Demand\"",
            "\"H\",\"\",\"MW\",\"MW\"",
            &rows,
        );
        let mut load = shape_load(read_report("load", &body).unwrap()).unwrap();
        let keys = dedup_keys(&load);
        dedup_last_wins(&mut load, &keys).unwrap();
        load
    }

    #[test]
    fn five_minute_load_follows_dst_day_length() {
        let distinct = |t: &Table| {
            let mut starts = t.timestamps(INTERVAL_START).unwrap();
            starts.sort();
            starts.dedup();
            starts.len()
        };

        let mut fall = vec![0, 1];
        fall.extend(1..24);
        let load = five_minute_load_day("11/03/2024", &fall);
        assert_eq!(load.len(), 300);
        assert_eq!(distinct(&load), 300);
        let starts = load.timestamps(INTERVAL_START).unwrap();
        assert_eq!(to_rfc3339(&starts[24]), "2024-11-03T01:00:00-05:00");
        assert_eq!(starts[24] - starts[23], Duration::minutes(5));

        let spring: Vec<u32> = (0..24).filter(|h| *h != 2).collect();
        let load = five_minute_load_day("03/10/2024", &spring);
        assert_eq!(distinct(&load), 276);
    }

    #[test]
    fn five_minute_prices_take_names_from_day_ahead() {
        let body = wrap(
            "\"H\",\"Local Time\",\"Location ID\",\"LMP\",\"Energy Component\",\"Congestion Component\",\"Loss Component\"",
            "\"H\",\"\",\"\",\"\",\"\",\"\",\"\"",
            &[
                "\"D\",\"00:00\",\"4000\",\"30\",\"29\",\"0.5\",\"0.5\"",
                "\"D\",\"00:05\",\"4000\",\"31\",\"30\",\"0.5\",\"0.5\"",
                "\"D\",\"00:05\",\"9999\",\"31\",\"30\",\"0.5\",\"0.5\"",
            ],
        );
        let mut index = HashMap::new();
        index.insert("4000".to_string(), (".H.INTERNAL_HUB".to_string(), "HUB".to_string()));
        let lmp =
            shape_five_minute_lmp(read_report("5min", &body).unwrap(), day("2024-01-02"), &index)
                .unwrap();
        Schema::Lmp.validate(&lmp).unwrap();
        assert_eq!(lmp.len(), 3);
        let hub = lmp.row(0).unwrap();
        assert_eq!(hub.get(LOCATION), Some(&Value::text(".H.INTERNAL_HUB")));
        assert_eq!(hub.get(MARKET), Some(&Value::text("REAL_TIME_5_MIN")));
        assert!(lmp.rows().iter().any(|r| r[4].is_null()));
    }
}
