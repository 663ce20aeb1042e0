//! New York ISO.
//!
//! NYISO publishes one CSV per day and report under
//! `http://mis.nyiso.com/public/csv/{dataset}/`. The last week is served as
//! loose daily files; older days only inside the monthly zip archive.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use grid_schema::{
    ColumnMap, Market, RangePlan, Schema, SchemaError, Stamp, Table, Value, Window,
    columns::{
        CONGESTION, ENERGY, FORECAST_TIME, INTERVAL_END, INTERVAL_START, LMP, LMP_COLUMNS, LOAD,
        LOAD_FORECAST, LOCATION, LOCATION_TYPE, LOSS, MARKET, TIME,
    },
    frequency::Frequency,
    normalize::{
        attach_intervals, last_row, latest_per_location, localize_column, localize_column_hinted,
        sum_columns,
    },
    tz::{DstHint, start_of_day},
};
use tracing::{debug, info};

use super::{
    SourceAdapter, Span,
    payload::{numbers, read_csv, unzip},
};
use crate::{
    errors::Error,
    http::{HttpClient, NO_QUERY},
    models::{
        operator::Operator,
        request::{Dataset, Query},
    },
};

const TZ: Tz = chrono_tz::America::New_York;
const ARCHIVE: &str = "http://mis.nyiso.com/public/csv";
const TIME_FORMATS: [&str; 2] = ["%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M"];
const STAMP: &str = "Time Stamp";
const FILE_DATE: &str = "File Date";

/// Days before today that are still served as loose daily files.
const LOOSE_FILE_DAYS: i64 = 7;

const MARKETS: [Market; 2] = [Market::RealTime5Min, Market::DayAheadHourly];
const LOCATION_TYPES: [&str; 2] = ["Zone", "Generator"];

const LMP_RENAMES: [(&str, &str); 4] = [
    ("Name", LOCATION),
    ("LBMP ($/MWHr)", LMP),
    ("Marginal Cost Losses ($/MWHr)", LOSS),
    ("Marginal Cost Congestion ($/MWHr)", CONGESTION),
];

/// A report in the archive: directory name and file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    dataset: &'static str,
    file: String,
}

impl Report {
    fn same(dataset: &'static str) -> Self {
        Self {
            dataset,
            file: dataset.to_string(),
        }
    }

    /// Price report for `market`, zonal or per generator.
    pub fn lmp(market: Market, location_type: Option<&str>) -> Option<Self> {
        let dataset = match market {
            Market::DayAheadHourly => "damlbmp",
            Market::RealTime5Min => "realtime",
            _ => return None,
        };
        let suffix = match location_type {
            Some(t) if t.eq_ignore_ascii_case("Generator") => "gen",
            _ => "zone",
        };
        Some(Self {
            dataset,
            file: format!("{dataset}_{suffix}"),
        })
    }

    fn daily_url(&self, date: NaiveDate) -> String {
        format!("{ARCHIVE}/{}/{}", self.dataset, self.member(date))
    }

    fn monthly_url(&self, month: NaiveDate) -> String {
        format!(
            "{ARCHIVE}/{}/{}{}_csv.zip",
            self.dataset,
            month.format("%Y%m01"),
            self.file
        )
    }

    fn member(&self, date: NaiveDate) -> String {
        format!("{}{}.csv", date.format("%Y%m%d"), self.file)
    }
}

/// Localize one daily file.
///
/// Files that carry a `Time Zone` column resolve the repeated fall-back
/// hour from it. Files without one are localized in order, per `Name` when
/// the file lists several locations per timestamp.
pub fn localize_day(report: &str, body: &[u8], date: NaiveDate) -> Result<Table, SchemaError> {
    let mut table = read_csv(report, body)?;
    table.rename_any(&[STAMP, "Timestamp"], STAMP)?;
    if table.has_column("Time Zone") {
        localize_column_hinted(
            &mut table,
            STAMP,
            &TIME_FORMATS,
            "Time Zone",
            |v| DstHint::from_abbreviation(&v.to_string()),
            TZ,
        )?;
    } else {
        let group = table.has_column("Name").then_some("Name");
        localize_column(&mut table, STAMP, &TIME_FORMATS, group, TZ)?;
    }
    table.fill_column(FILE_DATE, Value::Timestamp(start_of_day(date, TZ)?))?;
    Ok(table)
}

/// Fuel mix from concatenated `rtfuelmix` days.
pub fn shape_fuel_mix(raw: Table) -> Result<Table, SchemaError> {
    let mut raw = raw;
    numbers(&mut raw, &["Gen MW"])?;
    let mut wide = raw.pivot(&[STAMP], "Fuel Category", "Gen MW")?;
    attach_intervals(&mut wide, STAMP, Stamp::Start, Duration::minutes(5))?;
    Ok(wide)
}

/// Load from concatenated `pal` days: `Load` is the sum of the zones,
/// followed by one column per zone.
pub fn shape_load(raw: Table) -> Result<Table, SchemaError> {
    let mut raw = raw;
    numbers(&mut raw, &["Load"])?;
    let mut wide = raw.pivot(&[STAMP], "Name", "Load")?;
    let zones: Vec<String> = wide.columns()[1..].to_vec();
    let zone_refs: Vec<&str> = zones.iter().map(String::as_str).collect();
    let total = sum_columns(&wide, &zone_refs)?;
    wide.insert_column(1, LOAD, total)?;
    attach_intervals(&mut wide, STAMP, Stamp::Start, Duration::minutes(5))?;
    Ok(wide)
}

/// Hourly system load forecast from concatenated `isolf` days. The file
/// date is the forecast time.
pub fn shape_load_forecast(raw: Table) -> Result<Table, SchemaError> {
    let mut raw = raw;
    numbers(&mut raw, &["NYISO"])?;
    attach_intervals(&mut raw, STAMP, Stamp::Start, Duration::hours(1))?;
    raw.rename_column(FILE_DATE, FORECAST_TIME)?;
    raw.rename_column("NYISO", LOAD_FORECAST)?;
    raw.select(&[TIME, INTERVAL_START, INTERVAL_END, FORECAST_TIME, LOAD_FORECAST])
}

/// Prices from concatenated `damlbmp` or `realtime` days.
///
/// Day-ahead rows are stamped at the interval start, real-time rows at the
/// interval end.
pub fn shape_lmp(raw: Table, market: Market, location_type: &str) -> Result<Table, SchemaError> {
    let mut raw = raw;
    let (stamp, length) = match market {
        Market::RealTime5Min => (Stamp::End, Duration::minutes(5)),
        _ => (Stamp::Start, Duration::hours(1)),
    };
    attach_intervals(&mut raw, STAMP, stamp, length)?;
    ColumnMap::new(Schema::Lmp, &LMP_RENAMES)?.apply(&mut raw)?;
    numbers(&mut raw, &[LMP, LOSS, CONGESTION])?;
    let energy = raw
        .iter()
        .map(|r| {
            let get = |c| r.get(c).and_then(Value::as_f64);
            match (get(LMP), get(LOSS), get(CONGESTION)) {
                (Some(lmp), Some(loss), Some(cong)) => Value::Float(lmp - (loss - cong)),
                _ => Value::Null,
            }
        })
        .collect();
    raw.push_column(ENERGY, energy)?;
    raw.fill_column(MARKET, Value::text(market.as_str()))?;
    raw.fill_column(LOCATION_TYPE, Value::text(location_type))?;
    raw.select(&LMP_COLUMNS)
}

/// NYISO adapter.
#[derive(Debug, Clone)]
pub struct Nyiso {
    http: HttpClient,
}

impl Nyiso {
    /// Adapter on the given client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Every daily file of `report` the window touches, localized and
    /// concatenated. Days absent from the archive are skipped.
    async fn days(
        &self,
        report: &Report,
        dataset: Dataset,
        window: &Window,
        now: DateTime<Utc>,
    ) -> Result<Table, Error> {
        let today = now.with_timezone(&TZ).date_naive();
        let dates = window.dates();
        let loose = dates
            .iter()
            .all(|d| *d > today - Duration::days(LOOSE_FILE_DAYS));

        let mut files: Vec<(NaiveDate, Vec<u8>)> = Vec::with_capacity(dates.len());
        if loose {
            for date in &dates {
                match self.http.get(&report.daily_url(*date), NO_QUERY).await {
                    Ok(payload) => files.push((*date, payload.body)),
                    Err(e) if e.is_not_found() => debug!(%date, file = %report.file, "no daily file"),
                    Err(e) => return Err(e.into()),
                }
            }
        } else {
            let mut months: Vec<NaiveDate> = dates.iter().filter_map(|d| d.with_day(1)).collect();
            months.dedup();
            for month in months {
                let url = report.monthly_url(month);
                info!(%url, "fetching monthly archive");
                let members = unzip(&self.http.get(&url, NO_QUERY).await?)?;
                for date in dates.iter().filter(|d| d.with_day(1) == Some(month)) {
                    let name = report.member(*date);
                    match members.iter().find(|(n, _)| *n == name) {
                        Some((_, body)) => files.push((*date, body.clone())),
                        None => debug!(%name, "member not in archive"),
                    }
                }
            }
        }

        if files.is_empty() {
            return Err(Error::no_data(dataset, window.to_string()));
        }
        let mut table = Table::default();
        for (date, body) in files {
            table.append(localize_day(&report.member(date), &body, date)?)?;
        }
        Ok(table)
    }
}

#[async_trait]
impl SourceAdapter for Nyiso {
    fn operator(&self) -> Operator {
        Operator::Nyiso
    }

    fn lmp_markets(&self) -> &'static [Market] {
        &MARKETS
    }

    fn location_types(&self) -> &'static [&'static str] {
        &LOCATION_TYPES
    }

    fn range_plan(&self, _query: &Query, _window: &Window, _now: DateTime<Utc>) -> RangePlan {
        RangePlan::every(Frequency::MonthStart)
    }

    fn native_interval(&self, query: &Query) -> Option<Duration> {
        match query.dataset {
            Dataset::FuelMix | Dataset::Supply | Dataset::Load => Some(Duration::minutes(5)),
            Dataset::LoadForecast => Some(Duration::hours(1)),
            Dataset::Lmp => query.market.map(|m| Duration::minutes(m.interval_minutes())),
            Dataset::InterconnectionQueue => None,
        }
    }

    async fn fuel_mix(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        let window = span.resolve(TZ, now)?;
        let raw = self
            .days(&Report::same("rtfuelmix"), Dataset::FuelMix, &window, now)
            .await?;
        let table = shape_fuel_mix(raw)?;
        Ok(match span {
            Span::Latest => last_row(&table),
            Span::Window(_) => table,
        })
    }

    async fn load(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        let window = span.resolve(TZ, now)?;
        let raw = self
            .days(&Report::same("pal"), Dataset::Load, &window, now)
            .await?;
        let table = shape_load(raw)?;
        Ok(match span {
            Span::Latest => last_row(&table),
            Span::Window(_) => table,
        })
    }

    async fn load_forecast(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        let window = span.resolve(TZ, now)?;
        let raw = self
            .days(&Report::same("isolf"), Dataset::LoadForecast, &window, now)
            .await?;
        Ok(shape_load_forecast(raw)?)
    }

    async fn lmp(&self, query: &Query, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        let market = query
            .market
            .ok_or_else(|| Error::InvalidRequest("lmp requires a market".into()))?;
        let location_type = query.location_type.as_deref();
        let report = Report::lmp(market, location_type)
            .ok_or_else(|| Error::not_supported(Operator::Nyiso, format!("market {market}")))?;
        let window = span.resolve(TZ, now)?;
        let raw = self.days(&report, Dataset::Lmp, &window, now).await?;
        let label = match location_type {
            Some(t) if t.eq_ignore_ascii_case("Generator") => "Generator",
            _ => "Zone",
        };
        let table = shape_lmp(raw, market, label)?;
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
        normalize::{dedup_keys, dedup_last_wins},
        tz::to_rfc3339,
    };

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn archive_urls() {
        let r = Report::lmp(Market::DayAheadHourly, None).unwrap();
        assert_eq!(
            r.daily_url(day("2024-03-05")),
            "http://mis.nyiso.com/public/csv/damlbmp/20240305damlbmp_zone.csv"
        );
        assert_eq!(
            r.monthly_url(day("2024-03-01")),
            "http://mis.nyiso.com/public/csv/damlbmp/20240301damlbmp_zone_csv.zip"
        );
        let g = Report::lmp(Market::RealTime5Min, Some("generator")).unwrap();
        assert_eq!(g.member(day("2024-03-05")), "20240305realtime_gen.csv");
        assert!(Report::lmp(Market::RealTimeHourly, None).is_none());
    }

    #[test]
    fn fuel_mix_resolves_fall_back_from_time_zone_column() {
        let body = "\
Time Stamp,Time Zone,Fuel Category,Gen MW
11/03/2024 01:55:00,EDT,Hydro,3000
11/03/2024 01:55:00,EDT,Wind,500
11/03/2024 01:00:00,EST,Hydro,3010
11/03/2024 01:00:00,EST,Wind,510
";
        let raw = localize_day("rtfuelmix", body.as_bytes(), day("2024-11-03")).unwrap();
        let mix = shape_fuel_mix(raw).unwrap();
        Schema::FuelMix.validate(&mix).unwrap();
        assert_eq!(mix.columns()[3..], ["Hydro", "Wind"]);
        let starts = mix.timestamps(INTERVAL_START).unwrap();
        assert_eq!(starts[1] - starts[0], Duration::minutes(5));
        assert_eq!(to_rfc3339(&starts[1]), "2024-11-03T01:00:00-05:00");
    }

    #[test]
    fn load_sums_zones_first() {
        let body = "\
Time Stamp,Time Zone,Name,PTID,Load
01/02/2024 00:00:00,EST,CAPITL,61757,1200.5
01/02/2024 00:00:00,EST,WEST,61752,1700
01/02/2024 00:05:00,EST,CAPITL,61757,1190
01/02/2024 00:05:00,EST,WEST,61752,
";
        let load = shape_load(localize_day("pal", body.as_bytes(), day("2024-01-02")).unwrap())
            .unwrap();
        Schema::Load.validate(&load).unwrap();
        assert_eq!(load.columns()[3..], [LOAD, "CAPITL", "WEST"]);
        assert_eq!(load.rows()[0][3], Value::Float(2900.5));
        assert_eq!(load.rows()[1][3], Value::Float(1190.0));
    }

    #[test]
    fn realtime_prices_are_end_stamped() {
        let body = "\
Time Stamp,Name,PTID,LBMP ($/MWHr),Marginal Cost Losses ($/MWHr),Marginal Cost Congestion ($/MWHr)
01/02/2024 00:05:00,N.Y.C.,61761,30.0,1.5,-2.0
01/02/2024 00:05:00,WEST,61752,20.0,0.5,0.0
";
        let raw = localize_day("realtime_zone", body.as_bytes(), day("2024-01-02")).unwrap();
        let lmp = shape_lmp(raw, Market::RealTime5Min, "Zone").unwrap();
        Schema::Lmp.validate(&lmp).unwrap();
        let nyc = lmp.row(0).unwrap();
        assert_eq!(
            nyc.get(INTERVAL_START).and_then(Value::as_timestamp).map(|t| to_rfc3339(&t)),
            Some("2024-01-02T00:00:00-05:00".into())
        );
        assert_eq!(nyc.get(ENERGY), Some(&Value::Float(26.5)));
        assert_eq!(nyc.get(LOCATION_TYPE), Some(&Value::text("Zone")));
        assert_eq!(nyc.get(MARKET), Some(&Value::text("REAL_TIME_5_MIN")));
    }

    fn day_ahead_west(date: &str, hours: &[u32]) -> String {
        let mut body = String::from(
            "Time Stamp,Name,PTID,LBMP ($/MWHr),Marginal Cost Losses ($/MWHr),Marginal Cost Congestion ($/MWHr)\n",
        );
        for (i, h) in hours.iter().enumerate() {
            body.push_str(&format!("{date} {h:02}:00,WEST,61752,{}.0,0.5,0.0\n", 20 + i));
        }
        body
    }

    fn distinct_starts(table: &Table) -> usize {
        let mut starts = table.timestamps(INTERVAL_START).unwrap();
        starts.sort();
        starts.dedup();
        starts.len()
    }

    #[test]
    fn day_ahead_fall_back_day_keeps_both_one_oclock_hours() {
        let mut hours = vec![0, 1];
        hours.extend(1..24);
        let body = day_ahead_west("11/03/2024", &hours);
        let raw = localize_day("damlbmp_zone", body.as_bytes(), day("2024-11-03")).unwrap();
        let mut lmp = shape_lmp(raw, Market::DayAheadHourly, "Zone").unwrap();
        let keys = dedup_keys(&lmp);
        dedup_last_wins(&mut lmp, &keys).unwrap();
        Schema::Lmp.validate(&lmp).unwrap();
        assert_eq!(lmp.len(), 25);
        assert_eq!(distinct_starts(&lmp), 25);
        let starts = lmp.timestamps(INTERVAL_START).unwrap();
        assert_eq!(to_rfc3339(&starts[1]), "2024-11-03T01:00:00-04:00");
        assert_eq!(to_rfc3339(&starts[2]), "2024-11-03T01:00:00-05:00");
        assert_eq!(lmp.row(2).unwrap().get(LMP), Some(&Value::Float(22.0)));
    }

    #[test]
    fn day_ahead_spring_forward_day_has_23_hours() {
        let hours: Vec<u32> = (0..24).filter(|h| *h != 2).collect();
        let body = day_ahead_west("03/10/2024", &hours);
        let raw = localize_day("damlbmp_zone", body.as_bytes(), day("2024-03-10")).unwrap();
        let mut lmp = shape_lmp(raw, Market::DayAheadHourly, "Zone").unwrap();
        let keys = dedup_keys(&lmp);
        dedup_last_wins(&mut lmp, &keys).unwrap();
        assert_eq!(distinct_starts(&lmp), 23);
        let ends = lmp.timestamps(INTERVAL_END).unwrap();
        assert_eq!(to_rfc3339(&ends[1]), "2024-03-10T03:00:00-04:00");
    }

    #[test]
    fn load_forecast_uses_file_date() {
        let body = "\
Time Stamp,Capitl,West,NYISO
01/02/2024 00:00,1000,1500,15000
01/02/2024 01:00,990,1490,14800
";
        let raw = localize_day("isolf", body.as_bytes(), day("2024-01-01")).unwrap();
        let fc = shape_load_forecast(raw).unwrap();
        Schema::LoadForecast.validate(&fc).unwrap();
        assert_eq!(
            fc.rows()[0][3].as_timestamp().map(|t| to_rfc3339(&t)),
            Some("2024-01-01T00:00:00-05:00".into())
        );
        assert_eq!(fc.rows()[1][4], Value::Float(14800.0));
    }
}
