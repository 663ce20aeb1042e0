//! California ISO.
//!
//! Fuel mix and load come from the Today's Outlook CSV files, one file per
//! local day. Prices and the load forecast come from OASIS `SingleZip`
//! queries, which answer with a zip of CSV files or, when the window holds
//! no data, a zip containing an XML error document.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use grid_schema::{
    ColumnMap, LocationFilter, Market, RangePlan, Schema, SchemaError, Stamp, Table, Value,
    Window,
    columns::{
        CONGESTION, ENERGY, FORECAST_TIME, INTERVAL_END, INTERVAL_START, LMP_COLUMNS, LOAD,
        LOAD_FORECAST, LOCATION, LOCATION_TYPE, LOSS, MARKET, TIME,
    },
    frequency::Frequency,
    normalize::{
        attach_intervals, attach_intervals_from_bounds, drop_empty_rows, last_row,
        latest_per_location, localize_column,
    },
};
use nonzero_ext::nonzero;
use tracing::{debug, info};

use super::{
    SourceAdapter, Span, is_current_day,
    payload::{instants, numbers, numbers_except, read_csv, unzip},
};
use crate::{
    errors::Error,
    http::HttpClient,
    models::{
        operator::Operator,
        request::{Dataset, Query},
    },
};

const TZ: Tz = chrono_tz::America::Los_Angeles;

const OUTLOOK_CURRENT: &str = "https://www.caiso.com/outlook/current";
const OUTLOOK_HISTORY: &str = "https://www.caiso.com/outlook/history";
const OASIS_URL: &str = "http://oasis.caiso.com/oasisapi/SingleZip";
const OASIS_TIME_FORMAT: &str = "%Y%m%dT%H:%M-0000";

/// The three trading hubs, returned when an LMP request names no locations.
pub const TRADING_HUBS: [&str; 3] = ["TH_NP15_GEN-APND", "TH_SP15_GEN-APND", "TH_ZP26_GEN-APND"];

const MARKETS: [Market; 3] = [
    Market::RealTime5Min,
    Market::RealTime15Min,
    Market::DayAheadHourly,
];

const LOCATION_TYPES: [&str; 4] = ["Node", "AP Node", "Trading Hub", "DLAP"];

const FUEL_RENAMES: [(&str, &str); 3] = [
    ("Small hydro", "Small Hydro"),
    ("Natural gas", "Natural Gas"),
    ("Large hydro", "Large Hydro"),
];

const INTERVAL_START_COLUMNS: [&str; 4] = [
    "INTERVALSTARTTIME_GMT",
    "INTERVAL_START_GMT",
    "STARTTIME_GMT",
    "START_DATE_GMT",
];
const INTERVAL_END_COLUMNS: [&str; 4] = [
    "INTERVALENDTIME_GMT",
    "INTERVAL_END_GMT",
    "ENDTIME_GMT",
    "END_DATE_GMT",
];

const CAISO_TAC: &str = "CA ISO-TAC";

/// One OASIS report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OasisReport {
    name: &'static str,
    version: &'static str,
    run: &'static str,
    /// Column holding the value in the CSV rows.
    value: &'static str,
}

const DEMAND_FORECAST: OasisReport = OasisReport {
    name: "SLD_FCST",
    version: "1",
    run: "DAM",
    value: "MW",
};

fn lmp_report(market: Market) -> Option<OasisReport> {
    match market {
        Market::DayAheadHourly => Some(OasisReport {
            name: "PRC_LMP",
            version: "12",
            run: "DAM",
            value: "MW",
        }),
        Market::RealTime15Min => Some(OasisReport {
            name: "PRC_RTPD_LMP",
            version: "3",
            run: "RTPD",
            value: "PRC",
        }),
        Market::RealTime5Min => Some(OasisReport {
            name: "PRC_INTVL_LMP",
            version: "3",
            run: "RTM",
            value: "VALUE",
        }),
        _ => None,
    }
}

/// Location type from a CAISO node id.
pub fn location_type(node: &str) -> &'static str {
    if TRADING_HUBS.contains(&node) {
        "Trading Hub"
    } else if node.starts_with("DLAP_") {
        "DLAP"
    } else if node.ends_with("-APND") {
        "AP Node"
    } else {
        "Node"
    }
}

/// Parse one Today's Outlook file into 5-minute start-stamped rows.
///
/// `Time` holds `HH:MM` on `date`. For the current file pass `current` as
/// `(now, column)`: when the last valued time of `column`, read on today's
/// date, lies after `now`, the file still holds yesterday.
pub fn parse_outlook(
    report: &str,
    body: &[u8],
    mut date: NaiveDate,
    current: Option<(DateTime<Utc>, &str)>,
) -> Result<Table, SchemaError> {
    let mut table = read_csv(report, body)?;
    let time_i = table.require(TIME)?;
    table.retain_rows(|r| !r.values()[time_i].is_null())?;
    // the skipped spring-forward hour is listed with no values
    drop_empty_rows(&mut table, &[TIME])?;

    if let Some((now, column)) = current {
        if let Some(latest) = last_valued_time(&table, column)? {
            let today = now.with_timezone(&TZ).date_naive();
            let stamped = TZ.from_local_datetime(&today.and_time(latest)).earliest();
            if stamped.is_some_and(|t| t > now.with_timezone(&TZ)) {
                date = today
                    .pred_opt()
                    .ok_or_else(|| SchemaError::parse(report, "date out of range"))?;
                debug!(report, %date, "current file still holds the previous day");
            }
        }
    }

    let ends_at_midnight = table
        .rows()
        .last()
        .and_then(|r| r[time_i].as_str())
        .and_then(clock)
        .is_some_and(|t| t.hour() == 0);
    if ends_at_midnight && table.len() > 1 {
        let keep = table.len() - 1;
        let mut seen = 0;
        table.retain_rows(|_| {
            seen += 1;
            seen <= keep
        })?;
    }

    table.map_column(TIME, |v| Value::Text(format!("{date} {v}")))?;
    localize_column(&mut table, TIME, &["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"], None, TZ)?;
    numbers_except(&mut table, &[TIME])?;
    attach_intervals(&mut table, TIME, Stamp::Start, Duration::minutes(5))?;
    Ok(table)
}

fn clock(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

fn last_valued_time(table: &Table, column: &str) -> Result<Option<NaiveTime>, SchemaError> {
    let time_i = table.require(TIME)?;
    let value_i = table.require(column)?;
    Ok(table
        .rows()
        .iter()
        .rev()
        .find(|r| !r[value_i].is_null())
        .and_then(|r| r[time_i].as_str())
        .and_then(clock))
}

/// Fuel mix from a parsed `fuelsource` file.
pub fn shape_fuel_mix(mut table: Table) -> Result<Table, SchemaError> {
    for (from, to) in FUEL_RENAMES {
        if table.has_column(from) {
            table.rename_column(from, to)?;
        }
    }
    Schema::FuelMix.validate(&table)?;
    Ok(table)
}

/// Load from a parsed `demand` file; rows without an actual value are dropped.
pub fn shape_load(mut table: Table) -> Result<Table, SchemaError> {
    table.rename_any(&["Current demand"], LOAD)?;
    let mut out = table.select(&[TIME, INTERVAL_START, INTERVAL_END, LOAD])?;
    let i = out.require(LOAD)?;
    out.retain_rows(|r| !r.values()[i].is_null())?;
    Ok(out)
}

/// Concatenate the CSV members of an OASIS zip and attach local interval
/// bounds. `None` means OASIS answered with an XML error document.
pub fn parse_oasis(files: &[(String, Vec<u8>)]) -> Result<Option<Table>, SchemaError> {
    if files.is_empty() || files.iter().any(|(name, _)| name.ends_with(".xml")) {
        return Ok(None);
    }
    let mut table = Table::default();
    for (name, body) in files {
        table.append(read_csv(name, body)?)?;
    }
    let start = pick(&table, &INTERVAL_START_COLUMNS)?;
    let end = pick(&table, &INTERVAL_END_COLUMNS)?;
    instants(&mut table, &start, TZ)?;
    instants(&mut table, &end, TZ)?;
    attach_intervals_from_bounds(&mut table, &start, &end)?;
    table.sort_by_columns(&[INTERVAL_START])?;
    Ok(Some(table))
}

fn pick(table: &Table, candidates: &[&str]) -> Result<String, SchemaError> {
    candidates
        .iter()
        .find(|c| table.has_column(c))
        .map(|c| c.to_string())
        .ok_or_else(|| SchemaError::missing(candidates.join(" | ")))
}

/// Pivot OASIS price rows (one per node, interval and component) into LMP rows.
pub fn shape_lmp(table: Table, market: Market) -> Result<Table, SchemaError> {
    let report = lmp_report(market).ok_or_else(|| SchemaError::InvalidValue {
        column: MARKET.to_string(),
        row: 0,
        message: format!("no OASIS price report for {market}"),
    })?;
    let mut table = table;
    numbers(&mut table, &[report.value])?;
    let mut wide = table.pivot(
        &[TIME, INTERVAL_START, INTERVAL_END, "NODE"],
        "LMP_TYPE",
        report.value,
    )?;
    ColumnMap::new(
        Schema::Lmp,
        &[
            ("NODE", LOCATION),
            ("MCE", ENERGY),
            ("MCC", CONGESTION),
            ("MCL", LOSS),
        ],
    )?
    .apply(&mut wide)?;
    let types = wide
        .column(LOCATION)?
        .into_iter()
        .map(|v| Value::text(location_type(&v.to_string())))
        .collect();
    wide.push_column(LOCATION_TYPE, types)?;
    wide.fill_column(MARKET, Value::text(market.as_str()))?;
    let mut out = wide.select(&LMP_COLUMNS)?;
    out.sort_by_columns(&[INTERVAL_START, LOCATION])?;
    Ok(out)
}

/// Day-ahead load forecast for the CAISO balancing area.
///
/// `Forecast Time` is the first interval start of the chunk.
pub fn shape_load_forecast(mut table: Table) -> Result<Table, SchemaError> {
    let area = table.require("TAC_AREA_NAME")?;
    table.retain_rows(|r| r.values()[area].as_str() == Some(CAISO_TAC))?;
    numbers(&mut table, &[DEMAND_FORECAST.value])?;
    table.rename_column(DEMAND_FORECAST.value, LOAD_FORECAST)?;
    let first = table.timestamps(INTERVAL_START)?.into_iter().min();
    table.fill_column(FORECAST_TIME, first.map_or(Value::Null, Value::Timestamp))?;
    table.select(&[TIME, INTERVAL_START, INTERVAL_END, FORECAST_TIME, LOAD_FORECAST])
}

/// CAISO adapter.
#[derive(Debug, Clone)]
pub struct Caiso {
    http: HttpClient,
}

impl Caiso {
    /// Adapter on the given client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn outlook(
        &self,
        file: &str,
        check_column: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Table, Error> {
        let current = is_current_day(date, TZ, now);
        let url = if current {
            format!("{OUTLOOK_CURRENT}/{file}.csv")
        } else {
            format!("{OUTLOOK_HISTORY}/{}/{file}.csv", date.format("%Y%m%d"))
        };
        // the CDN serves stale copies of an unchanged url
        let buster = now.timestamp().to_string();
        let payload = self.http.get(&url, &[("_", buster.as_str())]).await?;
        let table = parse_outlook(
            file,
            &payload.body,
            date,
            current.then_some((now, check_column)),
        )?;
        Ok(table)
    }

    async fn oasis(
        &self,
        report: OasisReport,
        window: &Window,
        extra: Vec<(&'static str, String)>,
    ) -> Result<Option<Table>, Error> {
        let (start, end) = window.to_utc();
        let mut params: Vec<(&str, String)> = vec![
            ("resultformat", "6".into()),
            ("queryname", report.name.into()),
            ("version", report.version.into()),
            ("market_run_id", report.run.into()),
            ("startdatetime", start.format(OASIS_TIME_FORMAT).to_string()),
            ("enddatetime", end.format(OASIS_TIME_FORMAT).to_string()),
        ];
        params.extend(extra);
        info!(query = report.name, %window, "fetching OASIS report");
        let payload = self.http.get(OASIS_URL, &params).await?;
        let files = unzip(&payload)?;
        Ok(parse_oasis(&files)?)
    }
}

#[async_trait]
impl SourceAdapter for Caiso {
    fn operator(&self) -> Operator {
        Operator::Caiso
    }

    fn lmp_markets(&self) -> &'static [Market] {
        &MARKETS
    }

    fn default_locations(&self, _market: Market) -> LocationFilter {
        LocationFilter::only(TRADING_HUBS)
    }

    fn location_types(&self) -> &'static [&'static str] {
        &LOCATION_TYPES
    }

    fn range_plan(&self, query: &Query, _window: &Window, _now: DateTime<Utc>) -> RangePlan {
        let month = RangePlan::every(Frequency::Days(nonzero!(31u32)));
        match query.dataset {
            Dataset::LoadForecast => month,
            Dataset::Lmp => match query.locations {
                Some(LocationFilter::All) => RangePlan::every(Frequency::Days(nonzero!(1u32))),
                _ => month,
            },
            _ => RangePlan::every(Frequency::DayStart),
        }
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
        let table = self
            .outlook("fuelsource", "Solar", window.start.date_naive(), now)
            .await?;
        let table = shape_fuel_mix(table)?;
        Ok(match span {
            Span::Latest => last_row(&table),
            Span::Window(_) => table,
        })
    }

    async fn load(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        let window = span.resolve(TZ, now)?;
        let table = self
            .outlook("demand", "Current demand", window.start.date_naive(), now)
            .await?;
        Ok(shape_load(table)?)
    }

    async fn load_forecast(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        let window = span.resolve(TZ, now)?;
        let table = self
            .oasis(DEMAND_FORECAST, &window, Vec::new())
            .await?
            .ok_or_else(|| Error::no_data(Dataset::LoadForecast, window.to_string()))?;
        Ok(shape_load_forecast(table)?)
    }

    async fn lmp(&self, query: &Query, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        let market = query
            .market
            .ok_or_else(|| Error::InvalidRequest("lmp requires a market".into()))?;
        let report = lmp_report(market)
            .ok_or_else(|| Error::not_supported(Operator::Caiso, format!("market {market}")))?;
        let window = span.resolve(TZ, now)?;
        let nodes = match query.locations_or(|| self.default_locations(market)) {
            LocationFilter::All => vec![("grp_type", "ALL".to_string())],
            LocationFilter::Only(ids) => vec![("node", ids.join(","))],
        };
        let table = self
            .oasis(report, &window, nodes)
            .await?
            .ok_or_else(|| Error::no_data(Dataset::Lmp, window.to_string()))?;
        let table = shape_lmp(table, market)?;
        Ok(match span {
            Span::Latest => latest_per_location(&table)?,
            Span::Window(_) => table,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_schema::tz::to_rfc3339;

    /// A demand file for `date` as the outlook publishes it: every five
    /// minutes of the local day plus the closing midnight row.
    fn demand_file(walls: &[String]) -> Vec<u8> {
        let mut body = String::from("Time,Day ahead forecast,Hour ahead forecast,Current demand\n");
        for (i, wall) in walls.iter().enumerate() {
            body.push_str(&format!("{wall},{},{},{}\n", 20000 + i, 20010 + i, 19990 + i));
        }
        body.into_bytes()
    }

    fn five_minute_walls(hours: impl Iterator<Item = u32>) -> Vec<String> {
        hours
            .flat_map(|h| (0..60).step_by(5).map(move |m| format!("{h:02}:{m:02}")))
            .collect()
    }

    #[test]
    fn history_day_has_288_intervals_ending_at_next_midnight() {
        let mut walls = five_minute_walls(0..24);
        walls.push("00:00".into());
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let load = shape_load(parse_outlook("demand", &demand_file(&walls), date, None).unwrap())
            .unwrap();

        assert_eq!(load.len(), 288);
        Schema::Load.validate(&load).unwrap();
        let starts = load.timestamps(INTERVAL_START).unwrap();
        let ends = load.timestamps(INTERVAL_END).unwrap();
        assert_eq!(to_rfc3339(&starts[0]), "2020-01-01T00:00:00-08:00");
        assert_eq!(to_rfc3339(&ends[287]), "2020-01-02T00:00:00-08:00");
        assert_eq!(load.timestamps(TIME).unwrap(), starts);
        assert_eq!(load.rows()[0][3], Value::Float(19990.0));
    }

    #[test]
    fn fall_back_day_keeps_both_one_oclock_hours() {
        let walls = five_minute_walls([0, 1, 1].into_iter().chain(2..24));
        let date = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap();
        let t = parse_outlook("demand", &demand_file(&walls), date, None).unwrap();
        assert_eq!(t.len(), 300);
        let starts = t.timestamps(INTERVAL_START).unwrap();
        assert!(starts.windows(2).all(|p| p[1] - p[0] == Duration::minutes(5)));
    }

    #[test]
    fn spring_forward_placeholder_rows_are_dropped() {
        let walls = five_minute_walls(0..24);
        let mut body = String::from("Time,Solar,Wind,Natural gas\n");
        for w in &walls {
            if w.starts_with("02:") {
                body.push_str(&format!("{w},,,\n"));
            } else {
                body.push_str(&format!("{w},1,2,3\n"));
            }
        }
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let t = shape_fuel_mix(parse_outlook("fuelsource", body.as_bytes(), date, None).unwrap())
            .unwrap();
        assert_eq!(t.len(), 23 * 12);
        assert!(t.has_column("Natural Gas"));
        assert!(!t.has_column("Natural gas"));
    }

    #[test]
    fn current_file_before_rollover_belongs_to_yesterday() {
        let walls = five_minute_walls(23..24);
        let body = demand_file(&walls);
        // two minutes past midnight: 23:55 today would be in the future
        let now = TZ
            .with_ymd_and_hms(2024, 1, 2, 0, 2, 0)
            .unwrap()
            .with_timezone(&Utc);
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let t = parse_outlook("demand", &body, today, Some((now, "Current demand"))).unwrap();
        let first = t.timestamps(INTERVAL_START).unwrap()[0];
        assert_eq!(to_rfc3339(&first), "2024-01-01T23:00:00-08:00");
    }

    const PRC_LMP: &str = "\
INTERVALSTARTTIME_GMT,INTERVALENDTIME_GMT,OPR_DT,OPR_HR,NODE_ID,NODE,MARKET_RUN_ID,LMP_TYPE,XML_DATA_ITEM,PNODE_RESMRID,GRP_TYPE,POS,MW,GROUP
2024-01-01T08:00:00-00:00,2024-01-01T09:00:00-00:00,2024-01-01,1,TH_NP15_GEN-APND,TH_NP15_GEN-APND,DAM,LMP,LMP_PRC,TH_NP15_GEN-APND,ALL,0,40.5,1
2024-01-01T08:00:00-00:00,2024-01-01T09:00:00-00:00,2024-01-01,1,TH_NP15_GEN-APND,TH_NP15_GEN-APND,DAM,MCE,LMP_ENE_PRC,TH_NP15_GEN-APND,ALL,0,39.0,1
2024-01-01T08:00:00-00:00,2024-01-01T09:00:00-00:00,2024-01-01,1,TH_NP15_GEN-APND,TH_NP15_GEN-APND,DAM,MCC,LMP_CONG_PRC,TH_NP15_GEN-APND,ALL,0,0.5,1
2024-01-01T08:00:00-00:00,2024-01-01T09:00:00-00:00,2024-01-01,1,TH_NP15_GEN-APND,TH_NP15_GEN-APND,DAM,MCL,LMP_LOSS_PRC,TH_NP15_GEN-APND,ALL,0,1.0,1
2024-01-01T08:00:00-00:00,2024-01-01T09:00:00-00:00,2024-01-01,1,DLAP_PGAE-APND,DLAP_PGAE-APND,DAM,LMP,LMP_PRC,DLAP_PGAE-APND,ALL,0,42.0,1
2024-01-01T08:00:00-00:00,2024-01-01T09:00:00-00:00,2024-01-01,1,DLAP_PGAE-APND,DLAP_PGAE-APND,DAM,MCE,LMP_ENE_PRC,DLAP_PGAE-APND,ALL,0,39.0,1
2024-01-01T08:00:00-00:00,2024-01-01T09:00:00-00:00,2024-01-01,1,DLAP_PGAE-APND,DLAP_PGAE-APND,DAM,MCC,LMP_CONG_PRC,DLAP_PGAE-APND,ALL,0,2.0,1
2024-01-01T08:00:00-00:00,2024-01-01T09:00:00-00:00,2024-01-01,1,DLAP_PGAE-APND,DLAP_PGAE-APND,DAM,MCL,LMP_LOSS_PRC,DLAP_PGAE-APND,ALL,0,1.0,1
";

    #[test]
    fn oasis_prices_pivot_into_lmp_rows() {
        let files = vec![("PRC_LMP.csv".to_string(), PRC_LMP.as_bytes().to_vec())];
        let raw = parse_oasis(&files).unwrap().unwrap();
        let lmp = shape_lmp(raw, Market::DayAheadHourly).unwrap();
        Schema::Lmp.validate(&lmp).unwrap();
        assert_eq!(lmp.len(), 2);

        let dlap = lmp.row(0).unwrap();
        assert_eq!(dlap.get(LOCATION), Some(&Value::text("DLAP_PGAE-APND")));
        assert_eq!(dlap.get(LOCATION_TYPE), Some(&Value::text("DLAP")));
        assert_eq!(dlap.get(CONGESTION), Some(&Value::Float(2.0)));
        let hub = lmp.row(1).unwrap();
        assert_eq!(hub.get(LOCATION_TYPE), Some(&Value::text("Trading Hub")));
        assert_eq!(hub.get(ENERGY), Some(&Value::Float(39.0)));
        assert_eq!(
            hub.get(INTERVAL_START).and_then(Value::as_timestamp).map(|t| to_rfc3339(&t)),
            Some("2024-01-01T00:00:00-08:00".to_string())
        );
        assert_eq!(hub.get(MARKET), Some(&Value::text("DAY_AHEAD_HOURLY")));
    }

    #[test]
    fn xml_member_means_no_data() {
        let files = vec![("INVALID_REQUEST.xml".to_string(), b"<error/>".to_vec())];
        assert!(parse_oasis(&files).unwrap().is_none());
    }

    #[test]
    fn load_forecast_keeps_the_iso_area() {
        let body = "\
INTERVALSTARTTIME_GMT,INTERVALENDTIME_GMT,OPR_DT,OPR_HR,TAC_AREA_NAME,LABEL,XML_DATA_ITEM,POS,MW,MARKET_RUN_ID,GROUP
2024-01-01T09:00:00-00:00,2024-01-01T10:00:00-00:00,2024-01-01,2,CA ISO-TAC,Demand Forecast,SYS_FCST_DA_MW,1,21000,DAM,1
2024-01-01T08:00:00-00:00,2024-01-01T09:00:00-00:00,2024-01-01,1,CA ISO-TAC,Demand Forecast,SYS_FCST_DA_MW,1,20500,DAM,1
2024-01-01T08:00:00-00:00,2024-01-01T09:00:00-00:00,2024-01-01,1,PGE-TAC,Demand Forecast,SYS_FCST_DA_MW,1,9000,DAM,1
";
        let files = vec![("SLD_FCST.csv".to_string(), body.as_bytes().to_vec())];
        let t = shape_load_forecast(parse_oasis(&files).unwrap().unwrap()).unwrap();
        Schema::LoadForecast.validate(&t).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.rows()[0][4], Value::Float(20500.0));
        assert_eq!(t.rows()[1][3], t.rows()[0][1]);
    }

    #[test]
    fn node_suffixes_decide_location_type() {
        assert_eq!(location_type("TH_SP15_GEN-APND"), "Trading Hub");
        assert_eq!(location_type("DLAP_SCE-APND"), "DLAP");
        assert_eq!(location_type("SANDLOT_2_N022-APND"), "AP Node");
        assert_eq!(location_type("ALAMT1G_7_B1"), "Node");
    }
}
