//! Southwest Power Pool.
//!
//! Fuel mix, load and the load forecast only exist as rolling windows around
//! now. Day-ahead prices are daily files in the marketplace file browser;
//! real-time prices are the latest interval file. Report times are UTC.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use grid_schema::{
    ColumnMap, Frequency, Market, QueueStatus, RangePlan, Schema, SchemaError, Stamp, Table, Value,
    Window,
    columns::{
        CONGESTION, ENERGY, FORECAST_TIME, INTERVAL_START, LMP, LMP_COLUMNS, LOAD,
        LOAD_FORECAST, LOCATION, LOCATION_TYPE, LOSS, MARKET,
    },
    normalize::{attach_intervals, sum_columns},
    queue::format_interconnection,
    tz::start_of_day,
};
use serde_json::Value as Json;
use tracing::debug;

use super::{
    SourceAdapter, Span, is_current_day,
    payload::{instants, json_array, json_path, json_value, numbers, read_csv, read_csv_lines, utc_times},
};
use crate::{
    errors::Error,
    http::{HttpClient, NO_QUERY},
    models::{
        operator::Operator,
        request::{Dataset, Query},
    },
};

const TZ: Tz = chrono_tz::America::Chicago;
const FILE_BROWSER: &str = "https://portal.spp.org/file-browser-api/download";
const LOAD_CHART: &str = "https://portal.spp.org/chart-api/load-forecast/asChart";
const QUEUE_URL: &str = "https://opsportal.spp.org/Studies/GenerateActiveCSV";

const UTC_FORMATS: [&str; 4] = [
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Fuels published as a `<fuel> Market` / `<fuel> Self` pair.
const PAIRED_FUELS: [&str; 10] = [
    "Coal",
    "Diesel Fuel Oil",
    "Hydro",
    "Natural Gas",
    "Nuclear",
    "Solar",
    "Waste Disposal Services",
    "Wind",
    "Waste Heat",
    "Other",
];

const MARKETS: [Market; 2] = [Market::RealTime5Min, Market::DayAheadHourly];
const SETTLEMENT_LOCATION: &str = "Settlement Location";
const LOCATION_TYPES: [&str; 1] = [SETTLEMENT_LOCATION];

const LMP_RENAMES: [(&str, &str); 4] = [
    ("Settlement Location", LOCATION),
    ("MLC", LOSS),
    ("MCC", CONGESTION),
    ("MEC", ENERGY),
];

const QUEUE_RENAMES: [(&str, &str); 10] = [
    ("Generation Interconnection Number", "Queue ID"),
    ("Nearest Town or County", "County"),
    ("State", "State"),
    ("TO at POI", "Transmission Owner"),
    ("Capacity", "Capacity (MW)"),
    ("MAX Summer MW", "Summer Capacity (MW)"),
    ("MAX Winter MW", "Winter Capacity (MW)"),
    ("Generation Type", "Generation Type"),
    ("Request Received", "Queue Date"),
    ("Substation or Line", "Interconnection Location"),
];

const QUEUE_EXTRA: [&str; 8] = [
    "In-Service Date",
    "Commercial Operation Date",
    "Cessation Date",
    "Current Cluster",
    "Cluster Group",
    "Replacement Generator Commercial Op Date",
    "Service Type",
    "Status (Original)",
];

const QUEUE_MISSING: [&str; 5] = [
    "Project Name",
    "Interconnecting Entity",
    "Withdrawn Date",
    "Withdrawal Comment",
    "Actual Completion Date",
];

/// Parse a UTC time column, with or without an explicit offset.
fn utc_column(table: &mut Table, column: &str) -> Result<(), SchemaError> {
    instants(table, column, TZ).or_else(|_| utc_times(table, column, &UTC_FORMATS, TZ))
}

/// Normalized status of an SPP queue entry.
pub fn queue_status(original: &str) -> Option<QueueStatus> {
    match original.trim() {
        "IA FULLY EXECUTED/COMMERCIAL OPERATION"
        | "IA FULLY EXECUTED/ON SCHEDULE"
        | "IA FULLY EXECUTED/ON SUSPENSION" => Some(QueueStatus::Completed),
        "IA PENDING" | "DISIS STAGE" | "None" => Some(QueueStatus::Active),
        _ => None,
    }
}

/// The two-hour generation mix. Market and self-scheduled generation of a
/// fuel are summed; the load columns in the file are dropped.
pub fn shape_fuel_mix(mut raw: Table) -> Result<Table, SchemaError> {
    raw.rename_any(&["GMTTime", "GMT MKT Interval"], "Stamp")?;
    if raw.has_column("Gas Self") {
        raw.rename_column("Gas Self", "Natural Gas Self")?;
    }
    raw.drop_columns(&["Load", "Short Term Load Forecast", "Average Actual Load"])?;
    utc_column(&mut raw, "Stamp")?;
    let measures: Vec<String> = raw.columns().iter().filter(|c| *c != "Stamp").cloned().collect();
    let measures: Vec<&str> = measures.iter().map(String::as_str).collect();
    numbers(&mut raw, &measures)?;
    for fuel in PAIRED_FUELS {
        let market = format!("{fuel} Market");
        let own = format!("{fuel} Self");
        if !(raw.has_column(&market) && raw.has_column(&own)) {
            continue;
        }
        let total = sum_columns(&raw, &[&market, &own])?;
        raw.push_column(fuel, total)?;
        raw.drop_columns(&[&market, &own])?;
    }
    attach_intervals(&mut raw, "Stamp", Stamp::Start, Duration::minutes(5))?;
    Ok(raw)
}

/// The load chart: `labels` are UTC times, datasets hold actual load and the
/// two forecasts. Missing points are null.
pub fn parse_load_chart(doc: &Json) -> Result<Table, SchemaError> {
    const REPORT: &str = "load-forecast/asChart";
    let labels = json_array(REPORT, doc, &["response", "labels"])?;
    let datasets = json_array(REPORT, doc, &["response", "datasets"])?;
    let stamps = labels.iter().map(|l| vec![json_value(l)]).collect();
    let mut table = Table::from_rows(["Stamp"], stamps)?;
    for (label, column) in [
        ("Actual Load", LOAD),
        ("Mid-Term Load Forecast", "Mid-Term Forecast"),
        ("Short-Term Load Forecast", "Short-Term Forecast"),
    ] {
        let Some(set) = datasets
            .iter()
            .find(|d| d.get("label").and_then(Json::as_str) == Some(label))
        else {
            continue;
        };
        let data = json_path(REPORT, set, &["data"])?
            .as_array()
            .ok_or_else(|| SchemaError::parse(REPORT, format!("`{label}` has no data")))?;
        let mut values: Vec<Value> = data.iter().map(json_value).collect();
        values.resize(table.len(), Value::Null);
        table.push_column(column, values)?;
    }
    table.require(LOAD)?;
    utc_column(&mut table, "Stamp")?;
    Ok(table)
}

/// Actual 5-minute load from the chart.
pub fn shape_load(chart: &Table) -> Result<Table, SchemaError> {
    let mut load = chart.select(&["Stamp", LOAD])?;
    numbers(&mut load, &[LOAD])?;
    load.retain_rows(|r| r.get(LOAD).is_some_and(|v| !v.is_null()))?;
    attach_intervals(&mut load, "Stamp", Stamp::Start, Duration::minutes(5))?;
    Ok(load)
}

/// Hourly mid-term forecast from the start of the day of the last actual
/// reading, stamped with that reading's time.
pub fn shape_load_forecast(chart: &Table) -> Result<Table, SchemaError> {
    let mut chart = chart.select(&["Stamp", LOAD, "Mid-Term Forecast"])?;
    numbers(&mut chart, &[LOAD, "Mid-Term Forecast"])?;
    let last_actual = chart
        .iter()
        .filter(|r| r.get(LOAD).is_some_and(|v| !v.is_null()))
        .filter_map(|r| r.get("Stamp").and_then(Value::as_timestamp))
        .max()
        .ok_or_else(|| SchemaError::parse("load-forecast/asChart", "no actual load"))?;
    let day_start = start_of_day(last_actual.date_naive(), TZ)?;
    chart.retain_rows(|r| {
        r.get("Stamp")
            .and_then(Value::as_timestamp)
            .is_some_and(|t| t >= day_start)
            && r.get("Mid-Term Forecast").is_some_and(|v| !v.is_null())
    })?;
    chart.rename_column("Mid-Term Forecast", LOAD_FORECAST)?;
    let mut out = chart.select(&["Stamp", LOAD_FORECAST])?;
    out.insert_column(1, FORECAST_TIME, vec![Value::Timestamp(last_actual); out.len()])?;
    attach_intervals(&mut out, "Stamp", Stamp::Start, Duration::hours(1))?;
    Ok(out)
}

/// Prices by settlement location. `GMTIntervalEnd` ends each interval.
pub fn shape_lmp(mut raw: Table, market: Market) -> Result<Table, SchemaError> {
    let length = Duration::minutes(market.interval_minutes());
    utc_column(&mut raw, "GMTIntervalEnd")?;
    ColumnMap::new(Schema::Lmp, &LMP_RENAMES)?.apply(&mut raw)?;
    raw.rename_any(&["Pnode", "PNode"], "PNode")?;
    numbers(&mut raw, &[LMP, ENERGY, CONGESTION, LOSS])?;
    raw.fill_column(MARKET, Value::text(market.as_str()))?;
    raw.fill_column(LOCATION_TYPE, Value::text(SETTLEMENT_LOCATION))?;
    attach_intervals(&mut raw, "GMTIntervalEnd", Stamp::End, length)?;
    let columns: Vec<&str> = LMP_COLUMNS.iter().copied().chain(["PNode"]).collect();
    let mut out = raw.select(&columns)?;
    out.sort_by_columns(&[INTERVAL_START, LOCATION])?;
    Ok(out)
}

/// The active queue CSV, whose first line is a title.
pub fn shape_queue(body: &[u8]) -> Result<Table, SchemaError> {
    let mut raw = read_csv_lines("GenerateActiveCSV", body, &[0], 0)?;
    let status = raw.require("Status")?;
    let original: Vec<Value> = raw.rows().iter().map(|r| r[status].clone()).collect();
    raw.map_column("Status", |v| {
        queue_status(&v.to_string()).map_or(Value::Null, |s| Value::text(s.as_str()))
    })?;
    raw.push_column("Status (Original)", original)?;

    let gen_type = raw.require("Generation Type")?;
    let fuel = raw.require("Fuel Type")?;
    let joined = raw
        .rows()
        .iter()
        .map(|r| {
            let parts: Vec<String> = [&r[gen_type], &r[fuel]]
                .into_iter()
                .filter(|v| !v.is_null())
                .map(ToString::to_string)
                .collect();
            Value::text(parts.join(" - "))
        })
        .collect();
    raw.set_column("Generation Type", joined)?;
    let cod = raw.require("Commercial Operation Date")?;
    let proposed = raw.rows().iter().map(|r| r[cod].clone()).collect();
    raw.push_column("Proposed Completion Date", proposed)?;
    numbers(&mut raw, &["Capacity", "MAX Summer MW", "MAX Winter MW"])?;

    let rename = ColumnMap::new(Schema::InterconnectionQueue, &QUEUE_RENAMES)?;
    format_interconnection(raw, &rename, &QUEUE_EXTRA, &QUEUE_MISSING)
}

/// SPP adapter.
#[derive(Debug, Clone)]
pub struct Spp {
    http: HttpClient,
}

impl Spp {
    /// Adapter on the given client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn load_chart(&self) -> Result<Table, Error> {
        let doc: Json = self.http.get_json(LOAD_CHART, NO_QUERY).await?;
        Ok(parse_load_chart(&doc)?)
    }

    async fn file(&self, browser: &str, path: &str) -> Result<Table, Error> {
        let url = format!("{FILE_BROWSER}/{browser}");
        let payload = self.http.get(&url, &[("path", path)]).await?;
        Ok(read_csv(path, &payload.body)?)
    }

    fn today_only(&self, span: &Span, now: DateTime<Utc>, what: &str) -> Result<(), Error> {
        match span.window() {
            Some(w) if !is_current_day(w.start.date_naive(), TZ, now) => Err(
                Error::not_supported(Operator::Spp, format!("{what} before today")),
            ),
            _ => Ok(()),
        }
    }
}

fn keep_day(table: &mut Table, span: &Span) -> Result<(), SchemaError> {
    if let Some(w) = span.window() {
        let start = table.require(INTERVAL_START)?;
        let day = w.start.date_naive();
        table.retain_rows(|r| {
            r.values()[start]
                .as_timestamp()
                .is_some_and(|t| t.date_naive() == day)
        })?;
    }
    Ok(())
}

#[async_trait]
impl SourceAdapter for Spp {
    fn operator(&self) -> Operator {
        Operator::Spp
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
            Dataset::FuelMix | Dataset::Supply | Dataset::Load => Some(Duration::minutes(5)),
            Dataset::Lmp => query.market.map(|m| Duration::minutes(m.interval_minutes())),
            _ => None,
        }
    }

    async fn fuel_mix(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        self.today_only(span, now, "fuel mix")?;
        let raw = self
            .file("generation-mix-historical", "/GenMix2Hour.csv")
            .await?;
        let table = shape_fuel_mix(raw)?;
        Schema::FuelMix.validate(&table)?;
        Ok(table)
    }

    async fn load(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        self.today_only(span, now, "load")?;
        let mut table = shape_load(&self.load_chart().await?)?;
        keep_day(&mut table, span)?;
        Ok(table)
    }

    async fn load_forecast(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        self.today_only(span, now, "load forecast")?;
        Ok(shape_load_forecast(&self.load_chart().await?)?)
    }

    async fn lmp(&self, query: &Query, span: &Span, _now: DateTime<Utc>) -> Result<Table, Error> {
        let market = query
            .market
            .ok_or_else(|| Error::InvalidRequest("lmp requires a market".into()))?;
        let raw = match (market, span) {
            (Market::RealTime5Min, Span::Latest) => {
                self.file("rtbm-lmp-by-location", "/RTBM-LMP-SL-latestInterval.csv")
                    .await?
            }
            (Market::RealTime5Min, Span::Window(_)) => {
                return Err(Error::not_supported(
                    Operator::Spp,
                    "real-time prices other than the latest interval",
                ));
            }
            (Market::DayAheadHourly, Span::Latest) => {
                return Err(Error::InvalidRequest(
                    "latest is not available for day-ahead prices".into(),
                ));
            }
            (Market::DayAheadHourly, Span::Window(w)) => {
                let date = w.start.date_naive();
                let path = format!(
                    "/{}/By_Day/DA-LMP-SL-{}0100.csv",
                    date.format("%Y/%m"),
                    date.format("%Y%m%d")
                );
                debug!(%path, "fetching day-ahead prices");
                self.file("da-lmp-by-location", &path).await?
            }
            (other, _) => {
                return Err(Error::not_supported(Operator::Spp, format!("market {other}")));
            }
        };
        Ok(shape_lmp(raw, market)?)
    }

    async fn interconnection_queue(&self) -> Result<Table, Error> {
        let payload = self.http.get(QUEUE_URL, NO_QUERY).await?;
        Ok(shape_queue(&payload.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_schema::{columns::INTERVAL_END, tz::to_rfc3339};
    use serde_json::json;

    #[test]
    fn fuel_mix_sums_market_and_self() {
        let raw = read_csv(
            "mix",
            b"GMTTime,Coal Market,Coal Self,Wind Market,Wind Self,Gas Self,Natural Gas Market,Load\n\
              2024-01-02T06:00:00Z,100,50,10,,5,20,30000\n",
        )
        .unwrap();
        let mix = shape_fuel_mix(raw).unwrap();
        Schema::FuelMix.validate(&mix).unwrap();
        let row = mix.row(0).unwrap();
        assert_eq!(row.get("Coal"), Some(&Value::Float(150.0)));
        assert_eq!(row.get("Wind"), Some(&Value::Float(10.0)));
        assert_eq!(row.get("Natural Gas"), Some(&Value::Float(25.0)));
        assert!(!mix.has_column("Load"));
        let start = mix.timestamps(INTERVAL_START).unwrap()[0];
        assert_eq!(to_rfc3339(&start), "2024-01-02T00:00:00-06:00");
    }

    fn chart() -> Json {
        json!({"response": {
            "labels": [
                "2024-01-02T05:55:00Z",
                "2024-01-02T06:00:00Z",
                "2024-01-02T07:00:00Z"
            ],
            "datasets": [
                {"label": "Actual Load", "data": [31000, 30900, null]},
                {"label": "Mid-Term Load Forecast", "data": [31100, 31000, 30500]},
                {"label": "Short-Term Load Forecast", "data": [null, null]}
            ]
        }})
    }

    #[test]
    fn load_keeps_actual_readings() {
        let table = parse_load_chart(&chart()).unwrap();
        let load = shape_load(&table).unwrap();
        Schema::Load.validate(&load).unwrap();
        assert_eq!(load.len(), 2);
        let end = load.timestamps(INTERVAL_END).unwrap()[1];
        assert_eq!(to_rfc3339(&end), "2024-01-02T00:05:00-06:00");
    }

    #[test]
    fn load_forecast_starts_on_the_day_of_the_last_reading() {
        let table = parse_load_chart(&chart()).unwrap();
        let forecast = shape_load_forecast(&table).unwrap();
        Schema::LoadForecast.validate(&forecast).unwrap();
        assert_eq!(forecast.len(), 2);
        let row = forecast.row(0).unwrap();
        let made = row.get(FORECAST_TIME).and_then(Value::as_timestamp).unwrap();
        assert_eq!(to_rfc3339(&made), "2024-01-02T00:00:00-06:00");
        assert_eq!(row.get(LOAD_FORECAST).and_then(Value::as_f64), Some(31000.0));
    }

    #[test]
    fn prices_are_end_stamped_utc() {
        let raw = read_csv(
            "da",
            b"Interval,GMTIntervalEnd,Settlement Location,Pnode,LMP,MLC,MCC,MEC\n\
              01/02/2024 01:00:00,01/02/2024 07:00:00,SPPNORTH_HUB,SPPNORTH_HUB,22.1,0.1,0.5,21.5\n",
        )
        .unwrap();
        let lmp = shape_lmp(raw, Market::DayAheadHourly).unwrap();
        Schema::Lmp.validate(&lmp).unwrap();
        let start = lmp.timestamps(INTERVAL_START).unwrap()[0];
        assert_eq!(to_rfc3339(&start), "2024-01-02T00:00:00-06:00");
        let row = lmp.row(0).unwrap();
        assert_eq!(row.get(LOCATION_TYPE), Some(&Value::text(SETTLEMENT_LOCATION)));
        assert_eq!(row.get(ENERGY), Some(&Value::Float(21.5)));
        assert_eq!(row.get("PNode"), Some(&Value::text("SPPNORTH_HUB")));
    }

    #[test]
    fn queue_statuses_are_normalized() {
        let body = b"Active Generation Interconnection Requests\n\
            Generation Interconnection Number,Nearest Town or County,State,TO at POI,Capacity,MAX Summer MW,MAX Winter MW,Generation Type,Fuel Type,Request Received,Substation or Line,Status,In-Service Date,Commercial Operation Date,Cessation Date,Current Cluster,Cluster Group,Replacement Generator Commercial Op Date,Service Type\n\
            GEN-2020-001,Ford,KS,WERE,200,200,200,Wind,,1/1/2020,Spearville 345kV,IA PENDING,,12/31/2025,,,,,ER\n\
            GEN-2016-002,Tulsa,OK,AEPW,100,90,100,Solar,Sun,1/1/2016,Riverside,IA FULLY EXECUTED/COMMERCIAL OPERATION,,6/1/2019,,,,,NR\n";
        let queue = shape_queue(body).unwrap();
        Schema::InterconnectionQueue.validate(&queue).unwrap();
        let first = queue.row(0).unwrap();
        assert_eq!(first.get("Status"), Some(&Value::text("Active")));
        assert_eq!(first.get("Generation Type"), Some(&Value::text("Wind")));
        assert_eq!(first.get("Proposed Completion Date"), Some(&Value::text("12/31/2025")));
        let second = queue.row(1).unwrap();
        assert_eq!(second.get("Status"), Some(&Value::text("Completed")));
        assert_eq!(second.get("Generation Type"), Some(&Value::text("Solar - Sun")));
        assert_eq!(
            second.get("Status (Original)"),
            Some(&Value::text("IA FULLY EXECUTED/COMMERCIAL OPERATION"))
        );
        assert_eq!(queue_status("withdrawn"), None);
    }
}
