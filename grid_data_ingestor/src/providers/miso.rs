//! Midcontinent ISO.
//!
//! The real-time data broker only serves the live snapshot: the latest fuel
//! mix, today's load and forecast, and the latest consolidated prices. All
//! times are Eastern Standard Time, with no daylight saving.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use grid_schema::{
    ColumnMap, Market, Schema, SchemaError, Stamp, Table, Value,
    columns::{
        CONGESTION, ENERGY, FORECAST_TIME, LMP, LMP_COLUMNS, LOAD, LOAD_FORECAST, LOCATION,
        LOCATION_TYPE, LOSS, MARKET,
    },
    normalize::attach_intervals,
    queue::format_interconnection,
    tz::{localize, parse_naive},
};
use serde_json::Value as Json;
use tracing::info;

use super::{
    SourceAdapter, Span, is_current_day,
    payload::{json_array, json_path, json_records, json_value, numbers},
};
use crate::{
    errors::{Error, UpstreamError},
    http::{HttpClient, NO_QUERY},
    models::{
        operator::Operator,
        request::{Dataset, Query},
    },
};

const TZ: Tz = chrono_tz::EST;
const BROKER: &str = "https://api.misoenergy.org/MISORTWDDataBroker/DataBrokerServices.asmx";
const QUEUE_URL: &str = "https://www.misoenergy.org/api/giqueue/getprojects";

const INTERVAL_FORMATS: [&str; 3] = [
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
];

const MARKETS: [Market; 2] = [Market::RealTime5Min, Market::DayAheadHourly];
const LOCATION_TYPES: [&str; 2] = ["Pricing Node", "Hub"];

const QUEUE_FIELDS: [&str; 26] = [
    "projectNumber",
    "county",
    "state",
    "transmissionOwner",
    "poiName",
    "queueDate",
    "withdrawnDate",
    "applicationStatus",
    "summerNetMW",
    "winterNetMW",
    "negInService",
    "fuelType",
    "postGIAStatus",
    "doneDate",
    "facilityType",
    "inService",
    "giaToExec",
    "studyCycle",
    "studyGroup",
    "studyPhase",
    "svcType",
    "dp1ErisMw",
    "dp1NrisMw",
    "dp2ErisMw",
    "dp2NrisMw",
    "sisPhase1",
];

const QUEUE_RENAMES: [(&str, &str); 14] = [
    ("projectNumber", "Queue ID"),
    ("county", "County"),
    ("state", "State"),
    ("transmissionOwner", "Transmission Owner"),
    ("poiName", "Interconnection Location"),
    ("queueDate", "Queue Date"),
    ("withdrawnDate", "Withdrawn Date"),
    ("applicationStatus", "Status"),
    ("summerNetMW", "Summer Capacity (MW)"),
    ("winterNetMW", "Winter Capacity (MW)"),
    ("negInService", "Proposed Completion Date"),
    ("fuelType", "Generation Type"),
    ("postGIAStatus", "Post Generator Interconnection Agreement Status"),
    ("doneDate", "Interconnection Approval Date"),
];

const QUEUE_EXTRA: [&str; 14] = [
    "facilityType",
    "Post Generator Interconnection Agreement Status",
    "Interconnection Approval Date",
    "inService",
    "giaToExec",
    "studyCycle",
    "studyGroup",
    "studyPhase",
    "svcType",
    "dp1ErisMw",
    "dp1NrisMw",
    "dp2ErisMw",
    "dp2NrisMw",
    "sisPhase1",
];

const QUEUE_MISSING: [&str; 4] = [
    "Actual Completion Date",
    "Withdrawal Comment",
    "Project Name",
    "Interconnecting Entity",
];

fn local(naive: chrono::NaiveDateTime) -> Result<DateTime<Tz>, SchemaError> {
    Ok(localize(naive, TZ)?)
}

/// The market day named by a `RefId` such as `02-Jan-2024 - Interval 10:45 EST`.
pub fn ref_day(report: &str, ref_id: &str) -> Result<NaiveDate, SchemaError> {
    let day = ref_id.split_whitespace().next().unwrap_or_default();
    NaiveDate::parse_from_str(day, "%d-%b-%Y")
        .map_err(|e| SchemaError::parse(report, format!("bad RefId `{ref_id}`: {e}")))
}

/// The interval named by a `RefId`: its day plus the trailing `HH:MM`.
pub fn ref_time(report: &str, ref_id: &str) -> Result<DateTime<Tz>, SchemaError> {
    let day = ref_day(report, ref_id)?;
    let time = ref_id
        .split_whitespace()
        .find_map(|part| NaiveTime::parse_from_str(part, "%H:%M").ok())
        .ok_or_else(|| SchemaError::parse(report, format!("no time in RefId `{ref_id}`")))?;
    local(day.and_time(time))
}

/// The latest fuel mix: one row, one column per `CATEGORY`. The broker
/// reports `-1` for fuels it has no reading for; those count as zero.
pub fn parse_fuel_mix(doc: &Json) -> Result<Table, SchemaError> {
    const REPORT: &str = "getfuelmix";
    let fuels = json_array(REPORT, doc, &["Fuel", "Type"])?;
    let first = fuels
        .first()
        .ok_or_else(|| SchemaError::parse(REPORT, "no fuels"))?;
    let stamp = json_value(first.get("INTERVALEST").unwrap_or(&Json::Null)).to_string();
    let naive = parse_naive(&stamp, &INTERVAL_FORMATS)
        .ok_or_else(|| SchemaError::parse(REPORT, format!("unrecognized time `{stamp}`")))?;
    let mut columns = vec!["Stamp".to_string()];
    let mut row = vec![Value::Timestamp(local(naive)?)];
    for fuel in fuels {
        let category = json_value(fuel.get("CATEGORY").unwrap_or(&Json::Null)).to_string();
        let amount = match json_value(fuel.get("ACT").unwrap_or(&Json::Null)).as_f64() {
            Some(v) if v == -1.0 => 0.0,
            Some(v) => v,
            None => return Err(SchemaError::parse(REPORT, format!("no reading for {category}"))),
        };
        columns.push(category);
        row.push(Value::Float(amount));
    }
    let mut table = Table::from_rows(columns, vec![row])?;
    attach_intervals(&mut table, "Stamp", Stamp::Start, Duration::minutes(5))?;
    Ok(table)
}

/// Today's 5-minute load: `LoadInfo.FiveMinTotalLoad[].Load` with `HH:MM`
/// times on the `RefId` day.
pub fn parse_load(doc: &Json) -> Result<Table, SchemaError> {
    const REPORT: &str = "gettotalload";
    let ref_id = json_value(json_path(REPORT, doc, &["LoadInfo", "RefId"])?).to_string();
    let day = ref_day(REPORT, &ref_id)?;
    let loads: Vec<Json> = json_array(REPORT, doc, &["LoadInfo", "FiveMinTotalLoad"])?
        .iter()
        .filter_map(|x| x.get("Load").cloned())
        .collect();
    let mut table = json_records(&loads, &["Time", "Value"])?;
    let starts = table
        .rows()
        .iter()
        .map(|r| {
            let t = r[0].to_string();
            let time = NaiveTime::parse_from_str(&t, "%H:%M")
                .map_err(|e| SchemaError::parse(REPORT, format!("bad time `{t}`: {e}")))?;
            local(day.and_time(time)).map(Value::Timestamp)
        })
        .collect::<Result<Vec<_>, _>>()?;
    table.set_column("Time", starts)?;
    table.rename_column("Time", "Stamp")?;
    table.rename_column("Value", LOAD)?;
    numbers(&mut table, &[LOAD])?;
    attach_intervals(&mut table, "Stamp", Stamp::Start, Duration::minutes(5))?;
    Ok(table)
}

/// Today's hourly forecast: `LoadInfo.MediumTermLoadForecast[].Forecast`,
/// by hour ending. The forecast is stamped with the start of the day.
pub fn parse_load_forecast(doc: &Json) -> Result<Table, SchemaError> {
    const REPORT: &str = "gettotalload";
    let ref_id = json_value(json_path(REPORT, doc, &["LoadInfo", "RefId"])?).to_string();
    let midnight = local(ref_day(REPORT, &ref_id)?.and_time(NaiveTime::MIN))?;
    let forecasts: Vec<Json> = json_array(REPORT, doc, &["LoadInfo", "MediumTermLoadForecast"])?
        .iter()
        .filter_map(|x| x.get("Forecast").cloned())
        .collect();
    let mut table = json_records(&forecasts, &["HourEnding", "LoadForecast"])?;
    let starts = table
        .rows()
        .iter()
        .map(|r| {
            let he = r[0]
                .as_f64()
                .ok_or_else(|| SchemaError::parse(REPORT, format!("bad hour ending `{}`", r[0])))?;
            Ok(Value::Timestamp(midnight + Duration::hours(he as i64 - 1)))
        })
        .collect::<Result<Vec<_>, SchemaError>>()?;
    table.set_column("HourEnding", starts)?;
    table.rename_column("LoadForecast", LOAD_FORECAST)?;
    numbers(&mut table, &[LOAD_FORECAST])?;
    table.insert_column(1, FORECAST_TIME, vec![Value::Timestamp(midnight); table.len()])?;
    attach_intervals(&mut table, "HourEnding", Stamp::Start, Duration::hours(1))?;
    Ok(table)
}

/// The latest consolidated prices for `market`. Day-ahead prices are for
/// the hour the snapshot falls in.
pub fn parse_lmp(doc: &Json, market: Market) -> Result<Table, SchemaError> {
    const REPORT: &str = "getLMPConsolidatedTable";
    let ref_id = json_value(json_path(REPORT, doc, &["LMPData", "RefId"])?).to_string();
    let mut start = ref_time(REPORT, &ref_id)?;
    let (section, length) = match market {
        Market::RealTime5Min => ("FiveMinLMP", Duration::minutes(5)),
        Market::DayAheadHourly => {
            start = start
                .with_minute(0)
                .ok_or_else(|| SchemaError::parse(REPORT, "cannot floor to the hour"))?;
            ("DayAheadExPostLMP", Duration::hours(1))
        }
        other => {
            return Err(SchemaError::parse(REPORT, format!("no section for {other}")));
        }
    };
    let nodes = json_array(REPORT, doc, &["LMPData", section, "PricingNode"])?;
    let mut table = json_records(nodes, &["name", "LMP", "MLC", "MCC"])?;
    table.rename_column("name", LOCATION)?;
    table.rename_column("MLC", LOSS)?;
    table.rename_column("MCC", CONGESTION)?;
    numbers(&mut table, &[LMP, LOSS, CONGESTION])?;
    let energy = table
        .rows()
        .iter()
        .map(|r| match (r[1].as_f64(), r[2].as_f64(), r[3].as_f64()) {
            (Some(lmp), Some(loss), Some(congestion)) => Value::Float(lmp - loss - congestion),
            _ => Value::Null,
        })
        .collect();
    table.push_column(ENERGY, energy)?;
    let types = table
        .rows()
        .iter()
        .map(|r| {
            let hub = r[0].as_str().is_some_and(|l| l.ends_with(".HUB"));
            Value::text(if hub { "Hub" } else { "Pricing Node" })
        })
        .collect();
    table.push_column(LOCATION_TYPE, types)?;
    table.fill_column(MARKET, Value::text(market.as_str()))?;
    table.fill_column("Stamp", Value::Timestamp(start))?;
    attach_intervals(&mut table, "Stamp", Stamp::Start, length)?;
    table.select(&LMP_COLUMNS)
}

/// Interconnection queue from the `giqueue` API. Capacity is the larger of
/// the summer and winter ratings.
pub fn parse_queue(doc: &Json) -> Result<Table, SchemaError> {
    let projects = doc
        .as_array()
        .ok_or_else(|| SchemaError::parse("giqueue", "expected an array of projects"))?;
    let mut table = json_records(projects, &QUEUE_FIELDS)?;
    numbers(&mut table, &["summerNetMW", "winterNetMW"])?;
    let capacity = table
        .rows()
        .iter()
        .map(|r| match (r[8].as_f64(), r[9].as_f64()) {
            (Some(s), Some(w)) => Value::Float(s.max(w)),
            (Some(v), None) | (None, Some(v)) => Value::Float(v),
            (None, None) => Value::Null,
        })
        .collect();
    table.push_column("Capacity (MW)", capacity)?;
    let rename = ColumnMap::new(Schema::InterconnectionQueue, &QUEUE_RENAMES)?;
    format_interconnection(table, &rename, &QUEUE_EXTRA, &QUEUE_MISSING)
}

/// MISO adapter.
#[derive(Debug, Clone)]
pub struct Miso {
    http: HttpClient,
}

impl Miso {
    /// Adapter on the given client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn broker(&self, message: &str) -> Result<Json, UpstreamError> {
        info!(message, "fetching MISO data broker");
        self.http
            .get_json(BROKER, &[("messageType", message), ("returnType", "json")])
            .await
    }

    fn today_only(&self, span: &Span, now: DateTime<Utc>, what: &str) -> Result<(), Error> {
        match span.window() {
            Some(w) if !is_current_day(w.start.date_naive(), TZ, now) => Err(
                Error::not_supported(Operator::Miso, format!("{what} before today")),
            ),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl SourceAdapter for Miso {
    fn operator(&self) -> Operator {
        Operator::Miso
    }

    fn lmp_markets(&self) -> &'static [Market] {
        &MARKETS
    }

    fn location_types(&self) -> &'static [&'static str] {
        &LOCATION_TYPES
    }

    async fn fuel_mix(&self, span: &Span, _now: DateTime<Utc>) -> Result<Table, Error> {
        if span.window().is_some() {
            return Err(Error::not_supported(Operator::Miso, "fuel mix other than latest"));
        }
        let table = parse_fuel_mix(&self.broker("getfuelmix").await?)?;
        Schema::FuelMix.validate(&table)?;
        Ok(table)
    }

    async fn load(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        self.today_only(span, now, "load")?;
        Ok(parse_load(&self.broker("gettotalload").await?)?)
    }

    async fn load_forecast(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        self.today_only(span, now, "load forecast")?;
        Ok(parse_load_forecast(&self.broker("gettotalload").await?)?)
    }

    async fn lmp(&self, query: &Query, span: &Span, _now: DateTime<Utc>) -> Result<Table, Error> {
        let market = query
            .market
            .ok_or_else(|| Error::InvalidRequest("lmp requires a market".into()))?;
        if !MARKETS.contains(&market) {
            return Err(Error::not_supported(Operator::Miso, format!("market {market}")));
        }
        if span.window().is_some() {
            return Err(Error::not_supported(Operator::Miso, "lmp other than latest"));
        }
        let doc = self.broker("getLMPConsolidatedTable").await?;
        Ok(parse_lmp(&doc, market)?)
    }

    async fn interconnection_queue(&self) -> Result<Table, Error> {
        let doc: Json = self.http.get_json(QUEUE_URL, NO_QUERY).await?;
        let table = parse_queue(&doc)?;
        if table.is_empty() {
            return Err(Error::no_data(Dataset::InterconnectionQueue, QUEUE_URL));
        }
        Ok(table)
    }
}
