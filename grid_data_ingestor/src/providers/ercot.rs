//! ERCOT.
//!
//! Fuel mix and load come from the public dashboard JSON, which only covers
//! the last two days. SCED prices come from the MIS document store: a JSON
//! listing of recent documents for a report type, each downloadable as a
//! zipped CSV.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use grid_schema::{
    Market, RangePlan, Schema, SchemaError, Stamp, Table, Value, Window,
    columns::{
        CONGESTION, ENERGY, INTERVAL_START, LMP, LMP_COLUMNS, LOAD, LOCATION, LOCATION_TYPE,
        LOSS, MARKET,
    },
    frequency::Frequency,
    normalize::{attach_intervals, drop_empty_rows, localize_column_hinted},
    tz::{DstHint, localize_hinted, parse_instant, parse_naive},
};
use serde::Deserialize;
use serde_json::Value as Json;
use tracing::{debug, info};

use super::{
    SourceAdapter, Span, is_current_day,
    payload::{instants, json_array, json_path, json_records, numbers, read_csv, unzip},
};
use crate::{
    errors::{Error, UpstreamError},
    http::{HttpClient, NO_QUERY},
    models::{
        operator::Operator,
        request::{Dataset, Query},
    },
};

const TZ: Tz = chrono_tz::America::Chicago;
const DASHBOARDS: &str = "https://www.ercot.com/api/1/services/read/dashboards";
const DOC_LIST: &str = "https://www.ercot.com/misapp/servlets/IceDocListJsonWS";
const DOC_DOWNLOAD: &str = "https://www.ercot.com/misdownload/servlets/mirDownload";

/// LMPs by resource nodes, load zones and trading hubs, one file per SCED run.
const SCED_LMP_REPORT: u32 = 12300;

const SCED_FORMATS: [&str; 2] = ["%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M"];
const SCED_TIMESTAMP: &str = "SCED Timestamp";
const REPEATED_HOUR: &str = "RepeatedHourFlag";

/// Fuel columns of the dashboard fuel mix, in output order.
pub const FUELS: [&str; 8] = [
    "Coal and Lignite",
    "Hydro",
    "Nuclear",
    "Power Storage",
    "Solar",
    "Wind",
    "Natural Gas",
    "Other",
];

const MARKETS: [Market; 1] = [Market::RealTimeSced];

const TRADING_HUB: &str = "Trading Hub";
const LOAD_ZONE: &str = "Load Zone";
const LOAD_ZONE_DC_TIE: &str = "Load Zone DC Tie";
const LOAD_ZONE_EW: &str = "Load Zone Energy Weighted";
const LOAD_ZONE_DC_TIE_EW: &str = "Load Zone DC Tie Energy Weighted";
const RESOURCE_NODE: &str = "Resource Node";

const LOCATION_TYPES: [&str; 6] = [
    TRADING_HUB,
    LOAD_ZONE,
    LOAD_ZONE_DC_TIE,
    LOAD_ZONE_EW,
    LOAD_ZONE_DC_TIE_EW,
    RESOURCE_NODE,
];

/// One entry of an MIS document listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    /// Download id.
    #[serde(rename = "DocID")]
    pub doc_id: Json,
    /// Name carrying the report timestamp, e.g. `LMPSROSNODENP6788_20240102_000014_csv`.
    #[serde(rename = "FriendlyName")]
    pub friendly_name: String,
    /// Publication time with offset.
    #[serde(rename = "PublishDate", default)]
    pub publish_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocListResponse {
    #[serde(rename = "ListDocsByRptTypeRes")]
    body: DocListBody,
}

#[derive(Debug, Deserialize)]
struct DocListBody {
    #[serde(rename = "DocumentList", default)]
    documents: Vec<DocEntry>,
}

#[derive(Debug, Deserialize)]
struct DocEntry {
    #[serde(rename = "Document")]
    document: Document,
}

impl Document {
    fn id(&self) -> String {
        match &self.doc_id {
            Json::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn is_csv(&self) -> bool {
        self.friendly_name.ends_with("csv")
    }

    /// Timestamp encoded in the friendly name.
    ///
    /// Names during the repeated fall-back hour carry `xhr`.
    pub fn timestamp(&self) -> Option<DateTime<Tz>> {
        let name = self.friendly_name.replace("_retry", "");
        let mut parts = name.split('_').skip(1);
        let date = parts.next()?;
        let time = parts.next()?;
        let time = match time.len() {
            4 => format!("{time}00"),
            6 => time.to_string(),
            _ => return None,
        };
        let naive = NaiveDateTime::parse_from_str(&format!("{date}{time}"), "%Y%m%d%H%M%S").ok()?;
        let hint = DstHint::from_repeated_flag(self.friendly_name.contains("xhr"));
        localize_hinted(naive, TZ, hint).ok()
    }
}

/// Parse an MIS document listing.
pub fn parse_documents(body: &[u8]) -> Result<Vec<Document>, serde_json::Error> {
    let list: DocListResponse = serde_json::from_slice(body)?;
    Ok(list.body.documents.into_iter().map(|d| d.document).collect())
}

/// CSV documents whose name timestamp falls in `window`, oldest first, or
/// only the newest one when `window` is `None`.
pub fn select_documents(documents: Vec<Document>, window: Option<&Window>) -> Vec<Document> {
    let mut dated: Vec<(DateTime<Tz>, Document)> = documents
        .into_iter()
        .filter(Document::is_csv)
        .filter_map(|d| d.timestamp().map(|t| (t, d)))
        .collect();
    dated.sort_by_key(|(t, _)| *t);
    match window {
        Some(w) => dated
            .into_iter()
            .filter(|(t, _)| w.contains(t))
            .map(|(_, d)| d)
            .collect(),
        None => dated.pop().map(|(_, d)| d).into_iter().collect(),
    }
}

fn round_to_minute(t: DateTime<Tz>) -> Result<DateTime<Tz>, SchemaError> {
    let secs = (t.timestamp() + 30).div_euclid(60) * 60;
    DateTime::from_timestamp(secs, 0)
        .map(|utc| utc.with_timezone(&TZ))
        .ok_or_else(|| SchemaError::parse("fuel-mix.json", format!("timestamp {secs} out of range")))
}

/// Fuel mix from the dashboard: `data.<day>.<timestamp>.<fuel>.gen`.
///
/// Samples are a few seconds off the 5-minute grid and are rounded to the
/// minute in UTC.
pub fn parse_fuel_mix(doc: &Json) -> Result<Table, SchemaError> {
    const REPORT: &str = "fuel-mix.json";
    let days = json_path(REPORT, doc, &["data"])?
        .as_object()
        .ok_or_else(|| SchemaError::parse(REPORT, "`data` is not an object"))?;
    let mut rows = Vec::new();
    for samples in days.values() {
        let samples = samples
            .as_object()
            .ok_or_else(|| SchemaError::parse(REPORT, "day entry is not an object"))?;
        for (stamp, fuels) in samples {
            let t = parse_instant(stamp, TZ)
                .ok_or_else(|| SchemaError::parse(REPORT, format!("unrecognized time `{stamp}`")))?;
            let mut row = vec![Value::Timestamp(round_to_minute(t)?)];
            row.extend(FUELS.iter().map(|f| {
                fuels
                    .get(f)
                    .and_then(|v| v.get("gen"))
                    .and_then(Json::as_f64)
                    .map_or(Value::Null, Value::Float)
            }));
            rows.push(row);
        }
    }
    let mut table = Table::from_rows(std::iter::once("Stamp").chain(FUELS), rows)?;
    table.sort_by_columns(&["Stamp"])?;
    attach_intervals(&mut table, "Stamp", Stamp::Start, Duration::minutes(5))?;
    Ok(table)
}

/// Actual load from the supply/demand dashboard. `timestamp` ends each
/// 5-minute interval; rows with a nonzero `forecast` are projections.
pub fn parse_load(doc: &Json) -> Result<Table, SchemaError> {
    let records = json_array("supply-demand.json", doc, &["data"])?;
    let mut table = json_records(records, &["timestamp", "demand", "forecast"])?;
    instants(&mut table, "timestamp", TZ)?;
    numbers(&mut table, &["demand", "forecast"])?;
    let before = table.len();
    table.retain_rows(|r| r.get("forecast").and_then(Value::as_f64) == Some(0.0))?;
    debug!(dropped = before - table.len(), "dropped forecast rows");
    table.rename_column("demand", LOAD)?;
    let mut out = table.select(&["timestamp", LOAD])?;
    attach_intervals(&mut out, "timestamp", Stamp::End, Duration::minutes(5))?;
    Ok(out)
}

/// Location type of a settlement point.
pub fn settlement_point_type(name: &str) -> &'static str {
    if name.starts_with("HB_") {
        TRADING_HUB
    } else if name.starts_with("LZ_") {
        LOAD_ZONE
    } else if name.starts_with("DC_") {
        LOAD_ZONE_DC_TIE
    } else {
        RESOURCE_NODE
    }
}

fn floor_to_five_minutes(t: DateTime<Tz>) -> Option<DateTime<Tz>> {
    let secs = t.timestamp().div_euclid(300) * 300;
    DateTime::from_timestamp(secs, 0).map(|utc| utc.with_timezone(&TZ))
}

/// SCED prices from one or more downloaded files.
///
/// The SCED timestamp is local time; `RepeatedHourFlag` marks the second
/// pass through the fall-back hour. Intervals are the 5-minute slot the run
/// falls in. Blank rows are skipped; any other row whose timestamp does not
/// parse fails the whole file with [`SchemaError::Parse`]. Only the total
/// price is published, so the components are null.
pub fn shape_sced_lmp(raw: Table) -> Result<Table, SchemaError> {
    let mut raw = raw;
    raw.rename_any(&["SCEDTimestamp", "SCEDTimeStamp"], SCED_TIMESTAMP)?;
    raw.rename_any(&["RepeatHourFlag"], REPEATED_HOUR)?;
    raw.rename_any(
        &["SettlementPoint", "Settlement Point", "SettlementPointName", "Settlement Point Name"],
        LOCATION,
    )?;

    drop_empty_rows(&mut raw, &[])?;
    if let Some((row, bad)) = raw
        .column(SCED_TIMESTAMP)?
        .into_iter()
        .enumerate()
        .find(|(_, v)| parse_naive(&v.to_string(), &SCED_FORMATS).is_none())
    {
        return Err(SchemaError::parse(
            "SCED LMP",
            format!("row {row} has unrecognized {SCED_TIMESTAMP} `{bad}`"),
        ));
    }
    localize_column_hinted(
        &mut raw,
        SCED_TIMESTAMP,
        &SCED_FORMATS,
        REPEATED_HOUR,
        |v| DstHint::from_repeated_flag(v.as_str().is_some_and(|f| f.eq_ignore_ascii_case("Y"))),
        TZ,
    )?;
    let slots = raw
        .timestamps(SCED_TIMESTAMP)?
        .into_iter()
        .enumerate()
        .map(|(row, t)| {
            floor_to_five_minutes(t)
                .map(Value::Timestamp)
                .ok_or_else(|| SchemaError::InvalidValue {
                    column: SCED_TIMESTAMP.to_string(),
                    row,
                    message: "timestamp out of range".into(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    raw.push_column("Slot", slots)?;

    let loc = raw.require(LOCATION)?;
    let kind = raw.column_index("SettlementPointType");
    let (locations, types): (Vec<Value>, Vec<Value>) = raw
        .rows()
        .iter()
        .map(|r| {
            let name = r[loc].to_string();
            match kind.map(|k| r[k].to_string()).as_deref() {
                Some("LZEW") => (Value::Text(format!("{name}_EW")), Value::text(LOAD_ZONE_EW)),
                Some("LZ_DCEW") => (
                    Value::Text(format!("{name}_EW")),
                    Value::text(LOAD_ZONE_DC_TIE_EW),
                ),
                _ => {
                    let t = settlement_point_type(&name);
                    (Value::Text(name), Value::text(t))
                }
            }
        })
        .unzip();
    raw.set_column(LOCATION, locations)?;
    raw.set_column(LOCATION_TYPE, types)?;

    numbers(&mut raw, &[LMP])?;
    for c in [ENERGY, CONGESTION, LOSS] {
        raw.fill_column(c, Value::Null)?;
    }
    raw.fill_column(MARKET, Value::text(Market::RealTimeSced.as_str()))?;
    attach_intervals(&mut raw, "Slot", Stamp::Start, Duration::minutes(5))?;
    let columns: Vec<&str> = LMP_COLUMNS.iter().copied().chain([SCED_TIMESTAMP]).collect();
    let mut out = raw.select(&columns)?;
    out.sort_by_columns(&[SCED_TIMESTAMP, LOCATION])?;
    Ok(out)
}

/// ERCOT adapter.
#[derive(Debug, Clone)]
pub struct Ercot {
    http: HttpClient,
}

impl Ercot {
    /// Adapter on the given client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn dashboard(&self, name: &str) -> Result<Json, UpstreamError> {
        self.http
            .get_json(&format!("{DASHBOARDS}/{name}.json"), NO_QUERY)
            .await
    }

    async fn documents(&self, report: u32, now: DateTime<Utc>) -> Result<Vec<Document>, Error> {
        let report_id = report.to_string();
        let buster = now.timestamp().to_string();
        let payload = self
            .http
            .get(DOC_LIST, &[("reportTypeId", report_id.as_str()), ("_", buster.as_str())])
            .await?;
        parse_documents(&payload.body).map_err(|e| {
            Error::Upstream(UpstreamError::Decode {
                url: payload.url.clone(),
                message: e.to_string(),
            })
        })
    }

    async fn download(&self, document: &Document) -> Result<Table, Error> {
        let id = document.id();
        let payload = self.http.get(DOC_DOWNLOAD, &[("doclookupId", id.as_str())]).await?;
        let mut table = Table::default();
        for (name, body) in unzip(&payload)? {
            table.append(read_csv(&name, &body)?)?;
        }
        Ok(table)
    }

    fn dashboard_day(&self, span: &Span, now: DateTime<Utc>) -> Result<Option<NaiveDate>, Error> {
        let Some(window) = span.window() else {
            return Ok(None);
        };
        let date = window.start.date_naive();
        let yesterday = now.with_timezone(&TZ).date_naive().pred_opt();
        if is_current_day(date, TZ, now) || Some(date) == yesterday {
            Ok(Some(date))
        } else {
            Err(Error::not_supported(
                Operator::Ercot,
                format!("dashboard data for {date}; only today and yesterday are published"),
            ))
        }
    }
}

#[async_trait]
impl SourceAdapter for Ercot {
    fn operator(&self) -> Operator {
        Operator::Ercot
    }

    fn lmp_markets(&self) -> &'static [Market] {
        &MARKETS
    }

    fn location_types(&self) -> &'static [&'static str] {
        &LOCATION_TYPES
    }

    fn range_plan(&self, query: &Query, _window: &Window, _now: DateTime<Utc>) -> RangePlan {
        match query.dataset {
            Dataset::Lmp => RangePlan::single(),
            _ => RangePlan::every(Frequency::DayStart),
        }
    }

    fn native_interval(&self, query: &Query) -> Option<Duration> {
        match query.dataset {
            Dataset::FuelMix | Dataset::Supply | Dataset::Load => Some(Duration::minutes(5)),
            _ => None,
        }
    }

    async fn fuel_mix(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        let day = self.dashboard_day(span, now)?;
        let mut table = parse_fuel_mix(&self.dashboard("fuel-mix").await?)?;
        if let Some(day) = day {
            let start = table.require(INTERVAL_START)?;
            table.retain_rows(|r| {
                r.values()[start]
                    .as_timestamp()
                    .is_some_and(|t| t.date_naive() == day)
            })?;
        }
        Schema::FuelMix.validate(&table)?;
        Ok(table)
    }

    async fn load(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        if let Some(w) = span.window() {
            if !is_current_day(w.start.date_naive(), TZ, now) {
                return Err(Error::not_supported(Operator::Ercot, "load history"));
            }
        }
        Ok(parse_load(&self.dashboard("supply-demand").await?)?)
    }

    async fn lmp(&self, query: &Query, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        match query.market {
            Some(Market::RealTimeSced) => {}
            Some(other) => {
                return Err(Error::not_supported(Operator::Ercot, format!("market {other}")));
            }
            None => return Err(Error::InvalidRequest("lmp requires a market".into())),
        }
        let documents = select_documents(
            self.documents(SCED_LMP_REPORT, now).await?,
            span.window(),
        );
        if documents.is_empty() {
            let what = span.window().map_or_else(|| "latest".to_string(), Window::to_string);
            return Err(Error::no_data(Dataset::Lmp, what));
        }
        info!(documents = documents.len(), "downloading SCED price files");
        let mut raw = Table::default();
        for d in &documents {
            raw.append(self.download(d).await?)?;
        }
        Ok(shape_sced_lmp(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_schema::{columns::INTERVAL_END, tz::to_rfc3339};

    fn doc(name: &str) -> Document {
        Document {
            doc_id: Json::from(1),
            friendly_name: name.to_string(),
            publish_date: None,
        }
    }

    #[test]
    fn friendly_names_carry_the_run_time() {
        let t = doc("LMPSROSNODENP6788_20240102_000014_csv").timestamp().unwrap();
        assert_eq!(to_rfc3339(&t), "2024-01-02T00:00:14-06:00");
        let retry = doc("LMPSROSNODENP6788_retry_20240102_1545_csv").timestamp().unwrap();
        assert_eq!(to_rfc3339(&retry), "2024-01-02T15:45:00-06:00");
        let first = doc("LMPSROSNODENP6788_20241103_013014_csv").timestamp().unwrap();
        let second = doc("LMPSROSNODENP6788_20241103_013014_xhr_csv").timestamp().unwrap();
        assert_eq!(second - first, Duration::hours(1));
        assert!(doc("garbage").timestamp().is_none());
    }

    #[test]
    fn documents_are_selected_by_name_time() {
        let body = serde_json::json!({"ListDocsByRptTypeRes": {"DocumentList": [
            {"Document": {"DocID": "11", "FriendlyName": "LMPSROSNODENP6788_20240102_000514_csv"}},
            {"Document": {"DocID": "10", "FriendlyName": "LMPSROSNODENP6788_20240102_000014_csv"}},
            {"Document": {"DocID": "12", "FriendlyName": "LMPSROSNODENP6788_20240102_000014_xml"}},
            {"Document": {"DocID": "13", "FriendlyName": "LMPSROSNODENP6788_20240103_000014_csv"}}
        ]}});
        let docs = parse_documents(body.to_string().as_bytes()).unwrap();
        assert_eq!(docs.len(), 4);
        let day = Window::day(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), TZ).unwrap();
        let picked = select_documents(docs.clone(), Some(&day));
        let ids: Vec<String> = picked.iter().map(Document::id).collect();
        assert_eq!(ids, ["10", "11"]);
        let latest = select_documents(docs, None);
        assert_eq!(latest[0].id(), "13");
    }

    #[test]
    fn fuel_mix_rounds_samples_to_the_minute() {
        let doc = serde_json::json!({"data": {
            "2024-01-02": {
                "2024-01-02 00:04:58-0600": {"Wind": {"gen": 9000.5}, "Solar": {"gen": 0}},
                "2024-01-02 00:00:03-0600": {"Wind": {"gen": 9100}, "Nuclear": {"gen": 5000}}
            }
        }});
        let mix = parse_fuel_mix(&doc).unwrap();
        Schema::FuelMix.validate(&mix).unwrap();
        assert_eq!(mix.len(), 2);
        let starts = mix.timestamps(INTERVAL_START).unwrap();
        assert_eq!(to_rfc3339(&starts[0]), "2024-01-02T00:00:00-06:00");
        assert_eq!(to_rfc3339(&starts[1]), "2024-01-02T00:05:00-06:00");
        let first = mix.row(0).unwrap();
        assert_eq!(first.get("Wind"), Some(&Value::Float(9100.0)));
        assert_eq!(first.get("Solar"), Some(&Value::Null));
    }

    #[test]
    fn load_drops_forecast_rows() {
        let doc = serde_json::json!({"data": [
            {"timestamp": "2024-01-02 00:05:00-0600", "demand": 40000.0, "forecast": 0},
            {"timestamp": "2024-01-02 00:10:00-0600", "demand": 40100.0, "forecast": 0},
            {"timestamp": "2024-01-02 00:15:00-0600", "demand": 40200.0, "forecast": 1}
        ]});
        let load = parse_load(&doc).unwrap();
        Schema::Load.validate(&load).unwrap();
        assert_eq!(load.len(), 2);
        let start = load.timestamps(INTERVAL_START).unwrap()[0];
        let end = load.timestamps(INTERVAL_END).unwrap()[0];
        assert_eq!(to_rfc3339(&start), "2024-01-02T00:00:00-06:00");
        assert_eq!(end - start, Duration::minutes(5));
    }

    #[test]
    fn sced_runs_use_the_repeated_hour_flag() {
        let raw = read_csv(
            "sced",
            b"SCEDTimestamp,RepeatedHourFlag,SettlementPoint,LMP\n\
              11/03/2024 01:32:14,N,HB_HOUSTON,20.5\n\
              11/03/2024 01:32:14,Y,HB_HOUSTON,21.5\n\
              11/03/2024 01:32:14,N,LZ_WEST,22\n",
        )
        .unwrap();
        let lmp = shape_sced_lmp(raw).unwrap();
        Schema::Lmp.validate(&lmp).unwrap();
        assert_eq!(lmp.len(), 3);
        let starts = lmp.timestamps(INTERVAL_START).unwrap();
        assert_eq!(to_rfc3339(&starts[0]), "2024-11-03T01:30:00-05:00");
        assert_eq!(lmp.row(1).unwrap().get(LOCATION_TYPE), Some(&Value::text(LOAD_ZONE)));
        assert_eq!(to_rfc3339(&starts[2]), "2024-11-03T01:30:00-06:00");
        assert_eq!(lmp.row(2).unwrap().get(LMP), Some(&Value::Float(21.5)));
        assert_eq!(lmp.row(0).unwrap().get(ENERGY), Some(&Value::Null));
    }

    #[test]
    fn sced_rejects_unreadable_timestamps_but_skips_blank_rows() {
        let columns = ["SCEDTimestamp", "RepeatedHourFlag", "SettlementPoint", "LMP"];
        let good = vec![
            Value::text("01/02/2024 10:05:14"),
            Value::text("N"),
            Value::text("HB_NORTH"),
            Value::text("30"),
        ];
        let blank = vec![Value::Null; 4];
        let raw = Table::from_rows(columns, vec![good.clone(), blank]).unwrap();
        assert_eq!(shape_sced_lmp(raw).unwrap().len(), 1);

        let garbled = vec![
            Value::text("01/02/2024 25:05"),
            Value::text("N"),
            Value::text("HB_WEST"),
            Value::text("31"),
        ];
        let raw = Table::from_rows(columns, vec![good, garbled]).unwrap();
        match shape_sced_lmp(raw).unwrap_err() {
            SchemaError::Parse { message, .. } => assert!(message.contains("01/02/2024 25:05")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn settlement_point_types() {
        assert_eq!(settlement_point_type("HB_NORTH"), TRADING_HUB);
        assert_eq!(settlement_point_type("LZ_AEN"), LOAD_ZONE);
        assert_eq!(settlement_point_type("DC_L"), LOAD_ZONE_DC_TIE);
        assert_eq!(settlement_point_type("AMISTAD_ALL"), RESOURCE_NODE);
    }
}
