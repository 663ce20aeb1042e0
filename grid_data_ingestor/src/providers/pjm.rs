//! PJM Interconnection, through the Data Miner API.
//!
//! Every feed is paged JSON filtered on `datetime_beginning_ept`. The
//! filter includes its end bound, so the row starting exactly at the end of
//! the window is dropped. LMP feeds keep a short rolling window of
//! server-filterable data; older rows live in an archive that only accepts
//! the time filter.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use grid_schema::{
    ColumnMap, Frequency, LocationFilter, Market, RangePlan, Schema, SchemaError, Stamp, Table,
    Value, Window,
    columns::{
        FORECAST_TIME, INTERVAL_START, LMP_COLUMNS, LOAD, LOAD_FORECAST, LOCATION, LOCATION_NAME,
        LOCATION_TYPE, MARKET,
    },
    normalize::{attach_intervals, last_row, latest_per_location},
    tz::start_of_day,
};
use nonzero_ext::nonzero;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as Json;
use shared_utils::env::get_env_var_opt;
use snafu::ResultExt;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{
    InvalidApiKeySnafu, ProviderInitError, SourceAdapter, Span,
    payload::{json_array, json_records, numbers, utc_times},
};
use crate::{
    config::PjmConfig,
    errors::{Error, UpstreamError},
    http::{HttpClient, NO_QUERY},
    models::{
        operator::Operator,
        request::{Dataset, Query},
    },
};

const TZ: Tz = chrono_tz::America::New_York;
const API: &str = "https://api.pjm.com/api/v1";
const SETTINGS: &str = "https://dataminer2.pjm.com/config/settings.json";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const ROW_COUNT: &str = "100000";
const UTC_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

const MARKETS: [Market; 3] = [
    Market::RealTime5Min,
    Market::RealTimeHourly,
    Market::DayAheadHourly,
];

/// Pnode types, as published in the `type` field.
pub const LOCATION_TYPES: [&str; 10] = [
    "ZONE",
    "LOAD",
    "GEN",
    "AGGREGATE",
    "INTERFACE",
    "EXT",
    "HUB",
    "EHV",
    "TIE",
    "RESIDUAL_METERED_EDC",
];

/// Pnode ids of the trading hubs, the default LMP locations.
pub const HUB_NODE_IDS: [&str; 12] = [
    "51217",
    "116013751",
    "35010337",
    "34497151",
    "34497127",
    "34497125",
    "33092315",
    "33092313",
    "33092311",
    "4669664",
    "51288",
    "51287",
];

/// One Data Miner LMP feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LmpFeed {
    endpoint: &'static str,
    suffix: &'static str,
    archive_days: i64,
}

impl LmpFeed {
    /// Feed serving `market`.
    pub fn for_market(market: Market) -> Option<Self> {
        let (endpoint, suffix, archive_days) = match market {
            Market::RealTime5Min => ("rt_fivemin_hrl_lmps", "rt", 186),
            Market::RealTimeHourly => ("rt_hrl_lmps", "rt", 731),
            Market::DayAheadHourly => ("da_hrl_lmps", "da", 731),
            _ => return None,
        };
        Some(Self {
            endpoint,
            suffix,
            archive_days,
        })
    }

    /// Local midnight before which rows are only in the archive.
    pub fn archive_date(&self, now: DateTime<Utc>) -> Result<DateTime<Tz>, SchemaError> {
        let today = now.with_timezone(&TZ).date_naive();
        Ok(start_of_day(today - Duration::days(self.archive_days), TZ)?)
    }

    fn fields(&self) -> String {
        let s = self.suffix;
        format!(
            "congestion_price_{s},datetime_beginning_ept,datetime_beginning_utc,equipment,\
             marginal_loss_price_{s},pnode_id,pnode_name,row_is_current,\
             system_energy_price_{s},total_lmp_{s},type,version_nbr,voltage,zone"
        )
    }

    fn renames(&self) -> Vec<(String, &'static str)> {
        let s = self.suffix;
        vec![
            ("pnode_id".to_string(), LOCATION),
            ("pnode_name".to_string(), LOCATION_NAME),
            ("type".to_string(), LOCATION_TYPE),
            (format!("total_lmp_{s}"), "LMP"),
            (format!("system_energy_price_{s}"), "Energy"),
            (format!("congestion_price_{s}"), "Congestion"),
            (format!("marginal_loss_price_{s}"), "Loss"),
        ]
    }
}

/// The `datetime_beginning_ept` filter value for a window.
pub fn ept_filter(window: &Window) -> String {
    format!(
        "{}to{}",
        window.start.format("%m/%d/%Y %H:%M"),
        window.end.format("%m/%d/%Y %H:%M")
    )
}

/// Decode pages of Data Miner items into one table of `fields`.
///
/// `datetime_beginning_utc` becomes a local `Stamp` column, and the row that
/// starts at the end of `window` is removed.
pub fn shape_items(
    pages: &[Json],
    fields: &[&str],
    window: Option<&Window>,
) -> Result<Table, SchemaError> {
    let mut items = Vec::new();
    for page in pages {
        items.extend(json_array("data miner", page, &["items"])?.iter().cloned());
    }
    let mut table = json_records(&items, fields)?;
    if table.has_column("datetime_beginning_utc") {
        utc_times(&mut table, "datetime_beginning_utc", &UTC_FORMATS, TZ)?;
        table.rename_column("datetime_beginning_utc", "Stamp")?;
        if let Some(w) = window {
            let stamp = table.require("Stamp")?;
            table.retain_rows(|r| r.values()[stamp].as_timestamp() != Some(w.end))?;
        }
    }
    Ok(table)
}

/// Hourly generation by fuel, one column per `fuel_type`.
pub fn shape_fuel_mix(raw: &Table) -> Result<Table, SchemaError> {
    let mut mix = raw.pivot(&["Stamp"], "fuel_type", "mw")?;
    let fuels: Vec<String> = mix.columns()[1..].to_vec();
    let fuels: Vec<&str> = fuels.iter().map(String::as_str).collect();
    numbers(&mut mix, &fuels)?;
    attach_intervals(&mut mix, "Stamp", Stamp::Start, Duration::hours(1))?;
    Ok(mix)
}

/// Five-minute instantaneous load for the RTO.
pub fn shape_load(mut raw: Table) -> Result<Table, SchemaError> {
    raw.rename_column("instantaneous_load", LOAD)?;
    let mut load = raw.select(&["Stamp", LOAD])?;
    numbers(&mut load, &[LOAD])?;
    attach_intervals(&mut load, "Stamp", Stamp::Start, Duration::minutes(5))?;
    Ok(load)
}

/// Hourly seven-day forecast for the RTO.
pub fn shape_load_forecast(mut raw: Table) -> Result<Table, SchemaError> {
    raw.rename_column("evaluated_at_datetime_utc", FORECAST_TIME)?;
    raw.rename_column("forecast_datetime_beginning_utc", "Stamp")?;
    raw.rename_column("forecast_load_mw", LOAD_FORECAST)?;
    utc_times(&mut raw, FORECAST_TIME, &UTC_FORMATS, TZ)?;
    utc_times(&mut raw, "Stamp", &UTC_FORMATS, TZ)?;
    let mut forecast = raw.select(&["Stamp", FORECAST_TIME, LOAD_FORECAST])?;
    numbers(&mut forecast, &[LOAD_FORECAST])?;
    attach_intervals(&mut forecast, "Stamp", Stamp::Start, Duration::hours(1))?;
    Ok(forecast)
}

/// LMP rows in canonical order, `Location Name` after the prices.
pub fn shape_lmp(mut raw: Table, feed: &LmpFeed, market: Market) -> Result<Table, SchemaError> {
    let renames = feed.renames();
    let pairs: Vec<(&str, &str)> = renames.iter().map(|(s, t)| (s.as_str(), *t)).collect();
    ColumnMap::new(Schema::Lmp, &pairs)?.apply(&mut raw)?;
    raw.map_column(LOCATION, |v| Value::text(v.to_string()))?;
    numbers(&mut raw, &["LMP", "Energy", "Congestion", "Loss"])?;
    raw.fill_column(MARKET, Value::text(market.as_str()))?;
    let length = Duration::minutes(market.interval_minutes());
    attach_intervals(&mut raw, "Stamp", Stamp::Start, length)?;
    let columns: Vec<&str> = LMP_COLUMNS.iter().copied().chain([LOCATION_NAME]).collect();
    let mut out = raw.select(&columns)?;
    out.sort_by_columns(&[INTERVAL_START, LOCATION])?;
    Ok(out)
}

/// PJM adapter.
#[derive(Debug)]
pub struct Pjm {
    http: HttpClient,
    key: OnceCell<SecretString>,
}

impl Pjm {
    /// Adapter on the given client.
    ///
    /// The subscription key is read from the environment variable named in
    /// `config`; without it, the public Data Miner key is fetched on first
    /// use.
    pub fn new(http: HttpClient, config: &PjmConfig) -> Result<Self, ProviderInitError> {
        let key = get_env_var_opt(&config.api_key_env)
            .map(|value| {
                HeaderValue::from_str(&value).context(InvalidApiKeySnafu)?;
                Ok::<_, ProviderInitError>(SecretString::new(value.into()))
            })
            .transpose()?;
        Ok(Self {
            http,
            key: OnceCell::new_with(key),
        })
    }

    async fn key(&self) -> Result<&SecretString, Error> {
        self.key
            .get_or_try_init(|| async {
                info!("fetching public data miner key");
                let settings: Json = self.http.get_json(SETTINGS, NO_QUERY).await?;
                settings
                    .get("subscriptionKey")
                    .and_then(Json::as_str)
                    .map(|k| SecretString::new(k.into()))
                    .ok_or_else(|| {
                        Error::from(UpstreamError::Decode {
                            url: SETTINGS.to_string(),
                            message: "no subscriptionKey".to_string(),
                        })
                    })
            })
            .await
    }

    async fn headers(&self) -> Result<HeaderMap, Error> {
        let key = self.key().await?;
        let value = HeaderValue::from_str(key.expose_secret()).map_err(|e| {
            Error::from(UpstreamError::Decode {
                url: SETTINGS.to_string(),
                message: e.to_string(),
            })
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(KEY_HEADER, value);
        Ok(headers)
    }

    /// Fetch every page of `endpoint`, filtered to `window` when given.
    async fn data_miner(
        &self,
        dataset: Dataset,
        endpoint: &str,
        fields: &str,
        mut params: Vec<(&str, String)>,
        window: Option<&Window>,
    ) -> Result<Table, Error> {
        let headers = self.headers().await?;
        let url = format!("{API}/{endpoint}");
        params.push(("fields", fields.to_string()));
        params.push(("startRow", "1".to_string()));
        params.push(("rowCount", ROW_COUNT.to_string()));
        if let Some(w) = window {
            params.push(("datetime_beginning_ept", ept_filter(w)));
        }
        debug!(%url, ?params, "querying data miner");

        let mut pages = Vec::new();
        let mut page: Json = self
            .http
            .get_with_headers(&url, &params, &headers)
            .await?
            .json()?;
        loop {
            if let Some(errors) = page.get("errors") {
                return Err(UpstreamError::Api {
                    url: url.clone(),
                    message: errors.to_string(),
                }
                .into());
            }
            if page.get("totalRows").and_then(Json::as_u64) == Some(0) {
                let span = window.map_or_else(|| "current".to_string(), ToString::to_string);
                return Err(Error::no_data(dataset, span));
            }
            let next = next_link(&page);
            pages.push(page);
            let Some(next) = next else { break };
            page = self
                .http
                .get_with_headers(&next, NO_QUERY, &headers)
                .await?
                .json()?;
        }
        let fields: Vec<&str> = fields.split(',').map(str::trim).collect();
        Ok(shape_items(&pages, &fields, window)?)
    }
}

fn next_link(page: &Json) -> Option<String> {
    page.get("links")?
        .as_array()?
        .iter()
        .find(|l| l.get("rel").and_then(Json::as_str) == Some("next"))
        .and_then(|l| l.get("href"))
        .and_then(Json::as_str)
        .map(str::to_string)
}

#[async_trait]
impl SourceAdapter for Pjm {
    fn operator(&self) -> Operator {
        Operator::Pjm
    }

    fn lmp_markets(&self) -> &'static [Market] {
        &MARKETS
    }

    fn default_locations(&self, _market: Market) -> LocationFilter {
        LocationFilter::only(HUB_NODE_IDS)
    }

    fn location_types(&self) -> &'static [&'static str] {
        &LOCATION_TYPES
    }

    fn range_plan(&self, query: &Query, _window: &Window, now: DateTime<Utc>) -> RangePlan {
        match query.dataset {
            Dataset::FuelMix | Dataset::Supply => RangePlan::every(Frequency::Days(nonzero!(365u32))),
            Dataset::Load => RangePlan::every(Frequency::Days(nonzero!(30u32))),
            Dataset::Lmp => {
                let plan = RangePlan::every(Frequency::YearStart);
                match query
                    .market
                    .and_then(LmpFeed::for_market)
                    .and_then(|f| f.archive_date(now).ok())
                {
                    Some(archive) => plan.with_boundary(archive),
                    None => plan,
                }
            }
            _ => RangePlan::single(),
        }
    }

    fn native_interval(&self, query: &Query) -> Option<Duration> {
        match query.dataset {
            Dataset::FuelMix | Dataset::Supply | Dataset::LoadForecast => Some(Duration::hours(1)),
            Dataset::Load => Some(Duration::minutes(5)),
            Dataset::Lmp => query.market.map(|m| Duration::minutes(m.interval_minutes())),
            Dataset::InterconnectionQueue => None,
        }
    }

    async fn fuel_mix(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        let window = span.resolve(TZ, now)?;
        let params = vec![("sort", "datetime_beginning_utc".to_string()), ("order", "Asc".to_string())];
        let raw = self
            .data_miner(
                Dataset::FuelMix,
                "gen_by_fuel",
                "datetime_beginning_utc,fuel_type,is_renewable,mw",
                params,
                Some(&window),
            )
            .await?;
        let mix = shape_fuel_mix(&raw)?;
        Ok(match span {
            Span::Latest => last_row(&mix),
            Span::Window(_) => mix,
        })
    }

    async fn load(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        let window = span.resolve(TZ, now)?;
        let params = vec![
            ("order", "Asc".to_string()),
            ("sort", "datetime_beginning_utc".to_string()),
            ("isActiveMetadata", "true".to_string()),
            ("area", "PJM RTO".to_string()),
        ];
        let raw = self
            .data_miner(
                Dataset::Load,
                "inst_load",
                "area,datetime_beginning_utc,instantaneous_load",
                params,
                Some(&window),
            )
            .await?;
        let load = shape_load(raw)?;
        Ok(match span {
            Span::Latest => last_row(&load),
            Span::Window(_) => load,
        })
    }

    async fn load_forecast(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        if let Some(w) = span.window() {
            if !super::is_current_day(w.start.date_naive(), TZ, now) {
                return Err(Error::not_supported(Operator::Pjm, "load forecast before today"));
            }
        }
        let raw = self
            .data_miner(
                Dataset::LoadForecast,
                "load_frcstd_7_day",
                "evaluated_at_datetime_utc,forecast_area,forecast_datetime_beginning_utc,forecast_load_mw",
                vec![("forecast_area", "RTO_COMBINED".to_string())],
                None,
            )
            .await?;
        Ok(shape_load_forecast(raw)?)
    }

    async fn lmp(&self, query: &Query, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        let market = query
            .market
            .ok_or_else(|| Error::InvalidRequest("lmp requires a market".into()))?;
        let feed = LmpFeed::for_market(market)
            .ok_or_else(|| Error::not_supported(Operator::Pjm, format!("market {market}")))?;
        if matches!(span, Span::Latest) && market == Market::RealTimeHourly {
            return Err(Error::not_supported(Operator::Pjm, "latest real-time hourly prices"));
        }
        let window = span.resolve(TZ, now)?;

        let mut params = Vec::new();
        let location_type = query.location_type.as_deref();
        if let Some(kind) = location_type {
            if market != Market::RealTime5Min {
                params.push(("type", format!("*{kind}*")));
            }
        }
        let locations = match location_type {
            Some(_) => query.locations.clone().unwrap_or(LocationFilter::All),
            None => query.locations_or(|| self.default_locations(market)),
        };
        if window.start >= feed.archive_date(now)? {
            if let LocationFilter::Only(ids) = &locations {
                let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
                params.push(("pnode_id", ids.join(";")));
            }
        } else if locations != LocationFilter::All {
            debug!("window predates the archive date, filtering locations locally");
        }

        let raw = self
            .data_miner(Dataset::Lmp, feed.endpoint, &feed.fields(), params, Some(&window))
            .await?;
        let table = shape_lmp(raw, &feed, market)?;
        Ok(match span {
            Span::Latest => latest_per_location(&table)?,
            Span::Window(_) => table,
        })
    }
}
