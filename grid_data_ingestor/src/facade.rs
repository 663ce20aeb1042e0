//! One uniform surface over every operator.
//!
//! A call resolves its [`TimeSelector`] against the operator's clock, cuts
//! the window into the adapter's chunks, fetches them in order and merges
//! the parts: gap check, last-fetched-wins dedup, then restriction to the
//! requested window. `Latest` is a single adapter call with the operator's
//! own notion of "most recent".

use std::{fmt, path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use grid_schema::{
    LocationFilter, Market, Schema, Table, TimeSelector, Window,
    columns::{FORECAST_TIME, INTERVAL_COLUMNS, SUPPLY},
    normalize::{
        concat_checked, dedup_keys, dedup_last_wins, filter_location_type, filter_locations,
        restrict_to_window, sum_columns,
    },
    range::{resolve_window, split_window},
};
use tracing::{debug, info, warn};

use crate::{
    config::IngestorConfig,
    errors::Error,
    io::sink::{ChunkInfo, CsvSink, DataSink},
    models::{
        operator::Operator,
        request::{Dataset, ErrorPolicy, Query, RequestOptions},
    },
    providers::{Adapter, SourceAdapter, Span},
};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Canonical electricity market data for one operator.
///
/// ```no_run
/// # async fn run() -> Result<(), grid_data_ingestor::errors::Error> {
/// use grid_data_ingestor::{
///     config::IngestorConfig, facade::GridStatus, models::operator::Operator,
///     models::request::RequestOptions,
/// };
/// use grid_schema::TimeSelector;
///
/// let caiso = GridStatus::new(Operator::Caiso, &IngestorConfig::default())?;
/// let load = caiso
///     .get_load(&TimeSelector::Today, &RequestOptions::default())
///     .await?;
/// println!("{} rows", load.len());
/// # Ok(())
/// # }
/// ```
pub struct GridStatus<A: SourceAdapter = Adapter> {
    adapter: A,
    clock: Clock,
}

impl<A: SourceAdapter + fmt::Debug> fmt::Debug for GridStatus<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridStatus")
            .field("adapter", &self.adapter)
            .finish_non_exhaustive()
    }
}

impl GridStatus<Adapter> {
    /// Facade for `operator` with its own HTTP client.
    pub fn new(operator: Operator, config: &IngestorConfig) -> Result<Self, Error> {
        Ok(Self::with_adapter(Adapter::new(operator, config)?))
    }

    /// Facade for `operator`, configured from a TOML file.
    pub fn from_config_path(operator: Operator, path: impl AsRef<Path>) -> Result<Self, Error> {
        let config = IngestorConfig::from_path(path)?;
        Self::new(operator, &config)
    }
}

impl<A: SourceAdapter> GridStatus<A> {
    /// Facade over an already built adapter, on the system clock.
    pub fn with_adapter(adapter: A) -> Self {
        Self {
            adapter,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock that `Today`, `Latest` and open ranges resolve against.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Operator behind this facade.
    pub fn operator(&self) -> Operator {
        self.adapter.operator()
    }

    /// The adapter this facade drives.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Generation by fuel.
    pub async fn get_fuel_mix(
        &self,
        when: &TimeSelector,
        options: &RequestOptions,
    ) -> Result<Table, Error> {
        self.collect(&Query::new(Dataset::FuelMix), when, options)
            .await
    }

    /// Actual load.
    pub async fn get_load(
        &self,
        when: &TimeSelector,
        options: &RequestOptions,
    ) -> Result<Table, Error> {
        self.collect(&Query::new(Dataset::Load), when, options).await
    }

    /// Load forecast published during the selected span.
    pub async fn get_load_forecast(
        &self,
        when: &TimeSelector,
        options: &RequestOptions,
    ) -> Result<Table, Error> {
        self.collect(&Query::new(Dataset::LoadForecast), when, options)
            .await
    }

    /// Total supply: the row-wise sum of the fuel mix.
    pub async fn get_supply(
        &self,
        when: &TimeSelector,
        options: &RequestOptions,
    ) -> Result<Table, Error> {
        let mix = self
            .collect(&Query::new(Dataset::Supply), when, options)
            .await?;
        Ok(supply_from_fuel_mix(&mix)?)
    }

    /// Prices for `market`.
    ///
    /// `locations` defaults to the operator's default set, or to every
    /// location when a `location_type` is given. `location_type` is matched
    /// case-insensitively against the operator's taxonomy.
    pub async fn get_lmp(
        &self,
        when: &TimeSelector,
        market: Market,
        locations: Option<LocationFilter>,
        location_type: Option<&str>,
        options: &RequestOptions,
    ) -> Result<Table, Error> {
        let operator = self.operator();
        if !self.adapter.lmp_markets().contains(&market) {
            return Err(Error::not_supported(operator, format!("market {market}")));
        }
        let location_type = location_type
            .map(|t| canonical_location_type(operator, self.adapter.location_types(), t))
            .transpose()?;
        let keep = match (&locations, &location_type) {
            (Some(filter), _) => filter.clone(),
            (None, Some(_)) => LocationFilter::All,
            (None, None) => self.adapter.default_locations(market),
        };

        let query = Query::lmp(market, locations, location_type.clone());
        let mut table = self.collect(&query, when, options).await?;
        filter_locations(&mut table, &keep)?;
        if let Some(kind) = &location_type {
            filter_location_type(&mut table, kind)?;
        }
        Ok(table)
    }

    /// The operator's current interconnection queue.
    pub async fn get_interconnection_queue(&self) -> Result<Table, Error> {
        let table = self.adapter.interconnection_queue().await?;
        Schema::InterconnectionQueue.validate(&table)?;
        Ok(table)
    }

    async fn collect(
        &self,
        query: &Query,
        when: &TimeSelector,
        options: &RequestOptions,
    ) -> Result<Table, Error> {
        let now = (self.clock)();
        let operator = self.operator();
        let Some(window) = resolve_window(when, operator.tz(), now)? else {
            let table = self.adapter.fetch(query, &Span::Latest, now).await?;
            self.dump(options, query, None, &table).await?;
            query.dataset.fetched_schema().validate(&table)?;
            return Ok(table);
        };

        let plan = self.adapter.range_plan(query, &window, now);
        let chunks = split_window(&window, &plan);
        info!(
            operator = operator.name(),
            dataset = %query.dataset,
            %window,
            chunks = chunks.len(),
            "fetching"
        );

        let mut parts = Vec::with_capacity(chunks.len());
        let mut skipped = 0usize;
        for chunk in &chunks {
            debug!(chunk = %chunk, "fetching chunk");
            match self.adapter.fetch(query, &Span::Window(*chunk), now).await {
                Ok(table) => {
                    self.dump(options, query, Some(chunk), &table).await?;
                    parts.push(table);
                }
                Err(e) if options.error_policy == ErrorPolicy::Ignore && e.is_skippable() => {
                    warn!(chunk = %chunk, error = %e, "skipping chunk");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        // a skipped chunk leaves a hole the gap check would report
        let max_gap = if skipped == 0 {
            self.adapter.native_interval(query)
        } else {
            None
        };
        let mut table = concat_checked(parts, max_gap)?;
        if table.is_empty() {
            return Err(Error::no_data(query.dataset, window.to_string()));
        }
        let mut keys = dedup_keys(&table);
        if table.has_column(FORECAST_TIME) {
            keys.push(FORECAST_TIME);
        }
        dedup_last_wins(&mut table, &keys)?;
        restrict(&mut table, query.dataset, &window)?;
        if table.is_empty() {
            return Err(Error::no_data(query.dataset, window.to_string()));
        }
        query.dataset.fetched_schema().validate(&table)?;
        Ok(table)
    }

    async fn dump(
        &self,
        options: &RequestOptions,
        query: &Query,
        window: Option<&Window>,
        table: &Table,
    ) -> Result<(), Error> {
        let Some(dir) = &options.save_to else {
            return Ok(());
        };
        let info = ChunkInfo {
            operator: self.operator(),
            dataset: query.dataset,
            window,
        };
        CsvSink::new(dir).write(info, table).await?;
        Ok(())
    }
}

/// Forecasts are kept by when they were made, everything else by interval.
fn restrict(table: &mut Table, dataset: Dataset, window: &Window) -> Result<(), Error> {
    if dataset == Dataset::LoadForecast && table.has_column(FORECAST_TIME) {
        let i = table.require(FORECAST_TIME)?;
        table.retain_rows(|r| r.values()[i].as_timestamp().is_some_and(|t| window.contains(&t)))?;
        return Ok(());
    }
    Ok(restrict_to_window(table, window)?)
}

fn canonical_location_type(
    operator: Operator,
    known: &'static [&'static str],
    requested: &str,
) -> Result<String, Error> {
    if known.is_empty() {
        return Ok(requested.to_string());
    }
    known
        .iter()
        .find(|k| k.eq_ignore_ascii_case(requested))
        .map(|k| (*k).to_string())
        .ok_or_else(|| {
            Error::InvalidRequest(format!(
                "{} location type must be one of {}, got `{requested}`",
                operator.name(),
                known.join(", ")
            ))
        })
}

/// `Time, Interval Start, Interval End, Supply` from a fuel mix table.
pub fn supply_from_fuel_mix(mix: &Table) -> Result<Table, grid_schema::SchemaError> {
    let columns = mix.columns();
    let fuels: Vec<&str> = columns
        .iter()
        .map(String::as_str)
        .filter(|c| !INTERVAL_COLUMNS.contains(c))
        .collect();
    let total = sum_columns(mix, &fuels)?;
    let mut supply = mix.select(&INTERVAL_COLUMNS)?;
    supply.push_column(SUPPLY, total)?;
    Schema::Supply.validate(&supply)?;
    Ok(supply)
}
