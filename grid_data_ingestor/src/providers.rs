//! Source adapters, one per grid operator.
//!
//! Every operator implements [`SourceAdapter`]: it knows its endpoints, how a
//! requested window is cut into report-sized chunks, and how to turn one
//! chunk's payload into a canonical table. Methods an operator does not offer
//! keep the default body, which reports [`Error::NotSupported`].
//!
//! The facade never deals with concrete adapters. It holds an [`Adapter`],
//! a closed enum over the seven operators, built from an [`Operator`].
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use chrono::{DateTime, Utc};
//! use grid_data_ingestor::{
//!     errors::Error,
//!     models::operator::Operator,
//!     providers::{SourceAdapter, Span},
//! };
//! use grid_schema::Table;
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl SourceAdapter for Offline {
//!     fn operator(&self) -> Operator {
//!         Operator::Caiso
//!     }
//!
//!     async fn load(&self, _span: &Span, _now: DateTime<Utc>) -> Result<Table, Error> {
//!         Ok(Table::default())
//!     }
//! }
//! ```

pub mod caiso;
pub mod ercot;
pub mod isone;
pub mod miso;
pub mod nyiso;
pub mod payload;
pub mod pjm;
pub mod spp;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use grid_schema::{LocationFilter, Market, RangePlan, Table, Window, range::RangeError};
use snafu::{Backtrace, Snafu};

use crate::{
    config::IngestorConfig,
    errors::Error,
    http::HttpClient,
    models::{
        operator::Operator,
        request::{Dataset, Query},
    },
};

/// The time span one adapter call covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    /// The operator's most recent publication.
    Latest,
    /// One chunk of a resolved request window.
    Window(Window),
}

impl Span {
    /// The chunk window, if any.
    pub fn window(&self) -> Option<&Window> {
        match self {
            Span::Latest => None,
            Span::Window(w) => Some(w),
        }
    }

    /// The chunk window, or the operator's current local day for `Latest`.
    pub fn resolve(&self, tz: Tz, now: DateTime<Utc>) -> Result<Window, RangeError> {
        match self {
            Span::Latest => Window::day(now.with_timezone(&tz).date_naive(), tz),
            Span::Window(w) => Ok(*w),
        }
    }
}

/// Whether `date` is the current local day in `tz`.
pub(crate) fn is_current_day(date: NaiveDate, tz: Tz, now: DateTime<Utc>) -> bool {
    now.with_timezone(&tz).date_naive() == date
}

/// One operator's endpoints and report layouts.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Operator this adapter reads from.
    fn operator(&self) -> Operator;

    /// Markets offered for LMP requests.
    fn lmp_markets(&self) -> &'static [Market] {
        &[]
    }

    /// Locations returned when an LMP request names none.
    fn default_locations(&self, _market: Market) -> LocationFilter {
        LocationFilter::All
    }

    /// Location types an LMP request may filter on. Empty means no check.
    fn location_types(&self) -> &'static [&'static str] {
        &[]
    }

    /// How a window for `query` is cut into chunks.
    fn range_plan(&self, _query: &Query, _window: &Window, _now: DateTime<Utc>) -> RangePlan {
        RangePlan::single()
    }

    /// Native interval of the dataset, used to detect gaps between chunks.
    /// `None` disables the check.
    fn native_interval(&self, _query: &Query) -> Option<Duration> {
        None
    }

    /// Generation by fuel.
    async fn fuel_mix(&self, _span: &Span, _now: DateTime<Utc>) -> Result<Table, Error> {
        Err(Error::not_supported(self.operator(), "fuel mix"))
    }

    /// Actual load.
    async fn load(&self, _span: &Span, _now: DateTime<Utc>) -> Result<Table, Error> {
        Err(Error::not_supported(self.operator(), "load"))
    }

    /// Load forecast.
    async fn load_forecast(&self, _span: &Span, _now: DateTime<Utc>) -> Result<Table, Error> {
        Err(Error::not_supported(self.operator(), "load forecast"))
    }

    /// Locational marginal prices for `query.market`.
    async fn lmp(&self, _query: &Query, _span: &Span, _now: DateTime<Utc>) -> Result<Table, Error> {
        Err(Error::not_supported(self.operator(), "lmp"))
    }

    /// Current interconnection queue.
    async fn interconnection_queue(&self) -> Result<Table, Error> {
        Err(Error::not_supported(self.operator(), "interconnection queue"))
    }

    /// Fetch one span of `query`. Supply is served from the fuel mix.
    async fn fetch(&self, query: &Query, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        match query.dataset {
            Dataset::FuelMix | Dataset::Supply => self.fuel_mix(span, now).await,
            Dataset::Load => self.load(span, now).await,
            Dataset::LoadForecast => self.load_forecast(span, now).await,
            Dataset::Lmp => self.lmp(query, span, now).await,
            Dataset::InterconnectionQueue => self.interconnection_queue().await,
        }
    }
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        /// reqwest's builder error.
        source: reqwest::Error,
        /// Where the build failed.
        backtrace: Backtrace,
    },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"))]
    InvalidApiKey {
        /// Header conversion error.
        source: reqwest::header::InvalidHeaderValue,
        /// Where the key was rejected.
        backtrace: Backtrace,
    },
}

/// The adapter for one operator.
#[derive(Debug)]
pub enum Adapter {
    /// California ISO.
    Caiso(caiso::Caiso),
    /// ERCOT.
    Ercot(ercot::Ercot),
    /// ISO New England.
    Isone(isone::Isone),
    /// Midcontinent ISO.
    Miso(miso::Miso),
    /// New York ISO.
    Nyiso(nyiso::Nyiso),
    /// PJM.
    Pjm(pjm::Pjm),
    /// Southwest Power Pool.
    Spp(spp::Spp),
}

impl Adapter {
    /// Build the adapter for `operator` with its own HTTP client.
    pub fn new(operator: Operator, config: &IngestorConfig) -> Result<Self, ProviderInitError> {
        let http = HttpClient::new(&config.http)?;
        Self::with_client(operator, http, config)
    }

    /// Build the adapter for `operator` on a shared HTTP client.
    pub fn with_client(
        operator: Operator,
        http: HttpClient,
        config: &IngestorConfig,
    ) -> Result<Self, ProviderInitError> {
        Ok(match operator {
            Operator::Caiso => Adapter::Caiso(caiso::Caiso::new(http)),
            Operator::Ercot => Adapter::Ercot(ercot::Ercot::new(http)),
            Operator::Isone => Adapter::Isone(isone::Isone::new(http)),
            Operator::Miso => Adapter::Miso(miso::Miso::new(http)),
            Operator::Nyiso => Adapter::Nyiso(nyiso::Nyiso::new(http)),
            Operator::Pjm => Adapter::Pjm(pjm::Pjm::new(http, &config.pjm)?),
            Operator::Spp => Adapter::Spp(spp::Spp::new(http)),
        })
    }

    fn inner(&self) -> &dyn SourceAdapter {
        match self {
            Adapter::Caiso(a) => a,
            Adapter::Ercot(a) => a,
            Adapter::Isone(a) => a,
            Adapter::Miso(a) => a,
            Adapter::Nyiso(a) => a,
            Adapter::Pjm(a) => a,
            Adapter::Spp(a) => a,
        }
    }
}

#[async_trait]
impl SourceAdapter for Adapter {
    fn operator(&self) -> Operator {
        self.inner().operator()
    }

    fn lmp_markets(&self) -> &'static [Market] {
        self.inner().lmp_markets()
    }

    fn default_locations(&self, market: Market) -> LocationFilter {
        self.inner().default_locations(market)
    }

    fn location_types(&self) -> &'static [&'static str] {
        self.inner().location_types()
    }

    fn range_plan(&self, query: &Query, window: &Window, now: DateTime<Utc>) -> RangePlan {
        self.inner().range_plan(query, window, now)
    }

    fn native_interval(&self, query: &Query) -> Option<Duration> {
        self.inner().native_interval(query)
    }

    async fn fuel_mix(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        self.inner().fuel_mix(span, now).await
    }

    async fn load(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        self.inner().load(span, now).await
    }

    async fn load_forecast(&self, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        self.inner().load_forecast(span, now).await
    }

    async fn lmp(&self, query: &Query, span: &Span, now: DateTime<Utc>) -> Result<Table, Error> {
        self.inner().lmp(query, span, now).await
    }

    async fn interconnection_queue(&self) -> Result<Table, Error> {
        self.inner().interconnection_queue().await
    }
}
