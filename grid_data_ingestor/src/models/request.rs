use std::{fmt, path::PathBuf};

use grid_schema::{LocationFilter, Market, Schema};
use serde::{Deserialize, Serialize};

/// A logical dataset offered through the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// Generation by fuel.
    FuelMix,
    /// Actual load.
    Load,
    /// Load forecast.
    LoadForecast,
    /// Total supply, derived from the fuel mix.
    Supply,
    /// Locational marginal prices.
    Lmp,
    /// Interconnection queue.
    InterconnectionQueue,
}

impl Dataset {
    /// Facade method name, used in dump file names.
    pub fn method(&self) -> &'static str {
        match self {
            Dataset::FuelMix => "get_fuel_mix",
            Dataset::Load => "get_load",
            Dataset::LoadForecast => "get_load_forecast",
            Dataset::Supply => "get_supply",
            Dataset::Lmp => "get_lmp",
            Dataset::InterconnectionQueue => "get_interconnection_queue",
        }
    }

    /// Shape of the tables an adapter returns for this dataset. Supply is
    /// fetched as a fuel mix and summed afterwards.
    pub fn fetched_schema(&self) -> Schema {
        match self {
            Dataset::FuelMix | Dataset::Supply => Schema::FuelMix,
            Dataset::Load => Schema::Load,
            Dataset::LoadForecast => Schema::LoadForecast,
            Dataset::Lmp => Schema::Lmp,
            Dataset::InterconnectionQueue => Schema::InterconnectionQueue,
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dataset::FuelMix => "fuel mix",
            Dataset::Load => "load",
            Dataset::LoadForecast => "load forecast",
            Dataset::Supply => "supply",
            Dataset::Lmp => "lmp",
            Dataset::InterconnectionQueue => "interconnection queue",
        };
        f.write_str(name)
    }
}

/// What happens when one chunk of a multi-chunk request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Fail the whole request.
    #[default]
    Raise,
    /// Log and skip chunks that failed with no data or an upstream error.
    Ignore,
}

/// What to fetch, independent of the time span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Dataset requested.
    pub dataset: Dataset,
    /// Market, for LMP requests.
    pub market: Option<Market>,
    /// Locations, for LMP requests. `None` uses the operator's default set.
    pub locations: Option<LocationFilter>,
    /// Location type filter, for LMP requests.
    pub location_type: Option<String>,
}

impl Query {
    /// Query for a dataset with no market or location parameters.
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            market: None,
            locations: None,
            location_type: None,
        }
    }

    /// LMP query.
    pub fn lmp(market: Market, locations: Option<LocationFilter>, location_type: Option<String>) -> Self {
        Self {
            dataset: Dataset::Lmp,
            market: Some(market),
            locations,
            location_type,
        }
    }

    /// Requested locations, falling back to `default` when none were given.
    pub fn locations_or(&self, default: impl FnOnce() -> LocationFilter) -> LocationFilter {
        self.locations.clone().unwrap_or_else(default)
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Chunk failure handling.
    pub error_policy: ErrorPolicy,
    /// Directory to dump each fetched chunk into as CSV.
    pub save_to: Option<PathBuf>,
}

impl RequestOptions {
    /// Set the error policy.
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Dump every fetched chunk into `dir`.
    pub fn save_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_to = Some(dir.into());
        self
    }
}
