//! Canonical column names, the schemas built from them, and validated rename
//! tables.
//!
//! Every operator report is renamed into these names through a [`ColumnMap`].
//! A map is checked against its [`Schema`] when it is built, so a typo in a
//! static rename table fails the first time the adapter is used rather than
//! producing a column nobody asked for.

use std::fmt;

use crate::{error::SchemaError, table::Table};

/// Instant the row describes; always equal to [`INTERVAL_START`].
pub const TIME: &str = "Time";
/// Inclusive start of the interval.
pub const INTERVAL_START: &str = "Interval Start";
/// Exclusive end of the interval.
pub const INTERVAL_END: &str = "Interval End";
/// Total system load in MW.
pub const LOAD: &str = "Load";
/// Forecast load in MW.
pub const LOAD_FORECAST: &str = "Load Forecast";
/// When a forecast was published.
pub const FORECAST_TIME: &str = "Forecast Time";
/// Sum of all generation in MW.
pub const SUPPLY: &str = "Supply";
/// Market the price belongs to.
pub const MARKET: &str = "Market";
/// Operator-native pricing location id.
pub const LOCATION: &str = "Location";
/// Location taxonomy entry.
pub const LOCATION_TYPE: &str = "Location Type";
/// Human readable location name, where the operator provides one.
pub const LOCATION_NAME: &str = "Location Name";
/// Locational marginal price in $/MWh.
pub const LMP: &str = "LMP";
/// Energy component of the LMP.
pub const ENERGY: &str = "Energy";
/// Congestion component of the LMP.
pub const CONGESTION: &str = "Congestion";
/// Loss component of the LMP.
pub const LOSS: &str = "Loss";

/// Leading interval columns of every time-series table.
pub const INTERVAL_COLUMNS: [&str; 3] = [TIME, INTERVAL_START, INTERVAL_END];

/// Columns of the LMP schema in output order.
pub const LMP_COLUMNS: [&str; 10] = [
    TIME,
    INTERVAL_START,
    INTERVAL_END,
    MARKET,
    LOCATION,
    LOCATION_TYPE,
    LMP,
    ENERGY,
    CONGESTION,
    LOSS,
];

/// Columns of the interconnection queue schema in output order.
pub const QUEUE_COLUMNS: [&str; 17] = [
    "Queue ID",
    "Project Name",
    "Interconnecting Entity",
    "County",
    "State",
    "Interconnection Location",
    "Transmission Owner",
    "Generation Type",
    "Capacity (MW)",
    "Summer Capacity (MW)",
    "Winter Capacity (MW)",
    "Queue Date",
    "Status",
    "Proposed Completion Date",
    "Withdrawn Date",
    "Withdrawal Comment",
    "Actual Completion Date",
];

/// A canonical table shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schema {
    /// Generation by fuel; fuel columns are operator specific.
    FuelMix,
    /// Actual load, optionally followed by zone columns.
    Load,
    /// Load forecast, optionally followed by zone columns.
    LoadForecast,
    /// Total supply.
    Supply,
    /// Locational marginal prices.
    Lmp,
    /// Interconnection queue projects.
    InterconnectionQueue,
}

impl Schema {
    /// Columns that must appear, in this order, at the front of the table.
    pub fn required(&self) -> &'static [&'static str] {
        match self {
            Schema::FuelMix => &INTERVAL_COLUMNS,
            Schema::Load => &[TIME, INTERVAL_START, INTERVAL_END, LOAD],
            Schema::LoadForecast => &[TIME, INTERVAL_START, INTERVAL_END, FORECAST_TIME, LOAD_FORECAST],
            Schema::Supply => &[TIME, INTERVAL_START, INTERVAL_END, SUPPLY],
            Schema::Lmp => &LMP_COLUMNS,
            Schema::InterconnectionQueue => &QUEUE_COLUMNS,
        }
    }

    /// Canonical columns that may appear after the required ones.
    pub fn optional(&self) -> &'static [&'static str] {
        match self {
            Schema::Lmp => &[LOCATION_NAME],
            _ => &[],
        }
    }

    /// Whether operator-specific columns may follow the required ones
    /// (fuel names, zones, queue extras).
    pub fn is_open(&self) -> bool {
        !matches!(self, Schema::Supply)
    }

    /// Whether a rename may target `name`.
    pub fn accepts(&self, name: &str) -> bool {
        self.is_open() || self.required().contains(&name) || self.optional().contains(&name)
    }

    /// Check that `table` has this shape.
    pub fn validate(&self, table: &Table) -> Result<(), SchemaError> {
        let required = self.required();
        for (i, name) in required.iter().enumerate() {
            match table.columns().get(i) {
                Some(c) if c == name => {}
                _ => return Err(SchemaError::missing(*name)),
            }
        }
        if !self.is_open() {
            if let Some(extra) = table
                .columns()
                .iter()
                .skip(required.len())
                .find(|c| !self.optional().contains(&c.as_str()))
            {
                return Err(SchemaError::UnknownCanonicalColumn {
                    schema: self.name(),
                    target: extra.clone(),
                });
            }
        }
        Ok(())
    }

    /// Short name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Schema::FuelMix => "fuel mix",
            Schema::Load => "load",
            Schema::LoadForecast => "load forecast",
            Schema::Supply => "supply",
            Schema::Lmp => "lmp",
            Schema::InterconnectionQueue => "interconnection queue",
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated rename table from operator-native to canonical column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    schema: Schema,
    pairs: Vec<(String, String)>,
}

impl ColumnMap {
    /// Build a map for `schema` from `(source, target)` pairs.
    ///
    /// Fails when a source or target appears twice, or when a target is not
    /// a column `schema` can hold.
    pub fn new(schema: Schema, pairs: &[(&str, &str)]) -> Result<Self, SchemaError> {
        let mut out: Vec<(String, String)> = Vec::with_capacity(pairs.len());
        for (source, target) in pairs {
            if out.iter().any(|(s, _)| s == source) {
                return Err(SchemaError::DuplicateMapping((*source).to_string()));
            }
            if out.iter().any(|(_, t)| t == target) {
                return Err(SchemaError::DuplicateMapping((*target).to_string()));
            }
            if !schema.accepts(target) {
                return Err(SchemaError::UnknownCanonicalColumn {
                    schema: schema.name(),
                    target: (*target).to_string(),
                });
            }
            out.push(((*source).to_string(), (*target).to_string()));
        }
        Ok(Self { schema, pairs: out })
    }

    /// Schema the map was validated against.
    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Source column names.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(s, _)| s.as_str())
    }

    /// Target column names.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, t)| t.as_str())
    }

    /// Canonical name for `source`, if mapped.
    pub fn target_of(&self, source: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(s, _)| s == source)
            .map(|(_, t)| t.as_str())
    }

    /// Rename every mapped column of `table`.
    ///
    /// A source column missing from `table` means the report layout changed,
    /// which is an error rather than a silently missing column.
    pub fn apply(&self, table: &mut Table) -> Result<(), SchemaError> {
        for (source, _) in &self.pairs {
            table.require(source)?;
        }
        // two passes so swaps like a -> b, b -> a do not collide
        let mut staged = Vec::with_capacity(self.pairs.len());
        for (i, (source, target)) in self.pairs.iter().enumerate() {
            if source == target {
                continue;
            }
            let tmp = format!("\u{0}{i}");
            table.rename_column(source, &tmp)?;
            staged.push((tmp, target));
        }
        for (tmp, target) in staged {
            table.rename_column(&tmp, target)?;
        }
        Ok(())
    }
}
