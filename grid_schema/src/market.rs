//! Market and queue-status enumerations.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The pricing run an LMP belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Market {
    /// Real-time, 5-minute intervals.
    #[serde(rename = "REAL_TIME_5_MIN")]
    RealTime5Min,
    /// Real-time, 15-minute intervals.
    #[serde(rename = "REAL_TIME_15_MIN")]
    RealTime15Min,
    /// Real-time, hourly intervals.
    RealTimeHourly,
    /// Day-ahead, hourly intervals.
    DayAheadHourly,
    /// Security-constrained economic dispatch runs (ERCOT).
    RealTimeSced,
}

/// Unknown market name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown market `{0}`")]
pub struct MarketParseError(pub String);

impl Market {
    /// Every market, in declaration order.
    pub const ALL: [Market; 5] = [
        Market::RealTime5Min,
        Market::RealTime15Min,
        Market::RealTimeHourly,
        Market::DayAheadHourly,
        Market::RealTimeSced,
    ];

    /// Canonical spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::RealTime5Min => "REAL_TIME_5_MIN",
            Market::RealTime15Min => "REAL_TIME_15_MIN",
            Market::RealTimeHourly => "REAL_TIME_HOURLY",
            Market::DayAheadHourly => "DAY_AHEAD_HOURLY",
            Market::RealTimeSced => "REAL_TIME_SCED",
        }
    }

    /// Native interval length in minutes. SCED runs are irregular and are
    /// floored onto a 5-minute grid.
    pub fn interval_minutes(&self) -> i64 {
        match self {
            Market::RealTime5Min | Market::RealTimeSced => 5,
            Market::RealTime15Min => 15,
            Market::RealTimeHourly | Market::DayAheadHourly => 60,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = MarketParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Market::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MarketParseError(s.to_string()))
    }
}

/// Normalized interconnection queue project status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueStatus {
    /// Still being studied or built.
    Active,
    /// Left the queue.
    Withdrawn,
    /// In commercial operation or fully executed.
    Completed,
}

impl QueueStatus {
    /// Display spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Active => "Active",
            QueueStatus::Withdrawn => "Withdrawn",
            QueueStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
