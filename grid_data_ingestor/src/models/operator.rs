use std::{fmt, str::FromStr};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The grid operators this crate can read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    /// California ISO.
    Caiso,
    /// Electric Reliability Council of Texas.
    Ercot,
    /// ISO New England.
    Isone,
    /// Midcontinent ISO.
    Miso,
    /// New York ISO.
    Nyiso,
    /// PJM Interconnection.
    Pjm,
    /// Southwest Power Pool.
    Spp,
}

/// An operator name that is not one of [`Operator::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operator `{0}`")]
pub struct OperatorParseError(pub String);

impl Operator {
    /// Every supported operator.
    pub const ALL: [Operator; 7] = [
        Operator::Caiso,
        Operator::Ercot,
        Operator::Isone,
        Operator::Miso,
        Operator::Nyiso,
        Operator::Pjm,
        Operator::Spp,
    ];

    /// Short upper-case name, as used in dump file names.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Caiso => "CAISO",
            Operator::Ercot => "ERCOT",
            Operator::Isone => "ISONE",
            Operator::Miso => "MISO",
            Operator::Nyiso => "NYISO",
            Operator::Pjm => "PJM",
            Operator::Spp => "SPP",
        }
    }

    /// Zone the operator publishes its market times in.
    ///
    /// MISO runs on Eastern Standard Time all year.
    pub fn tz(&self) -> Tz {
        match self {
            Operator::Caiso => chrono_tz::America::Los_Angeles,
            Operator::Ercot | Operator::Spp => chrono_tz::America::Chicago,
            Operator::Isone | Operator::Nyiso | Operator::Pjm => chrono_tz::America::New_York,
            Operator::Miso => chrono_tz::EST,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = OperatorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', '_', ' '], "");
        Operator::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| OperatorParseError(s.to_string()))
    }
}
