//! Error types shared by the schema, range and normalization layers.

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Failure to map a local civil time onto a single instant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DstError {
    /// The wall time occurs twice (fall-back) and nothing selected one of them.
    #[error("local time {local} is ambiguous in {tz}")]
    Ambiguous {
        /// The offending wall time.
        local: NaiveDateTime,
        /// Zone the wall time was interpreted in.
        tz: Tz,
    },

    /// The wall time is skipped (spring-forward).
    #[error("local time {local} does not exist in {tz}")]
    Nonexistent {
        /// The offending wall time.
        local: NaiveDateTime,
        /// Zone the wall time was interpreted in.
        tz: Tz,
    },

    /// The IANA zone name could not be parsed.
    #[error("unknown time zone `{0}`")]
    UnknownZone(String),
}

/// The operator's report layout no longer matches what the normalizer expects.
///
/// These errors are fatal for a request: they are surfaced immediately and the
/// offending payload is never coerced into the canonical shape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// A column the normalizer relies on is absent.
    #[error("missing column `{column}`")]
    MissingColumn {
        /// Name of the absent column.
        column: String,
    },

    /// A column name would appear twice in one table.
    #[error("duplicate column `{0}`")]
    DuplicateColumn(String),

    /// A rename table targets a column that the canonical schema does not define.
    #[error("column map targets `{target}`, which is not part of the {schema} schema")]
    UnknownCanonicalColumn {
        /// Name of the canonical schema the map was built for.
        schema: &'static str,
        /// The rejected target name.
        target: String,
    },

    /// A rename table lists the same source or target twice.
    #[error("column map lists `{0}` more than once")]
    DuplicateMapping(String),

    /// A row does not have one value per column.
    #[error("row {row} has {got} values, expected {expected}")]
    RowWidth {
        /// Zero-based row position.
        row: usize,
        /// Number of values in the row.
        got: usize,
        /// Number of columns in the table.
        expected: usize,
    },

    /// A cell holds a value of the wrong kind for the operation.
    #[error("column `{column}` row {row}: {message}")]
    InvalidValue {
        /// Column of the offending cell.
        column: String,
        /// Zero-based row position.
        row: usize,
        /// What was expected.
        message: String,
    },

    /// A raw payload could not be turned into a table.
    #[error("failed to parse report {report}: {message}")]
    Parse {
        /// The report (URL or file name) that failed.
        report: String,
        /// Parser message.
        message: String,
    },

    /// The frame engine rejected an operation on a table.
    #[error("frame operation failed: {0}")]
    Frame(String),

    /// Consecutive report chunks leave a hole larger than one native interval.
    #[error("gap between {previous_end} and {next_start} exceeds one {interval_minutes} minute interval")]
    Gap {
        /// End of the last interval of the earlier chunk (RFC 3339).
        previous_end: String,
        /// Start of the first interval of the later chunk (RFC 3339).
        next_start: String,
        /// Native interval length in minutes.
        interval_minutes: i64,
    },

    /// An interval whose start is not strictly before its end.
    #[error("row {row}: interval start {start} is not before end {end}")]
    EmptyInterval {
        /// Zero-based row position.
        row: usize,
        /// Interval start (RFC 3339).
        start: String,
        /// Interval end (RFC 3339).
        end: String,
    },

    /// A timestamp could not be localized.
    #[error(transparent)]
    Dst(#[from] DstError),
}

impl From<PolarsError> for SchemaError {
    fn from(e: PolarsError) -> Self {
        SchemaError::Frame(e.to_string())
    }
}

impl SchemaError {
    /// Shorthand for [`SchemaError::Parse`].
    pub fn parse(report: impl Into<String>, message: impl ToString) -> Self {
        SchemaError::Parse {
            report: report.into(),
            message: message.to_string(),
        }
    }

    /// Shorthand for [`SchemaError::MissingColumn`].
    pub fn missing(column: impl Into<String>) -> Self {
        SchemaError::MissingColumn {
            column: column.into(),
        }
    }
}
