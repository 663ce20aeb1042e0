use grid_schema::{SchemaError, range::RangeError};
use shared_utils::config::ConfigError;
use thiserror::Error;

use crate::{
    io::sink::SinkError,
    models::{operator::Operator, request::Dataset},
    providers::ProviderInitError,
};

/// A failed HTTP exchange with an operator endpoint.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request never produced a response (DNS, connect, timeout, body read).
    #[error("request to {url} failed: {source}")]
    Request {
        /// Requested URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The endpoint answered with something other than the expected format.
    #[error("{url} returned {found}, expected {expected}")]
    ContentType {
        /// Requested URL.
        url: String,
        /// Expected media type.
        expected: &'static str,
        /// Media type received.
        found: String,
    },

    /// The endpoint reported an error in its payload.
    #[error("{url} reported an error: {message}")]
    Api {
        /// Requested URL.
        url: String,
        /// Message from the payload.
        message: String,
    },

    /// An archive or JSON body could not be decoded at all.
    #[error("could not decode {url}: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Decoder message.
        message: String,
    },
}

impl UpstreamError {
    /// Whether retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Request { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_body()
            }
            UpstreamError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Whether the endpoint said the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::Status { status: 404, .. })
    }
}

/// The unified error type for the `grid_data_ingestor` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested window exists but has no rows.
    #[error("no {dataset} data for {window}")]
    NoData {
        /// Dataset that was requested.
        dataset: Dataset,
        /// Human readable window or report description.
        window: String,
    },

    /// The operator's service failed or answered unexpectedly.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// The operator's report layout no longer matches the normalizer.
    #[error("schema mismatch: {0}")]
    Schema(#[from] SchemaError),

    /// The operator does not offer this dataset, market or selector.
    #[error("{operator} does not support {what}")]
    NotSupported {
        /// Operator that was asked.
        operator: Operator,
        /// What was asked for.
        what: String,
    },

    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A provider could not be constructed.
    #[error("initialization error: {0}")]
    Init(#[from] ProviderInitError),

    /// Writing a CSV dump failed.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

impl Error {
    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Upstream(e) if e.is_transient())
    }

    /// Whether `ErrorPolicy::Ignore` may skip a chunk that failed with this error.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Error::NoData { .. } | Error::Upstream(_))
    }

    /// Shorthand for [`Error::NotSupported`].
    pub fn not_supported(operator: Operator, what: impl Into<String>) -> Self {
        Error::NotSupported {
            operator,
            what: what.into(),
        }
    }

    /// Shorthand for [`Error::NoData`].
    pub fn no_data(dataset: Dataset, window: impl Into<String>) -> Self {
        Error::NoData {
            dataset,
            window: window.into(),
        }
    }
}

impl From<RangeError> for Error {
    fn from(err: RangeError) -> Self {
        match err {
            RangeError::Dst(e) => Error::Schema(SchemaError::Dst(e)),
            other => Error::InvalidRequest(other.to_string()),
        }
    }
}
