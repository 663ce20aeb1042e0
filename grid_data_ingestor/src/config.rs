//! Ingestor configuration.
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! [http]
//! timeout_secs = 30
//! max_attempts = 3
//! backoff_ms = 5000
//! requests_per_second = 5
//! user_agent = "grid-data/0.1.0"
//!
//! [pjm]
//! api_key_env = "PJM_API_KEY"
//! ```

use std::{num::NonZeroU32, path::Path, time::Duration};

use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use shared_utils::config::{ConfigError, load_toml_path, load_toml_str};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct IngestorConfig {
    /// HTTP client settings shared by every adapter.
    pub http: HttpConfig,
    /// PJM Data Miner settings.
    pub pjm: PjmConfig,
}

impl IngestorConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        load_toml_str(text)
    }

    /// Read configuration from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_toml_path(path)
    }
}

/// Retry, timeout and rate-limit settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Attempts per request, including the first.
    pub max_attempts: NonZeroU32,
    /// Fixed wait between attempts.
    pub backoff_ms: u64,
    /// Process-wide request cap.
    pub requests_per_second: NonZeroU32,
    /// `User-Agent` header.
    pub user_agent: String,
}

impl HttpConfig {
    /// [`Self::timeout_secs`] as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// [`Self::backoff_ms`] as a duration.
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: nonzero!(3u32),
            backoff_ms: 5_000,
            requests_per_second: nonzero!(5u32),
            user_agent: concat!("grid-data/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// PJM Data Miner settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct PjmConfig {
    /// Environment variable holding the subscription key.
    pub api_key_env: String,
}

impl Default for PjmConfig {
    fn default() -> Self {
        Self {
            api_key_env: "PJM_API_KEY".to_string(),
        }
    }
}
