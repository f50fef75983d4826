//! Engine configuration.
//!
//! One serde struct covering the knobs a client build ships with: the
//! backend base URL, timing for connectivity probing, and the retry
//! policy for queue reconciliation. Every field has a sensible default
//! so `EngineConfig::default()` is a working configuration apart from
//! the base URL.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connectivity::MonitorOptions;
use crate::error::{Error, Result};
use crate::sync::RetryPolicy;
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
const DEFAULT_ONLINE_DEBOUNCE_SECS: u64 = 3;
const DEFAULT_DRAIN_INTERVAL_SECS: u64 = 30;
const DEFAULT_RETRY_BASE_DELAY_SECS: u64 = 5;
const DEFAULT_RETRY_MAX_DELAY_SECS: u64 = 300;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 8;

/// Build-provisioned engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Backend base URL, e.g. `https://api.example.com/api`
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Per-request HTTP timeout, seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Connectivity probe interval, seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// How long reachability must hold before going online, seconds
    #[serde(default = "default_online_debounce_secs")]
    pub online_debounce_secs: u64,
    /// Periodic drain interval while online, seconds
    #[serde(default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,
    /// First retry delay for a failed queue item, seconds
    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,
    /// Retry backoff cap, seconds
    #[serde(default = "default_retry_max_delay_secs")]
    pub retry_max_delay_secs: u64,
    /// Attempts before a queue item is abandoned
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    /// Local store path override; callers fall back to the platform data
    /// directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            online_debounce_secs: DEFAULT_ONLINE_DEBOUNCE_SECS,
            drain_interval_secs: DEFAULT_DRAIN_INTERVAL_SECS,
            retry_base_delay_secs: DEFAULT_RETRY_BASE_DELAY_SECS,
            retry_max_delay_secs: DEFAULT_RETRY_MAX_DELAY_SECS,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            db_path: None,
        }
    }
}

impl EngineConfig {
    /// Parse a config from a raw JSON payload
    pub fn from_json(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate and normalize the base URL
    pub fn validate(&self) -> Result<()> {
        let base_url = normalize_text_option(Some(self.api_base_url.clone()))
            .ok_or_else(|| Error::InvalidInput("api_base_url must not be empty".to_string()))?;
        if !is_http_url(&base_url) {
            return Err(Error::InvalidInput(
                "api_base_url must include http:// or https://".to_string(),
            ));
        }
        if self.retry_max_attempts == 0 {
            return Err(Error::InvalidInput(
                "retry_max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn api_base_url(&self) -> String {
        self.api_base_url.trim().trim_end_matches('/').to_string()
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }

    pub const fn monitor_options(&self) -> MonitorOptions {
        MonitorOptions {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            online_debounce: Duration::from_secs(self.online_debounce_secs),
        }
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_secs(self.retry_base_delay_secs),
            max_delay: Duration::from_secs(self.retry_max_delay_secs),
            max_attempts: self.retry_max_attempts,
        }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

const fn default_online_debounce_secs() -> u64 {
    DEFAULT_ONLINE_DEBOUNCE_SECS
}

const fn default_drain_interval_secs() -> u64 {
    DEFAULT_DRAIN_INTERVAL_SECS
}

const fn default_retry_base_delay_secs() -> u64 {
    DEFAULT_RETRY_BASE_DELAY_SECS
}

const fn default_retry_max_delay_secs() -> u64 {
    DEFAULT_RETRY_MAX_DELAY_SECS
}

const fn default_retry_max_attempts() -> u32 {
    DEFAULT_RETRY_MAX_ATTEMPTS
}
