//! Client configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::{DEFAULT_GAS_LIMIT, Network};

use super::rest::RetryConfig;

/// Poll schedule for transaction results.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// First wait after submission, in milliseconds.
    pub initial_interval_ms: u64,
    /// The interval doubles up to this cap, in milliseconds.
    pub max_interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1000,
            max_interval_ms: 8000,
        }
    }
}

impl PollConfig {
    pub(crate) fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    /// Raise a zero first interval to 1 ms and keep the cap at or above it,
    /// so the schedule always grows.
    pub(crate) fn clamped(self) -> Self {
        let initial_interval_ms = self.initial_interval_ms.max(1);
        Self {
            initial_interval_ms,
            max_interval_ms: self.max_interval_ms.max(initial_interval_ms),
        }
    }

    pub(crate) fn next_interval(&self, current: Duration) -> Duration {
        std::cmp::min(
            current.saturating_mul(2),
            Duration::from_millis(self.max_interval_ms),
        )
    }
}

/// Everything a [`Flow`](super::Flow) client needs, as one record.
///
/// Deserializes from any serde format; missing fields take their defaults.
///
/// ```
/// use flow_kit::ClientConfig;
///
/// let config: ClientConfig = serde_json::from_str(r#"{
///     "network": "testnet",
///     "deadline_ms": 30000,
///     "poll": { "initial_interval_ms": 500 }
/// }"#).unwrap();
/// assert_eq!(config.deadline_ms, 30000);
/// assert_eq!(config.poll.max_interval_ms, 8000);
/// assert_eq!(config.max_expiry_retries, 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub network: Network,
    /// Overrides the network's REST base URL.
    pub rest_url: Option<String>,
    /// Per-request timeout, in milliseconds.
    pub request_timeout_ms: u64,
    /// Overall deadline for a submission, in milliseconds.
    pub deadline_ms: u64,
    pub poll: PollConfig,
    /// Retries for transient HTTP failures.
    pub retry: RetryConfig,
    /// Automatic resubmissions after the reference block expired.
    pub max_expiry_retries: u32,
    pub gas_limit: u64,
    /// Serialize submissions that share a proposal key.
    pub serialize_per_key: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            rest_url: None,
            request_timeout_ms: 10_000,
            deadline_ms: 60_000,
            poll: PollConfig::default(),
            retry: RetryConfig::default(),
            max_expiry_retries: 2,
            gas_limit: DEFAULT_GAS_LIMIT,
            serialize_per_key: false,
        }
    }
}

impl ClientConfig {
    /// Defaults for the given network.
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    /// The REST base URL to use.
    pub fn resolved_rest_url(&self) -> Result<String, ConfigError> {
        match &self.rest_url {
            Some(url) if url.trim().is_empty() => Err(ConfigError::MissingBaseUrl(self.network)),
            Some(url) => Ok(url.trim_end_matches('/').to_string()),
            None => Ok(self.network.endpoint().rest_url.to_string()),
        }
    }

    /// Reject settings no client can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolved_rest_url()?;
        if self.gas_limit == 0 {
            return Err(ConfigError::Invalid("gas_limit must be greater than zero".into()));
        }
        if self.poll.initial_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll.initial_interval_ms must be greater than zero".into(),
            ));
        }
        if self.poll.max_interval_ms < self.poll.initial_interval_ms {
            return Err(ConfigError::Invalid(
                "poll.max_interval_ms must not be below poll.initial_interval_ms".into(),
            ));
        }
        if self.deadline_ms == 0 || self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "deadline_ms and request_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Pull out-of-range settings back to the nearest usable value.
    pub(crate) fn clamp(&mut self) {
        self.poll = self.poll.clone().clamped();
        self.request_timeout_ms = self.request_timeout_ms.max(1);
        self.deadline_ms = self.deadline_ms.max(1);
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub(crate) fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}
