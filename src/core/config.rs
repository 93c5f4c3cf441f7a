//! Monitor Configuration
//!
//! Runtime settings of the telemetry client. Every field has a default so a
//! partial JSON file (or none at all) yields a working configuration.

use super::constants::{
    DEFAULT_ALERT_CAPACITY, DEFAULT_ALERT_LIMIT, DEFAULT_BASE_URL, DEFAULT_HISTORY_CAPACITY,
    DEFAULT_HISTORY_LIMIT, DEFAULT_RECONNECT_DELAY, LIVE_CHANNEL_PATH,
};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Delay schedule between a channel close and the next connection attempt.
///
/// Retries are unbounded under both policies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// Same delay before every attempt.
    Fixed {
        #[serde(with = "millis")]
        delay: Duration,
    },
    /// Doubling delay capped at `max`, back to `initial` after a successful open.
    Exponential {
        #[serde(with = "millis")]
        initial: Duration,
        #[serde(with = "millis")]
        max: Duration,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed {
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the reconnection following `failures` consecutive closes (1-based).
    pub fn delay_for(&self, failures: u32) -> Duration {
        match self {
            ReconnectPolicy::Fixed { delay } => *delay,
            ReconnectPolicy::Exponential { initial, max } => {
                let shift = failures.saturating_sub(1).min(16);
                initial.saturating_mul(1 << shift).min(*max)
            }
        }
    }
}

/// When locally evaluated thresholds turn into alert records.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPolicy {
    /// One alert per breached threshold on every accepted reading.
    #[default]
    EveryReading,
    /// Only when a threshold becomes breached after not being breached.
    OnTransition,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Base address of the monitoring service, `http://` or `https://`.
    pub base_url: String,
    /// Entries requested per stream while bootstrapping.
    pub history_limit: usize,
    /// Alerts requested while bootstrapping.
    pub alert_limit: usize,
    /// Retained entries per history buffer.
    pub history_capacity: usize,
    /// Retained alerts.
    pub alert_capacity: usize,
    pub reconnect: ReconnectPolicy,
    pub alert_policy: AlertPolicy,
    /// Also clear the service's alert table when alerts are cleared locally.
    pub propagate_clear: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            alert_limit: DEFAULT_ALERT_LIMIT,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            alert_capacity: DEFAULT_ALERT_CAPACITY,
            reconnect: ReconnectPolicy::default(),
            alert_policy: AlertPolicy::default(),
            propagate_clear: true,
        }
    }
}

impl MonitorConfig {
    /// Reads a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Base address without trailing slash.
    pub fn api_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Live channel address: the base address with its scheme upgraded.
    pub fn live_url(&self) -> Result<String> {
        let base = self.api_base();
        let upgraded = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            return Err(anyhow!("unsupported base url scheme: {}", base));
        };
        Ok(format!("{}{}", upgraded, LIVE_CHANNEL_PATH))
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
