//! Configuration for the API client, retry policy, polling and storage

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use log::{debug, warn};

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";
pub const ENV_API_BASE: &str = "AUCTION_API_BASE";
pub const ENV_POLL_INTERVAL_MS: &str = "AUCTION_POLL_INTERVAL_MS";

/// Backend endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig
{   /// Base URL every request path is joined onto
    pub base_url: String
  , /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64
  , /// Path requested by the health check
    pub health_path: String
  , /// Health check timeout in milliseconds
    pub health_timeout_ms: u64
  , /// Headers sent with every request; caller headers win
    pub default_headers: BTreeMap<String, String>
}

impl Default for ApiConfig
{   fn default() -> Self
    {   let mut default_headers = BTreeMap::new();
        default_headers.insert(
          "Accept".to_string(),
          "application/json".to_string()
        );
        ApiConfig
        {   base_url: DEFAULT_API_BASE.to_string()
          , timeout_ms: 10_000
          , health_path: "/state".to_string()
          , health_timeout_ms: 2_000
          , default_headers
        }
    }
}

impl ApiConfig
{   pub fn timeout(&self) -> Duration
    {   Duration::from_millis(self.timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration
    {   Duration::from_millis(self.health_timeout_ms)
    }
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig
{   /// Total attempts per request, first one included
    pub max_attempts: usize
  , /// Delay before the first retry in milliseconds
    pub initial_backoff_ms: u64
  , /// Growth factor applied per further retry
    pub backoff_multiplier: f64
  , /// Upper bound on any single delay in milliseconds
    pub max_backoff_ms: u64
}

impl Default for RetryConfig
{   fn default() -> Self
    {   RetryConfig
        {   max_attempts: 3
          , initial_backoff_ms: 500
          , backoff_multiplier: 2.0
          , max_backoff_ms: 4_000
        }
    }
}

/// Live view refresh configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig
{   pub interval_ms: u64
}

impl Default for PollingConfig
{   fn default() -> Self
    {   PollingConfig
        {   interval_ms: 5_000
        }
    }
}

impl PollingConfig
{   pub fn interval(&self) -> Duration
    {   Duration::from_millis(self.interval_ms)
    }
}

/// Chat history persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig
{   /// Storage key the serialized history lives under
    pub storage_key: String
  , /// Most recent entries retained
    pub max_entries: usize
  , /// Directory for file-backed storage; in-memory when absent
    pub storage_dir: Option<PathBuf>
}

impl Default for TranscriptConfig
{   fn default() -> Self
    {   TranscriptConfig
        {   storage_key: "auction_chat_history".to_string()
          , max_entries: 50
          , storage_dir: None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig
{   /// How long a notification stays visible in milliseconds
    pub ttl_ms: u64
}

impl Default for NotificationConfig
{   fn default() -> Self
    {   NotificationConfig
        {   ttl_ms: 3_000
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistConfig
{   pub api: ApiConfig
  , pub retry: RetryConfig
  , pub polling: PollingConfig
  , pub transcript: TranscriptConfig
  , pub notifications: NotificationConfig
}

impl AssistConfig
{   /// Load from a JSON file, then apply environment overrides
    pub fn from_file(path: &Path)
      -> Result<Self, crate::error::Error>
    {   debug!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path)
          .map_err(|e| {
            crate::error::Error::InvalidConfiguration(
              format!("cannot read {}: {}", path.display(), e)
            )
          })?;
        let mut config: AssistConfig
          = serde_json::from_str(&text).map_err(|e| {
            crate::error::Error::InvalidConfiguration(
              format!("cannot parse {}: {}", path.display(), e)
            )
          })?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self, crate::error::Error>
    {   let mut config = AssistConfig::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self)
    {   if let Ok(base) = std::env::var(ENV_API_BASE)
        {   debug!("{} overrides base url: {}", ENV_API_BASE, base);
            self.api.base_url = base;
        }
        if let Ok(raw) = std::env::var(ENV_POLL_INTERVAL_MS)
        {   match raw.parse::<u64>()
            {   Ok(ms) => self.polling.interval_ms = ms
              , Err(_) => {
                  warn!(
                    "Ignoring {}={}: not a number",
                    ENV_POLL_INTERVAL_MS, raw
                  );
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), crate::error::Error>
    {   let invalid = |msg: &str| {
          Err(crate::error::Error::InvalidConfiguration(
            msg.to_string()
          ))
        };
        if self.api.base_url.trim().is_empty()
        {   return invalid("api.base_url must not be empty");
        }
        if self.retry.max_attempts == 0
        {   return invalid("retry.max_attempts must be at least 1");
        }
        if !(self.retry.backoff_multiplier > 1.0)
        {   return invalid("retry.backoff_multiplier must be > 1.0");
        }
        if self.retry.max_backoff_ms == 0
        {   return invalid("retry.max_backoff_ms must be positive");
        }
        if self.polling.interval_ms == 0
        {   return invalid("polling.interval_ms must be positive");
        }
        if self.transcript.max_entries == 0
        {   return invalid("transcript.max_entries must be positive");
        }
        Ok(())
    }
}
