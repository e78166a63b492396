use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;

/// How long fetched data counts as fresh unless configured otherwise.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_millis(5000);

/// Configuration for one optimistic list.
#[derive(Debug, Clone)]
pub struct ListOptions<D> {
    pub cache_key: CacheKey,
    /// Template the draft form is reset to.
    pub default_draft: D,
    pub stale_time: Duration,
    /// Log every optimistic phase at `info`.
    pub verbose: bool,
}

impl<D> ListOptions<D> {
    pub fn new(cache_key: impl Into<CacheKey>, default_draft: D) -> Self {
        Self {
            cache_key: cache_key.into(),
            default_draft,
            stale_time: DEFAULT_STALE_TIME,
            verbose: false,
        }
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Serializable list settings, e.g. loaded from a JSON config file:
///
/// ```json
/// { "cacheKey": ["todos"], "staleTimeMs": 5000, "verbose": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListConfig {
    pub cache_key: Vec<String>,
    #[serde(default = "default_stale_time_ms")]
    pub stale_time_ms: u64,
    #[serde(default)]
    pub verbose: bool,
}

fn default_stale_time_ms() -> u64 {
    DEFAULT_STALE_TIME.as_millis() as u64
}

impl ListConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Combine with the default draft, which is not serializable config.
    pub fn into_options<D>(self, default_draft: D) -> ListOptions<D> {
        ListOptions::new(self.cache_key, default_draft)
            .with_stale_time(Duration::from_millis(self.stale_time_ms))
            .with_verbose(self.verbose)
    }
}
