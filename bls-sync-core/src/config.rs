use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const BLS_BASE_URL: &str = "https://download.bls.gov/pub/time.series/pr/";
pub const DEFAULT_RATE_LIMIT_SECONDS: f64 = 0.5;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; bls-pr-sync/1.0; +https://download.bls.gov/)";
pub const DEFAULT_TIMEOUT_SECONDS: f64 = 30.0;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_BACKOFF_SECONDS: f64 = 1.0;

/// Everything one sync run needs to know.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub bucket: String,
    /// Key prefix inside the bucket, without surrounding slashes.
    pub prefix: String,
    #[serde(default)]
    pub delete_missing: bool,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl SyncConfig {
    pub fn new(bucket: impl Into<String>, prefix: &str) -> Self {
        Self {
            base_url: default_base_url(),
            bucket: bucket.into(),
            prefix: normalise_prefix(prefix),
            delete_missing: false,
            fetch: FetchConfig::default(),
        }
    }

    /// Object key for an upstream filename.
    pub fn key_for(&self, filename: &str) -> String {
        key_for(self.prefix.trim_matches('/'), filename)
    }

    pub fn trace_loaded(&self) {
        info!(
            base_url = %self.base_url,
            bucket = %self.bucket,
            prefix = %self.prefix,
            delete_missing = self.delete_missing,
            rate_limit_secs = self.fetch.rate_limit.as_secs_f64(),
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}

/// Fetcher behaviour: identification, throttling and retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Minimum spacing between request starts.
    #[serde(with = "seconds")]
    pub rate_limit: Duration,
    #[serde(with = "seconds")]
    pub timeout: Duration,
    /// Total attempts per URL, including the first.
    pub max_attempts: u32,
    /// Base of the exponential backoff between retries.
    #[serde(with = "seconds")]
    pub backoff: Duration,
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            rate_limit: Duration::from_secs_f64(DEFAULT_RATE_LIMIT_SECONDS),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECONDS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_secs_f64(DEFAULT_BACKOFF_SECONDS),
            extra_headers: BTreeMap::new(),
        }
    }
}

fn default_base_url() -> String {
    BLS_BASE_URL.to_string()
}

/// Strip surrounding slashes so `/bls/pr/` and `bls/pr` map to the same keys.
pub fn normalise_prefix(prefix: &str) -> String {
    prefix.trim_matches('/').to_string()
}

pub fn key_for(prefix: &str, filename: &str) -> String {
    if prefix.is_empty() {
        filename.to_string()
    } else {
        format!("{prefix}/{filename}")
    }
}

/// Inverse of [`key_for`]: the filename a key was produced from, if any.
/// Keys nested below the prefix have no filename.
pub fn filename_for<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    let rest = if prefix.is_empty() {
        key
    } else {
        key.strip_prefix(prefix)?.strip_prefix('/')?
    };
    if rest.is_empty() || rest.contains('/') {
        None
    } else {
        Some(rest)
    }
}

/// Durations as fractional seconds in config files.
mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
