/// `load_config` module: reads the optional YAML file and merges it with CLI flags
/// into the core [`SyncConfig`] plus the S3 [`StoreOptions`].
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into [`FileConfig`] (unknown keys are rejected)
/// - Apply precedence: explicit flags, then file values, then core defaults
/// - Validate numeric settings so a bad value fails before any network traffic
///
/// # Errors
/// All errors use `anyhow::Error` and surface at the CLI boundary as exit code 2.
use anyhow::{anyhow, bail, Result};
use bls_sync_core::config::{normalise_prefix, FetchConfig, SyncConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

use crate::cli::SyncArgs;
use crate::store::StoreOptions;

/// Settings that may live in the YAML file. Every key is optional.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    pub user_agent: Option<String>,
    pub rate_limit_seconds: Option<f64>,
    pub timeout_seconds: Option<f64>,
    pub max_attempts: Option<u32>,
    pub backoff_seconds: Option<f64>,
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

/// Fully resolved settings for one `sync` invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub sync: SyncConfig,
    pub store: StoreOptions,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    match serde_yaml::from_str::<Option<FileConfig>>(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf.unwrap_or_default())
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Merge flags over the optional file and validate the result.
pub fn resolve(args: &SyncArgs) -> Result<Settings> {
    let file = match &args.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    merge(args, file)
}

pub fn merge(args: &SyncArgs, file: FileConfig) -> Result<Settings> {
    let bucket = args.bucket.trim();
    if bucket.is_empty() {
        bail!("--bucket must not be empty");
    }

    // An empty prefix would put the whole bucket in scope for deletion.
    let prefix = normalise_prefix(&args.prefix);
    if prefix.is_empty() {
        bail!("--prefix must name a key prefix such as bls/pr");
    }

    let defaults = FetchConfig::default();
    let fetch = FetchConfig {
        user_agent: args
            .user_agent
            .clone()
            .or(file.user_agent)
            .unwrap_or(defaults.user_agent),
        rate_limit: seconds(
            "rate limit",
            args.rate_limit.or(file.rate_limit_seconds),
            defaults.rate_limit,
        )?,
        timeout: seconds("timeout", file.timeout_seconds, defaults.timeout)?,
        max_attempts: file.max_attempts.unwrap_or(defaults.max_attempts),
        backoff: seconds("backoff", file.backoff_seconds, defaults.backoff)?,
        extra_headers: file.extra_headers,
    };
    if fetch.max_attempts == 0 {
        bail!("max_attempts must be at least 1");
    }
    if fetch.user_agent.trim().is_empty() {
        bail!("user agent must not be empty");
    }
    if fetch.timeout.is_zero() {
        bail!("timeout must be greater than zero");
    }

    let mut sync = SyncConfig::new(bucket, &prefix);
    sync.delete_missing = args.delete_missing;
    sync.fetch = fetch;
    if let Some(base_url) = args.base_url.clone().or(file.base_url) {
        sync.base_url = directory_url(base_url);
    }

    let store = StoreOptions {
        bucket: bucket.to_string(),
        region: args.region.clone().or(file.region),
        endpoint_url: args.endpoint_url.clone().or(file.endpoint_url),
    };
    Ok(Settings { sync, store })
}

fn seconds(name: &str, value: Option<f64>, default: Duration) -> Result<Duration> {
    match value {
        None => Ok(default),
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map_err(|_| anyhow!("{name} must be a non-negative number of seconds, got {secs}")),
    }
}

/// Relative links resolve against the listing URL, so it must name a directory.
fn directory_url(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}
