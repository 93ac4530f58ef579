use bls_sync::cli::{Cli, Commands, SyncArgs};
use bls_sync::load_config::{load_config, merge, resolve, FileConfig};
use clap::Parser;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn args(bucket: &str, prefix: &str) -> SyncArgs {
    SyncArgs {
        bucket: bucket.into(),
        prefix: prefix.into(),
        ..SyncArgs::default()
    }
}

#[test]
fn test_load_config_reads_every_key() {
    let config_yaml = r#"
base_url: "https://mirror.example.org/pr"
endpoint_url: "http://localhost:9000"
region: eu-west-1
user_agent: "research-bot/2.0 (ops@example.org)"
rate_limit_seconds: 1.5
timeout_seconds: 10
max_attempts: 6
backoff_seconds: 0.25
extra_headers:
  From: ops@example.org
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.region.as_deref(), Some("eu-west-1"));
    assert_eq!(config.rate_limit_seconds, Some(1.5));
    assert_eq!(config.timeout_seconds, Some(10.0));
    assert_eq!(config.max_attempts, Some(6));
    assert_eq!(
        config.extra_headers.get("From").map(String::as_str),
        Some("ops@example.org")
    );
}

#[test]
fn test_load_config_empty_file_is_all_defaults() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "").unwrap();

    let config = load_config(config_file.path()).expect("empty config is valid");

    assert_eq!(config, FileConfig::default());
}

#[test]
fn test_load_config_rejects_unknown_keys() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "rate_limit: 2\n").unwrap();

    let err = load_config(config_file.path()).expect_err("typo must not be ignored");

    assert!(err.to_string().contains("Failed to parse config YAML"));
}

#[test]
fn test_merge_flags_win_over_file() {
    let mut flags = args("flag-bucket", "/bls/pr/");
    flags.rate_limit = Some(2.0);
    flags.region = Some("us-east-2".into());
    let file = FileConfig {
        base_url: Some("https://mirror.example.org/pr".into()),
        region: Some("eu-west-1".into()),
        rate_limit_seconds: Some(9.0),
        max_attempts: Some(2),
        ..FileConfig::default()
    };

    let settings = merge(&flags, file).expect("valid settings");

    assert_eq!(settings.sync.prefix, "bls/pr");
    assert_eq!(settings.sync.base_url, "https://mirror.example.org/pr/");
    assert_eq!(settings.sync.fetch.rate_limit, Duration::from_secs(2));
    assert_eq!(settings.sync.fetch.max_attempts, 2);
    assert_eq!(settings.store.bucket, "flag-bucket");
    assert_eq!(settings.store.region.as_deref(), Some("us-east-2"));
    assert!(!settings.sync.delete_missing);
}

#[test]
fn test_merge_rejects_invalid_values() {
    let mut negative = args("b", "p");
    negative.rate_limit = Some(-0.5);
    assert!(merge(&negative, FileConfig::default()).is_err());

    let zero_attempts = FileConfig {
        max_attempts: Some(0),
        ..FileConfig::default()
    };
    assert!(merge(&args("b", "p"), zero_attempts).is_err());

    assert!(merge(&args("  ", "p"), FileConfig::default()).is_err());

    let err = merge(&args("b", "//"), FileConfig::default()).expect_err("empty prefix");
    assert!(err.to_string().contains("--prefix"));
}

#[test]
fn test_resolve_without_file_uses_defaults() {
    let settings = resolve(&args("b", "bls/pr")).expect("defaults are valid");

    assert_eq!(settings.sync.prefix, "bls/pr");
    assert_eq!(
        settings.sync.base_url,
        bls_sync_core::config::BLS_BASE_URL
    );
    assert_eq!(settings.store.endpoint_url, None);
}

#[test]
#[serial]
fn test_cli_reads_settings_from_environment() {
    env::set_var("BLS_SYNC_BUCKET", "env-bucket");
    env::set_var("BLS_SYNC_PREFIX", "mirror/pr");

    let cli = Cli::try_parse_from(["bls-sync", "sync", "--delete-missing"]);

    env::remove_var("BLS_SYNC_BUCKET");
    env::remove_var("BLS_SYNC_PREFIX");
    let Commands::Sync(sync) = cli.expect("env supplies the bucket").command;
    assert_eq!(sync.bucket, "env-bucket");
    assert_eq!(sync.prefix, "mirror/pr");
    assert!(sync.delete_missing);
}

#[test]
#[serial]
fn test_cli_flag_overrides_environment() {
    env::set_var("BLS_SYNC_BUCKET", "env-bucket");

    let cli = Cli::try_parse_from([
        "bls-sync",
        "sync",
        "--bucket",
        "flag-bucket",
        "--prefix",
        "bls/pr",
    ]);

    env::remove_var("BLS_SYNC_BUCKET");
    let Commands::Sync(sync) = cli.expect("parses").command;
    assert_eq!(sync.bucket, "flag-bucket");
}

#[test]
#[serial]
fn test_cli_requires_prefix() {
    env::remove_var("BLS_SYNC_PREFIX");

    let cli = Cli::try_parse_from(["bls-sync", "sync", "--bucket", "b", "--delete-missing"]);

    assert!(cli.is_err(), "a missing prefix must not default to the bucket root");
}
