//! TOML configuration.
//!
//! Every section except `[db]` is optional; missing keys fall back to the
//! defaults below, which mirror the provider-friendly pacing the ledger was
//! tuned with (1 s between rounds, 2 s between batches, ×1.5 backoff).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use draw_ledger_core::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub backfill: BackfillConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5001".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts per round, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff for query-time fetches.
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    /// First backoff for bulk loads.
    #[serde(default = "default_bulk_initial_retry_delay_ms")]
    pub bulk_initial_retry_delay_ms: u64,
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,
    /// Latest round to assume when neither the probe nor the store can tell.
    #[serde(default)]
    pub fallback_latest_id: Option<u32>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            initial_retry_delay_ms: default_initial_retry_delay_ms(),
            bulk_initial_retry_delay_ms: default_bulk_initial_retry_delay_ms(),
            growth_factor: default_growth_factor(),
            fallback_latest_id: None,
        }
    }
}

fn default_base_url() -> String {
    "https://www.dhlottery.co.kr".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_max_attempts() -> u32 {
    4
}
fn default_initial_retry_delay_ms() -> u64 {
    2000
}
fn default_bulk_initial_retry_delay_ms() -> u64 {
    3000
}
fn default_growth_factor() -> f64 {
    1.5
}

impl SourceConfig {
    /// Retry policy for fetches made while answering a query.
    pub fn query_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_retry_delay_ms),
            self.growth_factor,
        )
    }

    /// Retry policy for bulk loads, which back off more gently.
    pub fn bulk_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.bulk_initial_retry_delay_ms),
            self.growth_factor,
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackfillConfig {
    /// Maximum rounds fetched while answering one range query.
    #[serde(default = "default_query_fetch_cap")]
    pub query_fetch_cap: usize,
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            query_fetch_cap: default_query_fetch_cap(),
            item_delay_ms: default_item_delay_ms(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

fn default_query_fetch_cap() -> usize {
    10
}
fn default_item_delay_ms() -> u64 {
    1000
}
fn default_batch_size() -> usize {
    5
}
fn default_batch_delay_ms() -> u64 {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_max_span")]
    pub max_span: u32,
    /// Rounds covered by a bulk load that names no start.
    #[serde(default = "default_load_span")]
    pub default_load_span: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_span: default_max_span(),
            default_load_span: default_load_span(),
        }
    }
}

fn default_max_span() -> u32 {
    500
}
fn default_load_span() -> u32 {
    500
}

impl Config {
    /// Default configuration rooted at `db_path`, for tests and ad hoc use.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            server: ServerConfig::default(),
            source: SourceConfig::default(),
            backfill: BackfillConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.source.max_attempts == 0 {
        anyhow::bail!("source.max_attempts must be >= 1");
    }
    if !(config.source.growth_factor >= 1.0 && config.source.growth_factor.is_finite()) {
        anyhow::bail!("source.growth_factor must be a finite value >= 1.0");
    }
    if config.source.timeout_secs == 0 {
        anyhow::bail!("source.timeout_secs must be > 0");
    }
    if !config.source.base_url.starts_with("http://")
        && !config.source.base_url.starts_with("https://")
    {
        anyhow::bail!(
            "source.base_url must be an http(s) URL, got '{}'",
            config.source.base_url
        );
    }
    if config.source.fallback_latest_id == Some(0) {
        anyhow::bail!("source.fallback_latest_id must be >= 1 when set");
    }
    if config.backfill.batch_size == 0 {
        anyhow::bail!("backfill.batch_size must be > 0");
    }
    if config.query.max_span == 0 {
        anyhow::bail!("query.max_span must be > 0");
    }
    if config.query.default_load_span == 0 {
        anyhow::bail!("query.default_load_span must be > 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = parse("[db]\npath = \"./data/ledger.sqlite\"\n").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:5001");
        assert_eq!(config.query.max_span, 500);
        assert_eq!(config.backfill.batch_size, 5);
        assert_eq!(config.backfill.query_fetch_cap, 10);
        assert_eq!(config.source.max_attempts, 4);
        assert_eq!(config.source.fallback_latest_id, None);
        assert_eq!(
            config.source.query_retry().schedule(),
            vec![
                Duration::from_millis(2000),
                Duration::from_millis(3000),
                Duration::from_millis(4500)
            ]
        );
        assert_eq!(
            config.source.bulk_retry().initial_delay,
            Duration::from_millis(3000)
        );
    }

    #[test]
    fn test_overrides() {
        let config = parse(
            r#"
[db]
path = "/tmp/l.sqlite"

[source]
base_url = "http://127.0.0.1:9000"
fallback_latest_id = 1168

[backfill]
batch_size = 2
item_delay_ms = 0

[query]
max_span = 50
"#,
        )
        .unwrap();
        assert_eq!(config.source.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.source.fallback_latest_id, Some(1168));
        assert_eq!(config.backfill.batch_size, 2);
        assert_eq!(config.backfill.item_delay_ms, 0);
        assert_eq!(config.query.max_span, 50);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let base = "[db]\npath = \"x.sqlite\"\n";
        assert!(parse(&format!("{}[backfill]\nbatch_size = 0\n", base)).is_err());
        assert!(parse(&format!("{}[source]\nmax_attempts = 0\n", base)).is_err());
        assert!(parse(&format!("{}[source]\ngrowth_factor = 0.5\n", base)).is_err());
        assert!(parse(&format!("{}[source]\nbase_url = \"ftp://x\"\n", base)).is_err());
        assert!(parse(&format!("{}[query]\nmax_span = 0\n", base)).is_err());
    }

    #[test]
    fn test_missing_db_section_fails() {
        assert!(parse("[server]\nbind = \"0.0.0.0:1\"\n").is_err());
    }
}
