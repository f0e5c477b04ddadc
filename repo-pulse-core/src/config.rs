//! Environment-sourced configuration.
//!
//! Translated from the upstream `Context` struct's `from_env` pattern
//! (read each `GHA2DB_*`/`PG_*` variable, fall back to a sane default)
//! but scoped to what the ingestion pipeline and the campaign read path
//! actually consume: a GitHub token, ClickHouse connection parameters,
//! and the timezone used to compute "today" for commit enrichment.

use chrono_tz::Tz;

use crate::error::DevStatsError;

/// Runtime configuration for `repo-pulse` tools.
#[derive(Debug, Clone)]
pub struct Config {
    /// From REPO_PULSE_GITHUB_TOKEN. Bearer token injected on every request.
    pub github_token: String,

    /// From REPO_PULSE_CLICKHOUSE_HOST, default "localhost".
    pub clickhouse_host: String,
    /// From REPO_PULSE_CLICKHOUSE_PORT, default 8123.
    pub clickhouse_port: u16,
    /// From REPO_PULSE_CLICKHOUSE_USER, default "default".
    pub clickhouse_user: String,
    /// From REPO_PULSE_CLICKHOUSE_PASSWORD, default "".
    pub clickhouse_password: String,
    /// From REPO_PULSE_CLICKHOUSE_DATABASE, default "default".
    pub clickhouse_database: String,

    /// From REPO_PULSE_TIMEZONE, default "Europe/Moscow". Used to compute
    /// the start-of-today cutoff for per-repository commit enrichment.
    pub timezone: Tz,

    /// From REPO_PULSE_QTY, default 1000. Number of top repositories to collect.
    pub qty: u32,
    /// From REPO_PULSE_PAGE_LIMIT, default 100. Search results per page.
    pub page_limit: u32,

    /// From REPO_PULSE_BATCH_SIZE, default 1000. Rows per insert batch.
    pub batch_size: usize,
    /// From REPO_PULSE_MAX_RETRIES, default 3.
    pub max_retries: u32,
    /// From REPO_PULSE_REQUEST_TIMEOUT_SECS, default 15.
    pub request_timeout_secs: u64,
    /// From REPO_PULSE_CACHE_MAXLEN, default 1000.
    pub cache_maxlen: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            github_token: String::new(),
            clickhouse_host: "localhost".to_string(),
            clickhouse_port: 8123,
            clickhouse_user: "default".to_string(),
            clickhouse_password: String::new(),
            clickhouse_database: "default".to_string(),
            timezone: chrono_tz::Europe::Moscow,
            qty: 1000,
            page_limit: 100,
            batch_size: 1000,
            max_retries: 3,
            request_timeout_secs: 15,
            cache_maxlen: 1000,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from `.env` (if present) and the process
    /// environment, the same two-phase load the upstream Python settings
    /// modules perform via `pydantic_settings.BaseSettings(env_file=".env")`.
    pub fn from_env() -> crate::error::Result<Self> {
        let _ = dotenvy_load();
        let mut cfg = Self::default();

        cfg.github_token = std::env::var("REPO_PULSE_GITHUB_TOKEN").map_err(|_| {
            DevStatsError::Config(
                "REPO_PULSE_GITHUB_TOKEN is required".to_string(),
            )
        })?;

        if let Ok(v) = std::env::var("REPO_PULSE_CLICKHOUSE_HOST") {
            cfg.clickhouse_host = v;
        }
        if let Ok(v) = std::env::var("REPO_PULSE_CLICKHOUSE_PORT") {
            cfg.clickhouse_port = v
                .parse()
                .map_err(|_| DevStatsError::Config(format!("invalid CLICKHOUSE_PORT: {v}")))?;
        }
        if let Ok(v) = std::env::var("REPO_PULSE_CLICKHOUSE_USER") {
            cfg.clickhouse_user = v;
        }
        if let Ok(v) = std::env::var("REPO_PULSE_CLICKHOUSE_PASSWORD") {
            cfg.clickhouse_password = v;
        }
        if let Ok(v) = std::env::var("REPO_PULSE_CLICKHOUSE_DATABASE") {
            cfg.clickhouse_database = v;
        }
        if let Ok(v) = std::env::var("REPO_PULSE_TIMEZONE") {
            cfg.timezone = v
                .parse()
                .map_err(|_| DevStatsError::Config(format!("unknown timezone: {v}")))?;
        }
        if let Ok(v) = std::env::var("REPO_PULSE_QTY") {
            cfg.qty = v
                .parse()
                .map_err(|_| DevStatsError::Config(format!("invalid QTY: {v}")))?;
        }
        if let Ok(v) = std::env::var("REPO_PULSE_PAGE_LIMIT") {
            cfg.page_limit = v
                .parse()
                .map_err(|_| DevStatsError::Config(format!("invalid PAGE_LIMIT: {v}")))?;
        }
        if let Ok(v) = std::env::var("REPO_PULSE_BATCH_SIZE") {
            cfg.batch_size = v
                .parse()
                .map_err(|_| DevStatsError::Config(format!("invalid BATCH_SIZE: {v}")))?;
        }
        if let Ok(v) = std::env::var("REPO_PULSE_MAX_RETRIES") {
            cfg.max_retries = v
                .parse()
                .map_err(|_| DevStatsError::Config(format!("invalid MAX_RETRIES: {v}")))?;
        }
        if let Ok(v) = std::env::var("REPO_PULSE_REQUEST_TIMEOUT_SECS") {
            cfg.request_timeout_secs = v.parse().map_err(|_| {
                DevStatsError::Config(format!("invalid REQUEST_TIMEOUT_SECS: {v}"))
            })?;
        }
        if let Ok(v) = std::env::var("REPO_PULSE_CACHE_MAXLEN") {
            cfg.cache_maxlen = v
                .parse()
                .map_err(|_| DevStatsError::Config(format!("invalid CACHE_MAXLEN: {v}")))?;
        }

        Ok(cfg)
    }
}

/// Loading `.env` is best-effort: its absence in production (where real
/// env vars are injected by the deployment) is not an error.
fn dotenvy_load() -> Result<std::path::PathBuf, dotenvy::Error> {
    dotenvy::dotenv()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upstream_settings() {
        let cfg = Config::default();
        assert_eq!(cfg.clickhouse_host, "localhost");
        assert_eq!(cfg.clickhouse_port, 8123);
        assert_eq!(cfg.timezone, chrono_tz::Europe::Moscow);
        assert_eq!(cfg.qty, 1000);
        assert_eq!(cfg.page_limit, 100);
        assert_eq!(cfg.batch_size, 1000);
    }
}
