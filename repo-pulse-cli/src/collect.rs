use std::sync::Arc;

use clap::{Arg, Command};
use repo_pulse_core::cache::LruTtlCache;
use repo_pulse_core::client::ApiClient;
use repo_pulse_core::config::Config;
use repo_pulse_core::error::DevStatsError;
use repo_pulse_core::ratelimit::{RateLimit, ResourceRateLimiter};
use repo_pulse_core::scraper::GithubReposScraper;
use repo_pulse_core::store::ClickHouseStore;
use repo_pulse_core::usecase::collect_and_save_github_repositories;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), DevStatsError> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let matches = Command::new("repo-pulse-collect")
        .version("0.1.0")
        .about("Collects a daily GitHub top-repository snapshot into the analytical store")
        .author("repo-pulse contributors")
        .arg(
            Arg::new("qty")
                .long("qty")
                .help("Number of top repositories to collect")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .help("Search results per page")
                .value_parser(clap::value_parser!(i64)),
        )
        .get_matches();

    let ctx = Config::from_env()?;
    info!(qty = ctx.qty, page_limit = ctx.page_limit, "repo-pulse collect starting");

    let qty = matches.get_one::<i64>("qty").copied().unwrap_or(ctx.qty as i64);
    let limit = matches.get_one::<i64>("limit").copied().unwrap_or(ctx.page_limit as i64);

    let cache = Arc::new(LruTtlCache::new(ctx.cache_maxlen));

    // Limits sized with headroom per GitHub's documented quotas: 5000/hour
    // overall, ~30/minute against the search endpoint.
    let common = RateLimit::new(Some(50), 4500, 60 * 60)?;
    let mut resource_limits = std::collections::HashMap::new();
    resource_limits.insert(
        "search/repositories".to_string(),
        vec![RateLimit::new(None, 20, 60)?],
    );
    let limiter = Arc::new(ResourceRateLimiter::new(common, resource_limits));

    let client = Arc::new(ApiClient::new(
        &ctx.github_token,
        limiter,
        std::time::Duration::from_secs(ctx.request_timeout_secs),
        ctx.max_retries,
        Some(cache.clone() as Arc<dyn repo_pulse_core::cache::ApiCache>),
    )?);
    let scraper = GithubReposScraper::new(client, ctx.timezone, ctx.max_retries);

    let store = ClickHouseStore::new(
        &ctx.clickhouse_host,
        ctx.clickhouse_port,
        &ctx.clickhouse_user,
        &ctx.clickhouse_password,
        &ctx.clickhouse_database,
        ctx.batch_size,
    );
    store.init().await;

    let result = collect_and_save_github_repositories(&scraper, &store, qty, limit).await;

    // Shutdown hooks run unconditionally, regardless of the outcome above.
    store.close().await;
    cache.close().await;

    match result {
        Ok(()) => {
            info!("repo-pulse collect finished successfully");
            Ok(())
        }
        Err(err) => {
            error!(%err, "repo-pulse collect failed");
            Err(err)
        }
    }
}
