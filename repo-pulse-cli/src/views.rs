use clap::{Arg, Command};
use repo_pulse_core::config::Config;
use repo_pulse_core::error::DevStatsError;
use repo_pulse_core::views::CampaignViewsStore;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), DevStatsError> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let matches = Command::new("repo-pulse-views")
        .version("0.1.0")
        .about("Queries hourly view deltas for a campaign from the analytical store")
        .author("repo-pulse contributors")
        .arg(
            Arg::new("campaign-id")
                .long("campaign-id")
                .required(true)
                .value_parser(clap::value_parser!(i32)),
        )
        .get_matches();

    let ctx = Config::from_env()?;
    let campaign_id = *matches.get_one::<i32>("campaign-id").expect("required");

    let store = CampaignViewsStore::new(
        &ctx.clickhouse_host,
        ctx.clickhouse_port,
        &ctx.clickhouse_user,
        &ctx.clickhouse_password,
        &ctx.clickhouse_database,
    );
    store.init().await;

    let result = store.get_views(campaign_id).await;
    store.close().await;

    match result {
        Ok(stats) => {
            for (phrase, hourly) in &stats {
                println!("{phrase} {hourly:?}");
            }
            info!(phrases = stats.len(), "fetched campaign views");
            Ok(())
        }
        Err(err) => {
            error!(%err, "failed to fetch campaign views");
            Err(err.into())
        }
    }
}
