//! Use-case driver: sequence scrape then persist, surface terminal errors.
//!
//! Translated from `original_source/3/src/use_case.py`'s
//! `CollectAndSaveGitHubRepositoriesUseCase.execute`. Shutdown of the
//! scraper's underlying client, cache and store is the caller's
//! responsibility (see the `collect` binary), the same way the upstream
//! closes its collaborators in `main`'s `finally` block rather than
//! inside the use case itself.

use tracing::{error, info};

use crate::error::DevStatsError;
use crate::scraper::GithubReposScraper;
use crate::store::ClickHouseStore;

/// Collects the top `qty` repositories (`limit` per page) and writes the
/// resulting snapshot to the analytical store.
pub async fn collect_and_save_github_repositories(
    scraper: &GithubReposScraper,
    store: &ClickHouseStore,
    qty: i64,
    limit: i64,
) -> Result<(), DevStatsError> {
    info!("starting GitHub repository and commit collection");
    let result = async {
        let repositories = scraper.get_repositories(qty, limit).await?;
        store.save_repositories_commits_positions(&repositories).await?;
        Ok::<(), DevStatsError>(())
    }
    .await;

    if let Err(err) = &result {
        error!(%err, "failed to collect and save GitHub repository snapshot");
    }
    result
}
