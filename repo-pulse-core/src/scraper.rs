//! Scrape orchestration: paginated repository search fanned out
//! concurrently, per-repository commit paging, reassembly.
//!
//! Translated from `original_source/3/src/scraper.py`'s
//! `GithubReposScrapper._get_all_repositories` / `get_repositories` /
//! `_get_repository_commits`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use reqwest::Method;
use tracing::{error, info, warn};

use crate::client::ApiClient;
use crate::error::ScrapeError;
use crate::models::{ApiCommit, Repository, RepositoryAuthorCommits, SearchRepositoriesResponse};

const WAIT_RESET_SEC_MAX: i64 = 5;
const MAX_COMMIT_PAGES: u32 = 100;

/// Orchestrates repository discovery and commit enrichment against a
/// shared [`ApiClient`].
pub struct GithubReposScraper {
    client: Arc<ApiClient>,
    timezone: Tz,
    max_retries: u32,
}

impl GithubReposScraper {
    pub fn new(client: Arc<ApiClient>, timezone: Tz, max_retries: u32) -> Self {
        GithubReposScraper {
            client,
            timezone,
            max_retries,
        }
    }

    async fn get_top_repositories(&self, limit: u32, page: u32) -> Vec<Repository> {
        info!(limit, page, "fetching top repositories page");
        let params = [
            ("q", "stars:>1".to_string()),
            ("sort", "stars".to_string()),
            ("order", "desc".to_string()),
            ("page", page.to_string()),
            ("per_page", limit.to_string()),
        ];
        let data = match self
            .client
            .request_with_retry(
                "search/repositories",
                "search/repositories",
                Method::GET,
                &params,
                self.max_retries,
                WAIT_RESET_SEC_MAX,
            )
            .await
        {
            Ok(data) => data,
            Err(err) => {
                error!(limit, page, %err, "failed to fetch top repositories page");
                return Vec::new();
            }
        };

        let parsed: SearchRepositoriesResponse = match serde_json::from_value(data) {
            Ok(parsed) => parsed,
            Err(err) => {
                error!(%err, "failed to decode search repositories response");
                return Vec::new();
            }
        };

        parsed
            .items
            .into_iter()
            .enumerate()
            .map(|(pos, item)| Repository::from_api(item, pos as u32))
            .collect()
    }

    fn commits_to_models(owner: &str, repo: &str, items: Vec<ApiCommit>) -> Vec<RepositoryAuthorCommits> {
        let mut authors: HashMap<String, u64> = HashMap::new();
        for item in items {
            let Some(author) = item.commit.author.and_then(|a| a.name) else {
                warn!(sha = %item.sha, owner, repo, "commit missing author information");
                continue;
            };
            *authors.entry(author).or_insert(0) += 1;
        }
        authors
            .into_iter()
            .map(|(author, commits)| RepositoryAuthorCommits::new(author, commits))
            .collect()
    }

    async fn get_repository_commits_page(
        &self,
        owner: &str,
        repo: &str,
        since: &str,
        page: u32,
    ) -> Vec<ApiCommit> {
        let endpoint = format!("repos/{owner}/{repo}/commits");
        let params = [
            ("per_page", "100".to_string()),
            ("page", page.to_string()),
            ("since", since.to_string()),
        ];
        match self
            .client
            .request_with_retry(&endpoint, "repos/commits", Method::GET, &params, self.max_retries, WAIT_RESET_SEC_MAX)
            .await
        {
            Ok(data) => serde_json::from_value(data).unwrap_or_default(),
            Err(err) => {
                error!(owner, repo, page, %err, "failed to fetch commits page");
                Vec::new()
            }
        }
    }

    async fn get_repository_commits(&self, owner: &str, repo: &str) -> Vec<RepositoryAuthorCommits> {
        let since = Utc::now()
            .with_timezone(&self.timezone)
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time");
        let since_utc = self
            .timezone
            .from_local_datetime(&since)
            .single()
            .unwrap_or_else(|| Utc::now().with_timezone(&self.timezone))
            .with_timezone(&Utc);
        let since_str = since_utc.format("%Y-%m-%dT%H:%M:%SZ").to_string();

        info!(owner, repo, since = %since_str, "fetching repository commits");
        let mut items = Vec::new();
        for page in 1..=MAX_COMMIT_PAGES {
            let page_items = self
                .get_repository_commits_page(owner, repo, &since_str, page)
                .await;
            if page_items.is_empty() {
                break;
            }
            items.extend(page_items);
        }
        Self::commits_to_models(owner, repo, items)
    }

    async fn get_all_repositories(&self, qty: u32, limit: u32) -> Vec<Repository> {
        info!(qty, "fetching top repositories across pages");
        let pages = qty.div_ceil(limit);
        let tasks = (0..pages).map(|page| {
            let page_limit = limit.min(qty - page * limit);
            self.get_top_repositories(page_limit, page + 1)
        });

        let mut repositories = Vec::new();
        for page_repos in join_all(tasks).await {
            repositories.extend(page_repos);
        }
        info!(count = repositories.len(), "fetched repositories");
        repositories
    }

    /// Collect the top `qty` starred repositories (paginated `limit` per
    /// request) and enrich each with today's per-author commit counts.
    /// `qty` clamps into `[1, 1000]`, `limit` into `[1, 100]`; a negative
    /// `limit` or non-positive `qty` is rejected outright.
    pub async fn get_repositories(&self, qty: i64, limit: i64) -> Result<Vec<Repository>, ScrapeError> {
        if limit < 0 {
            return Err(ScrapeError::InvalidArgument("limit must be non-negative".to_string()));
        }
        if qty <= 0 {
            return Err(ScrapeError::InvalidArgument("qty must be positive".to_string()));
        }
        if qty > 1000 {
            warn!(qty, "qty cannot exceed 1000, clamping");
        }
        if limit > 100 {
            warn!(limit, "limit cannot exceed 100, clamping");
        }
        let limit = (limit.clamp(1, 100)) as u32;
        let qty = (qty.clamp(1, 1000)) as u32;

        let mut repositories = self.get_all_repositories(qty, limit).await;

        info!("fetching commits for each repository");
        let commit_tasks = repositories
            .iter()
            .map(|r| self.get_repository_commits(&r.owner, &r.name));
        let commits = join_all(commit_tasks).await;
        for (repo, commits) in repositories.iter_mut().zip(commits) {
            repo.add_commits(commits);
        }

        Ok(repositories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commits_to_models_groups_and_skips_missing_authors() {
        let items = vec![
            ApiCommit {
                sha: "a".to_string(),
                commit: crate::models::ApiCommitDetail {
                    author: Some(crate::models::ApiCommitAuthor {
                        name: Some("alice".to_string()),
                    }),
                },
            },
            ApiCommit {
                sha: "b".to_string(),
                commit: crate::models::ApiCommitDetail {
                    author: Some(crate::models::ApiCommitAuthor {
                        name: Some("alice".to_string()),
                    }),
                },
            },
            ApiCommit {
                sha: "c".to_string(),
                commit: crate::models::ApiCommitDetail { author: None },
            },
        ];

        let result = GithubReposScraper::commits_to_models("o", "r", items);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].author, "alice");
        assert_eq!(result[0].commits, 2);
    }
}
