//! Analytical store writer backed by ClickHouse.
//!
//! Translated from `original_source/3/src/db.py`'s `ClickHouseRepository`:
//! batch inserts into three tables, with `save_repositories_commits_positions`
//! firing the three saves concurrently and propagating the first error.

use chrono::{DateTime, Utc};
use clickhouse::{Client, Row};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::StoreError;
use crate::models::Repository;

#[derive(Debug, Serialize, Row)]
struct RepositoryRow<'a> {
    name: &'a str,
    owner: &'a str,
    stars: u64,
    watchers: u64,
    forks: u64,
    language: &'a str,
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    updated: DateTime<Utc>,
}

#[derive(Debug, Serialize, Row)]
struct AuthorCommitsRow<'a> {
    repository: &'a str,
    author: &'a str,
    commits: u64,
}

#[derive(Debug, Serialize, Row)]
struct PositionRow<'a> {
    repository: &'a str,
    position: u32,
    language: &'a str,
}

/// ClickHouse-backed writer for the `repositories`,
/// `repositories_authors_commits` and `repositories_positions` tables.
pub struct ClickHouseStore {
    host: String,
    port: u16,
    user: String,
    password: String,
    database: String,
    batch_size: usize,
    client: Mutex<Option<Client>>,
}

impl ClickHouseStore {
    pub fn new(host: &str, port: u16, user: &str, password: &str, database: &str, batch_size: usize) -> Self {
        ClickHouseStore {
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: password.to_string(),
            database: database.to_string(),
            batch_size: batch_size.max(1),
            client: Mutex::new(None),
        }
    }

    pub async fn init(&self) {
        let client = Client::default()
            .with_url(format!("http://{}:{}", self.host, self.port))
            .with_user(&self.user)
            .with_password(&self.password)
            .with_database(&self.database);
        *self.client.lock().await = Some(client);
    }

    async fn client(&self) -> Result<Client, StoreError> {
        self.client.lock().await.clone().ok_or(StoreError::NotInitialized)
    }

    pub async fn save_repositories(&self, repositories: &[Repository]) -> Result<(), StoreError> {
        let client = self.client().await?;
        let updated = Utc::now();
        for chunk in repositories.chunks(self.batch_size) {
            let mut insert = client.insert("repositories")?;
            for repo in chunk {
                insert
                    .write(&RepositoryRow {
                        name: &repo.name,
                        owner: &repo.owner,
                        stars: repo.stars,
                        watchers: repo.watchers,
                        forks: repo.forks,
                        language: &repo.language,
                        updated,
                    })
                    .await?;
            }
            insert.end().await?;
        }
        Ok(())
    }

    pub async fn save_commits(&self, repositories: &[Repository]) -> Result<(), StoreError> {
        let client = self.client().await?;
        let rows: Vec<AuthorCommitsRow> = repositories
            .iter()
            .flat_map(|repo| {
                repo.authors_commits_today.iter().map(move |ac| AuthorCommitsRow {
                    repository: &repo.name,
                    author: &ac.author,
                    commits: ac.commits,
                })
            })
            .collect();
        for chunk in rows.chunks(self.batch_size) {
            let mut insert = client.insert("repositories_authors_commits")?;
            for row in chunk {
                insert.write(row).await?;
            }
            insert.end().await?;
        }
        Ok(())
    }

    pub async fn save_positions(&self, repositories: &[Repository]) -> Result<(), StoreError> {
        let client = self.client().await?;
        for chunk in repositories.chunks(self.batch_size) {
            let mut insert = client.insert("repositories_positions")?;
            for repo in chunk {
                insert
                    .write(&PositionRow {
                        repository: &repo.name,
                        position: repo.position,
                        language: &repo.language,
                    })
                    .await?;
            }
            insert.end().await?;
        }
        Ok(())
    }

    /// Runs all three saves concurrently, propagating the first error
    /// encountered (matching `asyncio.gather(..., return_exceptions=True)`
    /// followed by re-raising the first captured exception).
    pub async fn save_repositories_commits_positions(&self, repositories: &[Repository]) -> Result<(), StoreError> {
        info!(count = repositories.len(), "saving repository snapshot");
        let (repos, commits, positions) = tokio::join!(
            self.save_repositories(repositories),
            self.save_commits(repositories),
            self.save_positions(repositories),
        );
        let mut first = None;
        for result in [repos, commits, positions] {
            if let Err(err) = result {
                error!(%err, "failed to save repository snapshot");
                if first.is_none() {
                    first = Some(err);
                }
            }
        }
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub async fn close(&self) {
        *self.client.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uninitialized_store_rejects_saves() {
        let store = ClickHouseStore::new("localhost", 8123, "default", "", "default", 1000);
        let err = store.save_repositories(&[]).await.unwrap_err();
        assert!(matches!(err, StoreError::NotInitialized));
    }

    #[tokio::test]
    async fn close_resets_to_uninitialized() {
        let store = ClickHouseStore::new("localhost", 8123, "default", "", "default", 1000);
        store.init().await;
        store.close().await;
        let err = store.save_repositories(&[]).await.unwrap_err();
        assert!(matches!(err, StoreError::NotInitialized));
    }
}
