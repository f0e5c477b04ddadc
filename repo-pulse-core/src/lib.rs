pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod ratelimit;
pub mod scraper;
pub mod store;
pub mod usecase;
pub mod views;

pub use config::Config;
pub use error::{ApiError, DevStatsError, RetryFailed, ScrapeError, StoreError};
pub use models::{Repository, RepositoryAuthorCommits};
