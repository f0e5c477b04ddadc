//! Error taxonomy for the ingestion pipeline.
//!
//! Mirrors the upstream GitHub API error classes one-to-one so that the
//! retry policy in [`crate::client`] can match on them directly, then
//! aggregates everything into one crate-wide [`DevStatsError`] for the
//! CLI binaries, the same way the Go-derived core previously collapsed
//! every subsystem error into a single enum at the binary boundary.

use std::fmt;

/// Errors returned by a single (non-retrying) API request attempt.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Validation(String),
    RateLimited {
        message: String,
        reset_time: Option<i64>,
    },
    ServerError {
        status: u16,
        message: String,
    },
    GenericApiError {
        status: u16,
        message: String,
    },
    Transport(reqwest::Error),
    Decode(serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::BadRequest(_) => Some(400),
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Forbidden(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::Conflict(_) => Some(409),
            ApiError::Validation(_) => Some(422),
            ApiError::RateLimited { .. } => Some(403),
            ApiError::ServerError { status, .. } => Some(*status),
            ApiError::GenericApiError { status, .. } => Some(*status),
            ApiError::Transport(_) | ApiError::Decode(_) => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "GitHub API bad request: {msg}"),
            ApiError::Unauthorized(msg) => write!(f, "GitHub API unauthorized: {msg}"),
            ApiError::Forbidden(msg) => write!(f, "GitHub API forbidden: {msg}"),
            ApiError::NotFound(msg) => write!(f, "GitHub API not found: {msg}"),
            ApiError::Conflict(msg) => write!(f, "GitHub API conflict: {msg}"),
            ApiError::Validation(msg) => write!(f, "GitHub API validation error: {msg}"),
            ApiError::RateLimited { message, reset_time } => write!(
                f,
                "GitHub API rate limited: {message} (reset={reset_time:?})"
            ),
            ApiError::ServerError { status, message } => {
                write!(f, "GitHub API server error {status}: {message}")
            }
            ApiError::GenericApiError { status, message } => {
                write!(f, "GitHub API error {status}: {message}")
            }
            ApiError::Transport(err) => write!(f, "transport error: {err}"),
            ApiError::Decode(err) => write!(f, "response decode error: {err}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Transport(err) => Some(err),
            ApiError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err)
    }
}

/// Raised by `request_with_retry` once retries are exhausted or the
/// underlying error is classified as non-retriable.
#[derive(Debug)]
pub struct RetryFailed(pub Box<ApiError>);

impl fmt::Display for RetryFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retry failed: {}", self.0)
    }
}

impl std::error::Error for RetryFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

impl RetryFailed {
    pub fn new(err: ApiError) -> Self {
        RetryFailed(Box::new(err))
    }
}

/// Scrape-orchestrator-local errors (argument validation).
#[derive(Debug)]
pub enum ScrapeError {
    InvalidArgument(String),
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrapeError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for ScrapeError {}

/// Analytical-store-writer errors.
#[derive(Debug)]
pub enum StoreError {
    NotInitialized,
    Query(clickhouse::error::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotInitialized => {
                write!(f, "store client not initialized: call init() first")
            }
            StoreError::Query(err) => write!(f, "ClickHouse query error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Query(err) => Some(err),
            _ => None,
        }
    }
}

impl From<clickhouse::error::Error> for StoreError {
    fn from(err: clickhouse::error::Error) -> Self {
        StoreError::Query(err)
    }
}

/// Crate-wide error used at binary boundaries, aggregating every
/// subsystem's error type the way the single upstream `DevStatsError`
/// used to, but generalized to the richer taxonomy this domain needs.
#[derive(Debug)]
pub enum DevStatsError {
    Api(ApiError),
    Retry(RetryFailed),
    Scrape(ScrapeError),
    Store(StoreError),
    Config(String),
    Io(std::io::Error),
    Generic(String),
}

impl fmt::Display for DevStatsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DevStatsError::Api(err) => write!(f, "{err}"),
            DevStatsError::Retry(err) => write!(f, "{err}"),
            DevStatsError::Scrape(err) => write!(f, "{err}"),
            DevStatsError::Store(err) => write!(f, "{err}"),
            DevStatsError::Config(msg) => write!(f, "configuration error: {msg}"),
            DevStatsError::Io(err) => write!(f, "I/O error: {err}"),
            DevStatsError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for DevStatsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DevStatsError::Api(err) => Some(err),
            DevStatsError::Retry(err) => Some(err),
            DevStatsError::Scrape(err) => Some(err),
            DevStatsError::Store(err) => Some(err),
            DevStatsError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ApiError> for DevStatsError {
    fn from(err: ApiError) -> Self {
        DevStatsError::Api(err)
    }
}

impl From<RetryFailed> for DevStatsError {
    fn from(err: RetryFailed) -> Self {
        DevStatsError::Retry(err)
    }
}

impl From<ScrapeError> for DevStatsError {
    fn from(err: ScrapeError) -> Self {
        DevStatsError::Scrape(err)
    }
}

impl From<StoreError> for DevStatsError {
    fn from(err: StoreError) -> Self {
        DevStatsError::Store(err)
    }
}

impl From<std::io::Error> for DevStatsError {
    fn from(err: std::io::Error) -> Self {
        DevStatsError::Io(err)
    }
}

impl From<String> for DevStatsError {
    fn from(err: String) -> Self {
        DevStatsError::Generic(err)
    }
}

pub type Result<T, E = DevStatsError> = std::result::Result<T, E>;
