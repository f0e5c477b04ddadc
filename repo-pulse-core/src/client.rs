//! GitHub REST API client: single-attempt requests, response validation,
//! caching and a retry wrapper around the whole thing.
//!
//! Translated from `original_source/3/src/scraper.py`'s
//! `GithubReposScrapper._make_request` / `_make_request_retry` /
//! `_validate_response`, generalized to a standalone client usable by
//! [`crate::scraper`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::cache::ApiCache;
use crate::error::{ApiError, RetryFailed};
use crate::ratelimit::{RateLimitGuard, ResourceRateLimiter};

const GITHUB_API_BASE_URL: &str = "https://api.github.com";

/// GitHub REST API client. One instance is shared across a scrape run.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    cache: Option<Arc<dyn ApiCache>>,
    limiter: Arc<ResourceRateLimiter>,
    max_retries: u32,
    request_id: AtomicU64,
}

impl ApiClient {
    pub fn new(
        access_token: &str,
        limiter: Arc<ResourceRateLimiter>,
        timeout: Duration,
        max_retries: u32,
        cache: Option<Arc<dyn ApiCache>>,
    ) -> Result<Self, ApiError> {
        Self::with_base_url(
            access_token,
            GITHUB_API_BASE_URL,
            limiter,
            timeout,
            max_retries,
            cache,
        )
    }

    /// Same as [`Self::new`] but against an arbitrary base URL, the way
    /// `cargo-aprz-lib`'s `Provider::new` takes an optional mock-server
    /// override for integration tests.
    pub fn with_base_url(
        access_token: &str,
        base_url: &str,
        limiter: Arc<ResourceRateLimiter>,
        timeout: Duration,
        max_retries: u32,
        cache: Option<Arc<dyn ApiCache>>,
    ) -> Result<Self, ApiError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "application/vnd.github.v3+json".parse().expect("static header value"),
        );
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|e| ApiError::Validation(format!("invalid access token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(ApiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
            limiter,
            max_retries,
            request_id: AtomicU64::new(0),
        })
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Validate an HTTP response against the GitHub error taxonomy,
    /// decoding the body as JSON on success.
    async fn validate_response(response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Value>().await?);
        }

        let remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("1")
            .to_string();
        let reset_time = response
            .headers()
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok());

        let message = match response.json::<Value>().await {
            Ok(body) => body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string(),
            Err(_) => "Failed to parse error response".to_string(),
        };

        Err(match status {
            StatusCode::BAD_REQUEST => ApiError::BadRequest(message),
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
            StatusCode::FORBIDDEN => {
                if remaining == "0" {
                    ApiError::RateLimited { message, reset_time }
                } else {
                    ApiError::Forbidden(message)
                }
            }
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            StatusCode::CONFLICT => ApiError::Conflict(message),
            StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(message),
            s if s.is_server_error() => ApiError::ServerError {
                status: s.as_u16(),
                message,
            },
            s => ApiError::GenericApiError {
                status: s.as_u16(),
                message,
            },
        })
    }

    /// A single request attempt: rate-limited, optionally cached, no retry.
    pub async fn request(
        &self,
        endpoint: &str,
        resource: &str,
        method: Method,
        params: &[(&str, String)],
        cached: bool,
    ) -> Result<Value, ApiError> {
        let request_id = self.next_request_id();
        debug!(request_id, method = %method, endpoint, "issuing request");

        let cache_key = cache_key(&method, endpoint, params);
        if cached {
            if let Some(cache) = &self.cache {
                if let Some(hit) = cache.get(&cache_key).await {
                    debug!(request_id, cache_key, "cache hit");
                    return Ok(hit);
                }
            }
        }

        let guard = RateLimitGuard::acquire(self.limiter.resolve(resource)).await;

        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .http
            .request(method, &url)
            .query(params)
            .send()
            .await
            .map_err(ApiError::from)?;
        let data = Self::validate_response(response).await;

        guard.release().await;

        let data = data?;
        if cached {
            if let Some(cache) = &self.cache {
                cache
                    .set(cache_key, data.clone(), Some(Duration::from_secs(15 * 60)))
                    .await;
            }
        }
        Ok(data)
    }

    /// Retries [`Self::request`] against the GitHub-specific retry policy:
    /// server errors (5xx) back off exponentially (`2^retry` seconds),
    /// rate limits (403 + remaining=0) wait out the reset window (bounded
    /// by `wait_reset_sec_max`), everything else fails immediately.
    pub async fn request_with_retry(
        &self,
        endpoint: &str,
        resource: &str,
        method: Method,
        params: &[(&str, String)],
        max_retries: u32,
        wait_reset_sec_max: i64,
    ) -> Result<Value, RetryFailed> {
        let max_retries = if max_retries == 0 { self.max_retries } else { max_retries };

        for retry in 0..max_retries {
            match self.request(endpoint, resource, method.clone(), params, false).await {
                Ok(data) => return Ok(data),
                Err(ApiError::RateLimited { message, reset_time }) => {
                    if retry == max_retries - 1 {
                        return Err(RetryFailed::new(ApiError::RateLimited { message, reset_time }));
                    }
                    match reset_time {
                        Some(reset) if reset - Utc::now().timestamp() > wait_reset_sec_max => {
                            return Err(RetryFailed::new(ApiError::RateLimited {
                                message,
                                reset_time: Some(reset),
                            }));
                        }
                        Some(reset) => {
                            let wait = reset - Utc::now().timestamp() + 1;
                            if wait > 0 {
                                warn!(wait_secs = wait, "rate limited, sleeping until reset");
                                tokio::time::sleep(Duration::from_secs(wait as u64)).await;
                                continue;
                            }
                        }
                        None => {}
                    }
                }
                Err(err @ ApiError::ServerError { .. }) => {
                    error!(attempt = retry + 1, total = max_retries, %err, "server error");
                    if retry == max_retries - 1 {
                        return Err(RetryFailed::new(err));
                    }
                    tokio::time::sleep(Duration::from_secs(2u64.pow(retry))).await;
                }
                Err(err) => {
                    error!(%err, "request failed, not retrying");
                    return Err(RetryFailed::new(err));
                }
            }
        }
        unreachable!("loop always returns on its last iteration")
    }
}

/// Canonical cache key: method, endpoint and sorted-by-key, JSON-encoded
/// params, matching `f"{method}:{endpoint}:{json.dumps(params, sort_keys=True)}"`.
fn cache_key(method: &Method, endpoint: &str, params: &[(&str, String)]) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    let obj: serde_json::Map<String, Value> = sorted
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
        .collect();
    format!("{method}:{endpoint}:{}", Value::Object(obj))
}
