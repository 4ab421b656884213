//! Client for the public Fantasy Premier League API.
//!
//! Every network call goes through [`FplClient::fetch_with_retry`], which
//! consults the outbound limiter before each attempt and backs off
//! exponentially on transient failures. Decoded responses are memoized in a
//! [`TtlCache`] under stable logical keys.

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::config::{CacheConfig, UpstreamConfig};
use crate::domain::{EntryId, Gameweek};
use crate::rate_limit::SlidingWindowLimiter;

pub const USER_AGENT: &str = concat!("fplcup/", env!("CARGO_PKG_VERSION"));

const OUTBOUND_KEY: &str = "default";
const BOOTSTRAP_CACHE_KEY: &str = "bootstrap-static";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Rate limit exceeded for FPL API calls")]
    RateLimited,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("FPL team with ID {0} not found")]
    EntryNotFound(EntryId),

    #[error("Invalid entry ID: {0}")]
    InvalidEntryId(EntryId),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("No current gameweek found")]
    NoGameweeks,
}

impl UpstreamError {
    /// Transport failures, 429 and 5xx are worth another attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status(code) => *code == 429 || (*code >= 500 && *code <= 599),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: Gameweek,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub is_current: bool,

    #[serde(default)]
    pub is_next: bool,

    #[serde(default)]
    pub deadline_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BootstrapData {
    #[serde(default)]
    pub events: Vec<Event>,
}

impl BootstrapData {
    /// First event flagged current, else the first flagged next, else the first listed.
    #[must_use]
    pub fn current_event_id(&self) -> Option<Gameweek> {
        self.events
            .iter()
            .find(|e| e.is_current)
            .or_else(|| self.events.iter().find(|e| e.is_next))
            .or_else(|| self.events.first())
            .map(|e| e.id)
    }

    /// Ids of events whose deadline lies in `[start, end]`.
    #[must_use]
    pub fn gameweeks_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Gameweek> {
        self.events
            .iter()
            .filter(|e| {
                e.deadline_time
                    .is_some_and(|deadline| deadline >= start && deadline <= end)
            })
            .map(|e| e.id)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryRow {
    pub event: Gameweek,
    pub points: i64,
    pub total_points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EntryHistory {
    #[serde(default)]
    pub current: Vec<HistoryRow>,
}

impl EntryHistory {
    /// Points scored in `gameweek`, 0 when the entry has no row for it.
    #[must_use]
    pub fn points_for(&self, gameweek: Gameweek) -> i64 {
        self.current
            .iter()
            .find(|row| row.event == gameweek)
            .map_or(0, |row| row.points)
    }

    /// Cumulative total after the last recorded gameweek.
    #[must_use]
    pub fn season_total(&self) -> i64 {
        self.current.last().map_or(0, |row| row.total_points)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamHealth {
    pub status: HealthStatus,
    pub message: String,
}

/// Read access to the upstream game data.
#[async_trait::async_trait]
pub trait FplApi: Send + Sync {
    async fn bootstrap(&self) -> Result<BootstrapData, UpstreamError>;

    async fn entry_history(&self, entry_id: EntryId) -> Result<EntryHistory, UpstreamError>;

    async fn current_event_id(&self) -> Result<Gameweek, UpstreamError> {
        self.bootstrap()
            .await?
            .current_event_id()
            .ok_or(UpstreamError::NoGameweeks)
    }

    async fn gameweeks_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Gameweek>, UpstreamError> {
        Ok(self.bootstrap().await?.gameweeks_in_range(start, end))
    }

    async fn entry_exists(&self, entry_id: EntryId) -> bool {
        self.entry_history(entry_id).await.is_ok()
    }

    async fn health(&self) -> UpstreamHealth {
        match self.bootstrap().await {
            Ok(_) => UpstreamHealth {
                status: HealthStatus::Ok,
                message: "FPL API is responsive".to_string(),
            },
            Err(e) => UpstreamHealth {
                status: HealthStatus::Error,
                message: format!("FPL API health check failed: {e}"),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

pub struct FplClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    static_ttl: Duration,
    history_ttl: Duration,
    cache: Arc<TtlCache>,
    limiter: Arc<SlidingWindowLimiter>,
}

impl FplClient {
    #[must_use]
    pub fn with_shared_client(
        client: Client,
        upstream: &UpstreamConfig,
        cache_config: &CacheConfig,
    ) -> Self {
        Self {
            client,
            base_url: upstream.base_url.trim_end_matches('/').to_string(),
            timeout: upstream.timeout(),
            retry: RetryPolicy {
                max_attempts: upstream.max_retries.max(1),
                backoff_base: upstream.backoff_base(),
            },
            static_ttl: Duration::from_secs(cache_config.static_ttl_seconds),
            history_ttl: Duration::from_secs(cache_config.history_ttl_seconds),
            cache: Arc::new(TtlCache::new()),
            limiter: Arc::new(SlidingWindowLimiter::new(
                upstream.rate_limit_requests,
                upstream.rate_limit_window(),
            )),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Single GET, no retry.
    pub async fn fetch_json(&self, url: &str) -> Result<Value, UpstreamError> {
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    /// GET with bounded retries and exponential backoff.
    ///
    /// A denial from the outbound limiter ends the call at once with
    /// [`UpstreamError::RateLimited`].
    pub async fn fetch_with_retry(&self, url: &str) -> Result<Value, UpstreamError> {
        let mut last_error = None;

        for attempt in 0..self.retry.max_attempts {
            if !self.limiter.can_make_request(OUTBOUND_KEY) {
                metrics::counter!("upstream_requests_total", "outcome" => "rate_limited")
                    .increment(1);
                return Err(UpstreamError::RateLimited);
            }

            match self.fetch_json(url).await {
                Ok(value) => {
                    metrics::counter!("upstream_requests_total", "outcome" => "success")
                        .increment(1);
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    metrics::counter!("upstream_requests_total", "outcome" => "retryable")
                        .increment(1);
                    warn!(url, attempt = attempt + 1, error = %e, "Upstream request failed");

                    if attempt + 1 < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.delay(attempt)).await;
                    }
                    last_error = Some(e);
                }
                Err(e) => {
                    metrics::counter!("upstream_requests_total", "outcome" => "error")
                        .increment(1);
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| UpstreamError::Transport("no attempt made".to_string())))
    }

    async fn cached<T: DeserializeOwned>(
        &self,
        key: &str,
        path: &str,
        ttl: Duration,
    ) -> Result<T, UpstreamError> {
        if let Some(value) = self.cache.get(key) {
            metrics::counter!("upstream_cache_total", "result" => "hit").increment(1);
            return serde_json::from_value(value).map_err(|e| UpstreamError::Decode(e.to_string()));
        }
        metrics::counter!("upstream_cache_total", "result" => "miss").increment(1);

        debug!(key, "Cache miss, fetching from upstream");
        let value = self.fetch_with_retry(&self.url(path)).await?;
        let decoded = serde_json::from_value(value.clone())
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        self.cache.set(key, value, ttl);
        Ok(decoded)
    }
}

#[async_trait::async_trait]
impl FplApi for FplClient {
    async fn bootstrap(&self) -> Result<BootstrapData, UpstreamError> {
        self.cached(BOOTSTRAP_CACHE_KEY, "bootstrap-static/", self.static_ttl)
            .await
    }

    async fn entry_history(&self, entry_id: EntryId) -> Result<EntryHistory, UpstreamError> {
        if !entry_id.is_queryable() {
            return Err(UpstreamError::InvalidEntryId(entry_id));
        }

        let key = format!("entry-history-{entry_id}");
        let path = format!("entry/{entry_id}/history/");
        self.cached(&key, &path, self.history_ttl)
            .await
            .map_err(|e| match e {
                UpstreamError::NotFound(_) => UpstreamError::EntryNotFound(entry_id),
                other => other,
            })
    }
}
