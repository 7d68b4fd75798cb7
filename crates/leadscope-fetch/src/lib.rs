//! Paced HTTP fetch utilities for talking to the upstream search API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "leadscope-fetch";

/// How a non-success response should be reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    InvalidCredentials,
    RateLimited,
    Upstream,
    Client,
}

pub fn classify_status(status: StatusCode) -> StatusClass {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        StatusClass::InvalidCredentials
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        StatusClass::RateLimited
    } else if status.is_server_error() {
        StatusClass::Upstream
    } else {
        StatusClass::Client
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub global_concurrency: usize,
    pub token_bucket: Option<TokenBucketConfig>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
            global_concurrency: 4,
            token_bucket: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenBucketConfig {
    pub capacity: u32,
    pub refill_every: Duration,
}

#[derive(Debug)]
pub struct SimpleTokenBucket {
    capacity: u32,
    refill_every: Duration,
    state: Mutex<TokenBucketState>,
}

#[derive(Debug, Clone, Copy)]
struct TokenBucketState {
    tokens: u32,
    last_refill: Instant,
}

impl SimpleTokenBucket {
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        Self {
            capacity,
            refill_every,
            state: Mutex::new(TokenBucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub async fn take(&self) {
        if self.refill_every.is_zero() {
            return;
        }
        loop {
            let mut state = self.state.lock().await;
            let elapsed = state.last_refill.elapsed();
            if elapsed >= self.refill_every {
                let refills = (elapsed.as_nanos() / self.refill_every.as_nanos())
                    .min(u128::from(u32::MAX)) as u32;
                state.tokens = state.tokens.saturating_add(refills).min(self.capacity);
                state.last_refill = Instant::now();
            }

            if state.tokens > 0 {
                state.tokens -= 1;
                return;
            }

            let sleep_for = self.refill_every;
            drop(state);
            tokio::time::sleep(sleep_for).await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid credentials for {url} (http {status})")]
    InvalidCredentials { status: u16, url: String },
    #[error("rate limited by {url}")]
    RateLimited { url: String },
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    global_limit: Arc<Semaphore>,
    token_bucket: Option<Arc<SimpleTokenBucket>>,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        let token_bucket = config
            .token_bucket
            .map(|c| Arc::new(SimpleTokenBucket::new(c.capacity, c.refill_every)));

        Ok(Self {
            client,
            global_limit: Arc::new(Semaphore::new(config.global_concurrency.max(1))),
            token_bucket,
        })
    }

    /// Single paced GET. Non-success statuses map onto typed `FetchError`s;
    /// callers decide what a failure means for their batch.
    pub async fn get_with_query(
        &self,
        run_id: Uuid,
        provider_id: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<FetchedResponse, FetchError> {
        let _permit = self
            .global_limit
            .acquire()
            .await
            .expect("semaphore not closed");

        if let Some(bucket) = &self.token_bucket {
            bucket.take().await;
        }

        let span = info_span!("http_fetch", %run_id, provider_id, url);
        async move {
            let resp = self.client.get(url).query(query).send().await?;
            let status = resp.status();
            let final_url = resp.url().to_string();
            debug!(status = status.as_u16(), "search api responded");

            if status.is_success() {
                let body = resp.bytes().await?.to_vec();
                return Ok(FetchedResponse {
                    status,
                    final_url,
                    body,
                });
            }

            // final_url carries the api key as a query param; report the bare endpoint
            let url = url.to_string();
            Err(match classify_status(status) {
                StatusClass::InvalidCredentials => FetchError::InvalidCredentials {
                    status: status.as_u16(),
                    url,
                },
                StatusClass::RateLimited => FetchError::RateLimited { url },
                StatusClass::Upstream | StatusClass::Client => FetchError::HttpStatus {
                    status: status.as_u16(),
                    url,
                },
            })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes_cover_credentials_and_rate_limits() {
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED), StatusClass::InvalidCredentials);
        assert_eq!(classify_status(StatusCode::FORBIDDEN), StatusClass::InvalidCredentials);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), StatusClass::RateLimited);
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), StatusClass::Upstream);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), StatusClass::Client);
    }

    #[tokio::test]
    async fn token_bucket_drains_then_waits_for_refill() {
        let bucket = SimpleTokenBucket::new(2, Duration::from_millis(20));
        let started = Instant::now();
        bucket.take().await;
        bucket.take().await;
        bucket.take().await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn zero_refill_interval_never_waits() {
        let bucket = SimpleTokenBucket::new(1, Duration::ZERO);
        for _ in 0..5 {
            bucket.take().await;
        }
    }

    #[test]
    fn fetcher_builds_with_defaults() {
        let fetcher = HttpFetcher::new(HttpClientConfig {
            user_agent: Some("leadscope-test/0.1".into()),
            token_bucket: Some(TokenBucketConfig {
                capacity: 1,
                refill_every: Duration::from_secs(1),
            }),
            ..Default::default()
        });
        assert!(fetcher.is_ok());
    }
}
