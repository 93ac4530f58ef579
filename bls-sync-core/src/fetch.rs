//! Rate-limited, retrying upstream fetcher.
//!
//! Fetches are strictly sequential. The [`Fetcher`] owns the throttle state
//! (start time of the previous request) and is passed by `&mut` through a
//! run, so there is no process-wide session or timer.
//!
//! Every request, retries and the listing request included, waits until at
//! least `rate_limit` has passed since the *start* of the previous request.
//! This bounds the absolute request rate even when responses are slow.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::FetchConfig;
use crate::contract::{HttpResponse, HttpTransport, TransportError, TransportErrorKind, UpstreamEntry};
use crate::error::FetchError;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Spacing between request starts.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_start: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_start: None,
        }
    }

    /// Wait until the next request may start, then record its start.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_start {
            let next = last + self.interval;
            let wait = next.saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                debug!(wait_ms = wait.as_millis() as u64, "[FETCH] Throttling");
                sleep_until(next).await;
            }
        }
        self.last_start = Some(Instant::now());
    }
}

/// Outcome of a single request attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Success(Vec<u8>),
    /// Worth trying again; carries the cause for logging.
    Retryable(String),
    Terminal(FetchError),
}

/// Bounded retries with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff,
        }
    }

    /// Classify one attempt's raw result.
    ///
    /// Timeouts, connection failures, 408, 429 and 5xx are retryable.
    /// 401/403 mean the upstream rejected our identification, 404/410 that
    /// the file is gone; neither is retried.
    pub fn classify(&self, url: &str, result: Result<HttpResponse, TransportError>) -> Attempt {
        match result {
            Ok(resp) => match resp.status {
                200..=299 => Attempt::Success(resp.body),
                401 | 403 => Attempt::Terminal(FetchError::AccessDenied {
                    url: url.to_string(),
                    status: resp.status,
                }),
                404 | 410 => Attempt::Terminal(FetchError::NotFound {
                    url: url.to_string(),
                    status: resp.status,
                }),
                408 | 429 | 500..=599 => Attempt::Retryable(format!("HTTP {}", resp.status)),
                status => Attempt::Terminal(FetchError::Status {
                    url: url.to_string(),
                    status,
                }),
            },
            Err(err) => match err.kind {
                TransportErrorKind::Timeout | TransportErrorKind::Connect | TransportErrorKind::Body => {
                    Attempt::Retryable(err.to_string())
                }
                TransportErrorKind::Other => Attempt::Terminal(FetchError::Request {
                    url: url.to_string(),
                    message: err.message,
                }),
            },
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Body of a successful fetch and how many attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub body: Vec<u8>,
    pub attempts: u32,
}

/// Sequential fetcher over any [`HttpTransport`].
pub struct Fetcher<T> {
    transport: T,
    throttle: Throttle,
    policy: RetryPolicy,
}

impl<T: HttpTransport> Fetcher<T> {
    pub fn new(transport: T, config: &FetchConfig) -> Self {
        Self {
            transport,
            throttle: Throttle::new(config.rate_limit),
            policy: RetryPolicy::from_config(config),
        }
    }

    pub fn with_policy(transport: T, rate_limit: Duration, policy: RetryPolicy) -> Self {
        Self {
            transport,
            throttle: Throttle::new(rate_limit),
            policy,
        }
    }

    /// Fetch the upstream directory listing as text.
    pub async fn fetch_listing(&mut self, url: &str) -> Result<String, FetchError> {
        info!(url = %url, "[FETCH] Fetching upstream listing");
        let fetched = self.fetch_url(url).await?;
        Ok(String::from_utf8_lossy(&fetched.body).into_owned())
    }

    /// Fetch one upstream file.
    pub async fn fetch(&mut self, entry: &UpstreamEntry) -> Result<Fetched, FetchError> {
        self.fetch_url(&entry.url).await
    }

    pub async fn fetch_url(&mut self, url: &str) -> Result<Fetched, FetchError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.throttle.wait().await;
            let result = self.transport.get(url).await;
            match self.policy.classify(url, result) {
                Attempt::Success(body) => {
                    debug!(url = %url, bytes = body.len(), attempt, "[FETCH] Fetched");
                    return Ok(Fetched {
                        body,
                        attempts: attempt,
                    });
                }
                Attempt::Terminal(err) => {
                    warn!(url = %url, attempt, error = %err, "[FETCH] Terminal failure");
                    return Err(err);
                }
                Attempt::Retryable(message) if attempt >= self.policy.max_attempts => {
                    warn!(url = %url, attempt, cause = %message, "[FETCH] Giving up after retries");
                    return Err(FetchError::Transient {
                        url: url.to_string(),
                        attempts: attempt,
                        message,
                    });
                }
                Attempt::Retryable(message) => {
                    let delay = self.policy.backoff_for(attempt);
                    warn!(
                        url = %url,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        cause = %message,
                        backoff_ms = delay.as_millis() as u64,
                        "[FETCH] Transient failure, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Production transport over `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client that identifies itself with the configured User-Agent
    /// and sends any extra headers on every request.
    pub fn new(config: &FetchConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        for (name, value) in &config.extra_headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;
        info!(
            user_agent = %config.user_agent,
            extra_headers = config.extra_headers.len(),
            timeout_secs = config.timeout.as_secs_f64(),
            "Initialized upstream HTTP client"
        );
        Ok(Self { client })
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_body() || err.is_decode() {
        TransportErrorKind::Body
    } else if err.is_request() {
        // Resets surface as request errors.
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other
    };
    TransportError {
        kind,
        message: err.to_string(),
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let resp = self.client.get(url).send().await.map_err(transport_error)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(transport_error)?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
