use crate::types::{AggregatorError, FetchConfig, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Status and body of a provider response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The single HTTP capability every provider adapter uses.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse>;
}

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    fn backoff(&self) -> ExponentialBackoff<backoff::SystemClock> {
        let delay = Duration::from_secs(self.config.retry_delay_seconds);
        ExponentialBackoff {
            current_interval: delay,
            initial_interval: delay,
            max_interval: delay * 16,
            multiplier: 2.0,
            max_elapsed_time: Some(delay * 60),
            ..Default::default()
        }
    }

    async fn send_once(&self, url: &Url) -> Result<HttpResponse> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

fn is_retryable(status: u16) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS.as_u16() || status >= 500
}

/// Strips credentials from the query string before a URL reaches the logs.
fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

#[async_trait]
impl HttpTransport for Fetcher {
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse> {
        let url = Url::parse_with_params(url, query)?;
        let start_time = Instant::now();
        let mut backoff = self.backoff();
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            debug!("GET {} (attempt {})", redacted(&url), attempt + 1);

            match self.send_once(&url).await {
                Ok(response) if is_retryable(response.status) && attempt < self.config.max_retries => {
                    warn!(
                        status = response.status,
                        "Attempt {} for {} returned a retryable status",
                        attempt + 1,
                        redacted(&url)
                    );
                    last_error = Some(AggregatorError::General(format!("HTTP {}", response.status)));
                }
                Ok(response) => {
                    debug!(
                        status = response.status,
                        bytes = response.body.len(),
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Fetched {}",
                        redacted(&url)
                    );
                    return Ok(response);
                }
                Err(e) => {
                    warn!("Attempt {} failed for {}: {}", attempt + 1, redacted(&url), e);
                    last_error = Some(e);
                }
            }

            if attempt < self.config.max_retries {
                match backoff.next_backoff() {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => break,
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AggregatorError::General("Unknown error".to_string())))
    }
}
