//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client with a proper user agent string
//! - Retrying transient failures with exponential backoff
//! - Decoding page bodies (the service serves EUC-JP)
//! - Error classification

use crate::config::{RetryConfig, ServiceConfig, UserAgentConfig};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use url::Url;

/// Status codes worth another attempt
pub const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Charset assumed when the response does not declare one
const FALLBACK_CHARSET: &str = "euc-jp";

/// Result of a fetch operation, after retries
#[derive(Debug)]
pub enum FetchResult {
    /// Got a 2xx response and decoded its body
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Decoded page body
        body: String,
    },

    /// Non-2xx status on the last attempt
    HttpError {
        /// The HTTP status code
        status_code: u16,
        /// Attempts made
        attempts: u32,
    },

    /// Transport failure on the last attempt (connect, timeout, body read)
    NetworkError {
        /// Error description
        error: String,
        /// Attempts made
        attempts: u32,
    },
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before retry number `retry` (0 for the first retry)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Returns true for the fixed set of transient status codes
pub fn is_retryable_status(status: StatusCode) -> bool {
    RETRY_STATUSES.contains(&status.as_u16())
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

/// Reads a `Retry-After` header given in seconds
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Builds the user agent string
///
/// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use furlong::config::{ServiceConfig, UserAgentConfig};
/// use furlong::crawler::build_http_client;
///
/// let client = build_http_client(&ServiceConfig::default(), &UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    service: &ServiceConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(user_agent))
        .timeout(Duration::from_secs(service.request_timeout_secs))
        .connect_timeout(Duration::from_secs(service.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, retrying transient failures
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Decode body → Success |
/// | HTTP 429/500/502/503/504 | Retry with backoff (honours `Retry-After`) |
/// | Other non-2xx | Immediate → HttpError |
/// | Connect/timeout/body error | Retry with backoff |
///
/// When attempts run out the last failure is returned.
pub async fn fetch_url(client: &Client, url: &Url, policy: &RetryPolicy) -> FetchResult {
    let mut attempt = 0;

    loop {
        attempt += 1;
        let can_retry = attempt < policy.max_attempts;
        let backoff = policy.backoff(attempt - 1);

        match client.get(url.clone()).send().await {
            Ok(response) => {
                let status = response.status();

                if is_retryable_status(status) && can_retry {
                    let delay = retry_after(&response)
                        .map_or(backoff, |hint| hint.max(backoff))
                        .min(policy.max_backoff);
                    tracing::debug!(
                        "HTTP {} for {} (attempt {}/{}), retrying in {:?}",
                        status.as_u16(),
                        url,
                        attempt,
                        policy.max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }

                if !status.is_success() {
                    return FetchResult::HttpError {
                        status_code: status.as_u16(),
                        attempts: attempt,
                    };
                }

                let final_url = response.url().to_string();
                match response.text_with_charset(FALLBACK_CHARSET).await {
                    Ok(body) => {
                        return FetchResult::Success {
                            final_url,
                            status_code: status.as_u16(),
                            body,
                        }
                    }
                    Err(e) if can_retry => {
                        tracing::debug!("Body read failed for {}: {}, retrying", url, e);
                        tokio::time::sleep(backoff).await;
                    }
                    Err(e) => {
                        return FetchResult::NetworkError {
                            error: e.to_string(),
                            attempts: attempt,
                        }
                    }
                }
            }
            Err(e) if can_retry && is_retryable_error(&e) => {
                tracing::debug!(
                    "Request to {} failed (attempt {}/{}): {}, retrying in {:?}",
                    url,
                    attempt,
                    policy.max_attempts,
                    e,
                    backoff
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    "Request timeout".to_string()
                } else if e.is_connect() {
                    format!("Connection failed: {}", e)
                } else {
                    e.to_string()
                };
                return FetchResult::NetworkError {
                    error,
                    attempts: attempt,
                };
            }
        }
    }
}
