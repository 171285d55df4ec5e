//! Existence probes and record fetches against the results service
//!
//! The crawler only ever talks to the service through two traits:
//! [`ExistenceOracle`] answers "does this race exist?" and [`RecordFetcher`]
//! retrieves the results of a race known to exist. [`HttpRaceService`]
//! implements both over HTTP; tests substitute scripted fakes.

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_url, FetchResult, RetryPolicy};
use crate::crawler::parser::{classify_page, parse_race_page, RaceRecord};
use crate::identifier::RaceId;
use crate::state::Verdict;
use crate::{ConfigError, FurlongError};
use reqwest::Client;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Answers whether a race exists
///
/// Implementations do their own retrying. `Unknown` means the answer could
/// not be obtained and must never be read as `Absent`.
#[allow(async_fn_in_trait)]
pub trait ExistenceOracle {
    async fn probe(&mut self, id: RaceId) -> Verdict;
}

/// Retrieves the results of a race
#[allow(async_fn_in_trait)]
pub trait RecordFetcher {
    async fn fetch(&mut self, id: RaceId) -> Result<RaceRecord, FetchFailure>;
}

/// Why a fetch produced no record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    /// The page could not be retrieved; worth trying again on a later run
    #[error("page unavailable: {0}")]
    Unavailable(String),

    /// The page was retrieved but holds no usable results
    #[error("malformed page: {0}")]
    Malformed(String),
}

/// Probes and fetches race pages over HTTP
///
/// A present probe already downloads the page, so its body is kept and
/// handed to the fetch for the same race that normally follows.
#[derive(Debug)]
pub struct HttpRaceService {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
    debug_dir: Option<PathBuf>,
    last_present: Option<(RaceId, String)>,
}

impl HttpRaceService {
    /// Builds the service from configuration
    pub fn new(config: &Config) -> Result<Self, FurlongError> {
        let base_url = Url::parse(&config.service.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.service.base_url, e)))?;
        let client = build_http_client(&config.service, &config.user_agent)?;

        Ok(Self {
            client,
            base_url,
            retry: RetryPolicy::from_config(&config.retry),
            debug_dir: config.output.debug_html_dir(),
            last_present: None,
        })
    }

    /// The results page URL for a race
    pub fn race_url(&self, id: RaceId) -> Result<Url, url::ParseError> {
        self.base_url.join(&format!("{}/", id.encode()))
    }

    /// Downloads a page body, mapping every failure to a description
    async fn download(&self, id: RaceId) -> Result<String, String> {
        let url = self
            .race_url(id)
            .map_err(|e| format!("cannot build URL: {}", e))?;

        match fetch_url(&self.client, &url, &self.retry).await {
            FetchResult::Success {
                final_url,
                status_code,
                body,
            } => {
                if final_url != url.as_str() {
                    tracing::debug!("{} redirected to {}", url, final_url);
                }
                tracing::debug!("Fetched {} (HTTP {})", url, status_code);
                self.save_debug_html(id, &body);
                Ok(body)
            }
            FetchResult::HttpError {
                status_code,
                attempts,
            } => Err(format!(
                "HTTP {} after {} attempt(s)",
                status_code, attempts
            )),
            FetchResult::NetworkError { error, attempts } => {
                Err(format!("{} after {} attempt(s)", error, attempts))
            }
        }
    }

    /// Writes the raw body to the debug directory, if enabled
    ///
    /// Failures are logged and otherwise ignored.
    fn save_debug_html(&self, id: RaceId, body: &str) {
        let Some(dir) = &self.debug_dir else {
            return;
        };

        let path = dir.join(format!("race_{}.html", id));
        let written = fs::create_dir_all(dir).and_then(|_| fs::write(&path, body));
        if let Err(e) = written {
            tracing::warn!("Could not save debug HTML to {}: {}", path.display(), e);
        }
    }
}

impl ExistenceOracle for HttpRaceService {
    async fn probe(&mut self, id: RaceId) -> Verdict {
        self.last_present = None;

        match self.download(id).await {
            Ok(body) => {
                let verdict = classify_page(&body);
                if verdict.is_present() {
                    self.last_present = Some((id, body));
                }
                verdict
            }
            Err(reason) => {
                tracing::warn!("Probe for {} failed: {}", id, reason);
                Verdict::Unknown
            }
        }
    }
}

impl RecordFetcher for HttpRaceService {
    async fn fetch(&mut self, id: RaceId) -> Result<RaceRecord, FetchFailure> {
        let body = match self.last_present.take() {
            Some((cached, body)) if cached == id => body,
            _ => self.download(id).await.map_err(FetchFailure::Unavailable)?,
        };

        parse_race_page(id, &body).map_err(FetchFailure::Malformed)
    }
}
