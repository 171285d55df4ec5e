use crate::identifier::Place;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Furlong
///
/// Every section is optional in the TOML file; missing keys take the
/// defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub retry: RetryConfig,
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Remote results service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL that race identifiers are joined onto (must end in '/')
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://db.netkeiba.com/race/".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Transport retry policy for transient failures
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry
    #[serde(rename = "initial-backoff-ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single backoff delay
    #[serde(rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 1000,
            max_backoff_ms: 120_000,
        }
    }
}

/// Pacing and batching of crawl work
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Processed items between long pauses
    #[serde(rename = "batch-size")]
    pub batch_size: u32,

    /// Long pause after each batch (seconds)
    #[serde(rename = "inter-batch-pause-secs")]
    pub inter_batch_pause_secs: u64,

    /// Processed items between short randomized pauses (0 disables)
    #[serde(rename = "jitter-every")]
    pub jitter_every: u32,

    /// Lower bound of the randomized pause (milliseconds)
    #[serde(rename = "jitter-min-ms")]
    pub jitter_min_ms: u64,

    /// Upper bound of the randomized pause (milliseconds)
    #[serde(rename = "jitter-max-ms")]
    pub jitter_max_ms: u64,

    /// Batches between result snapshots
    #[serde(rename = "snapshot-multiplier")]
    pub snapshot_multiplier: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            inter_batch_pause_secs: 45,
            jitter_every: 10,
            jitter_min_ms: 3000,
            jitter_max_ms: 7000,
            snapshot_multiplier: 10,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "Furlong".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/furlong".to_string(),
            contact_email: "crawler@example.com".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for the checkpoint log, snapshots and final results
    pub directory: PathBuf,

    /// Keep raw page bodies under `<directory>/debug_html`
    #[serde(rename = "save-debug-html")]
    pub save_debug_html: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("race_data"),
            save_debug_html: false,
        }
    }
}

impl OutputConfig {
    /// Path of the checkpoint log for a year
    pub fn checkpoint_path(&self, year: u16) -> PathBuf {
        self.directory.join(format!("progress_{}.txt", year))
    }

    /// Directory for raw page bodies, when enabled
    pub fn debug_html_dir(&self) -> Option<PathBuf> {
        self.save_debug_html
            .then(|| self.directory.join("debug_html"))
    }
}

/// What a single invocation should crawl
///
/// Built from command-line flags; see `parse_places` for place parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    /// Year to crawl
    pub year: u16,

    /// Places to crawl, in code order, without duplicates
    pub places: Vec<Place>,

    /// Stop after this many records have been fetched
    pub max_items: Option<u32>,

    /// Places whose checkpoint entries for `year` are dropped before crawling
    pub reset_places: Vec<Place>,
}

impl RunPlan {
    /// A plan covering every place with no cap and no reset
    pub fn all_places(year: u16) -> Self {
        Self {
            year,
            places: Place::ALL.to_vec(),
            max_items: None,
            reset_places: Vec::new(),
        }
    }
}
