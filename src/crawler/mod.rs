//! Crawler module for probing and fetching races
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - Existence probes and results-page parsing
//! - The pruning walk over the identifier space
//! - Paced, checkpointed batch processing
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod oracle;
mod parser;
mod scheduler;
mod traversal;

pub use coordinator::{run_crawl, Coordinator};
pub use fetcher::{
    build_http_client, fetch_url, is_retryable_status, user_agent_string, FetchResult,
    RetryPolicy,
};
pub use oracle::{ExistenceOracle, FetchFailure, HttpRaceService, RecordFetcher};
pub use parser::{classify_page, parse_race_page, RaceRecord};
pub use scheduler::BatchScheduler;
pub use traversal::{Step, StepKind, Traversal};
