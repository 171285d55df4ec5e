//! Output module for crawl results and reports
//!
//! This module handles:
//! - Collecting fetched race records in memory
//! - Writing CSV + JSON snapshots without ever overwriting earlier files
//! - Recording and printing crawl statistics

mod aggregator;
mod snapshot;
pub mod stats;

pub use aggregator::{ResultAggregator, SnapshotContext};
pub use snapshot::{render_csv, write_snapshot_files, SnapshotKind, SnapshotMetadata};
pub use stats::{log_statistics, print_progress, print_statistics, CrawlStatistics};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No free file name for snapshot {0}")]
    NamesExhausted(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
