//! Crawl statistics
//!
//! This module provides the per-run counters the scheduler fills in and
//! the functions that report them, plus the progress report printed by
//! `--status`.

use crate::identifier::{Place, RaceId};
use crate::storage::PlaceProgress;
use serde::Serialize;
use std::collections::BTreeMap;

/// Crawl statistics summary for one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlStatistics {
    /// Year crawled
    pub year: u16,

    /// Places crawled
    pub places: Vec<Place>,

    /// Identifiers the oracle was asked about
    pub probed: u64,

    /// Identifiers the oracle reported present
    pub discovered: u64,

    /// Records fetched and aggregated
    pub fetched: u64,

    /// Identifiers the oracle reported absent
    pub absent: u64,

    /// Identifiers resolved from the checkpoint log
    pub skipped: u64,

    /// Identifiers with no answer; retried on the next run
    pub undetermined: Vec<RaceId>,

    /// Present identifiers whose page held no usable results
    pub malformed: Vec<RaceId>,

    /// Intermediate snapshots written
    pub snapshots_written: u64,

    /// Wall-clock duration in seconds
    pub elapsed_secs: f64,

    /// Stopped by an interrupt
    pub cancelled: bool,

    /// Stopped at the fetched-record cap
    pub capped: bool,
}

impl CrawlStatistics {
    pub fn new(year: u16, places: &[Place]) -> Self {
        Self {
            year,
            places: places.to_vec(),
            ..Self::default()
        }
    }

    /// True when the walk reached its natural end with no gaps
    pub fn is_complete(&self) -> bool {
        !self.cancelled && !self.capped && self.undetermined.is_empty()
    }
}

/// Logs a summary of a run
///
/// Every undetermined identifier is logged individually so gaps can be
/// found in the log after the fact.
pub fn log_statistics(stats: &CrawlStatistics) {
    tracing::info!(
        "Crawl finished in {:.1}s: {} probed, {} discovered, {} fetched, {} absent, {} skipped",
        stats.elapsed_secs,
        stats.probed,
        stats.discovered,
        stats.fetched,
        stats.absent,
        stats.skipped
    );

    for id in &stats.undetermined {
        tracing::warn!("Undetermined: {} (will be retried on the next run)", id);
    }
    for id in &stats.malformed {
        tracing::warn!("Malformed results page: {}", id);
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Year: {}", stats.year);
    println!(
        "  Places: {}",
        stats
            .places
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Duration: {:.1}s", stats.elapsed_secs);
    println!();

    println!("Identifiers:");
    println!("  Probed: {}", stats.probed);
    println!("  Discovered: {}", stats.discovered);
    println!("  Fetched: {}", stats.fetched);
    println!("  Absent: {}", stats.absent);
    println!("  Skipped (checkpointed): {}", stats.skipped);
    println!("  Snapshots written: {}", stats.snapshots_written);
    println!();

    if !stats.undetermined.is_empty() {
        println!("Undetermined ({}):", stats.undetermined.len());
        for id in &stats.undetermined {
            println!("  - {}", id);
        }
        println!();
    }

    if !stats.malformed.is_empty() {
        println!("Malformed ({}):", stats.malformed.len());
        for id in &stats.malformed {
            println!("  - {}", id);
        }
        println!();
    }

    let outcome = if stats.cancelled {
        "interrupted; rerun to resume"
    } else if stats.capped {
        "stopped at the record cap; rerun to continue"
    } else if stats.undetermined.is_empty() {
        "complete"
    } else {
        "complete with gaps; rerun to retry undetermined identifiers"
    };
    println!("Outcome: {}", outcome);
}

/// Prints per-place checkpoint progress for a year
pub fn print_progress(year: u16, places: &[Place], progress: &BTreeMap<Place, PlaceProgress>) {
    println!("=== Progress for {} ===\n", year);

    let mut total_present = 0;
    let mut total_absent = 0;

    for place in places {
        match progress.get(place) {
            Some(p) => {
                total_present += p.present;
                total_absent += p.absent;
                let last = p.last.map(|id| id.to_string()).unwrap_or_default();
                println!(
                    "  {:<14} {:>5} present {:>5} absent   last {}",
                    place.to_string(),
                    p.present,
                    p.absent,
                    last
                );
            }
            None => println!("  {:<14} not started", place.to_string()),
        }
    }

    println!();
    println!(
        "Total: {} present, {} absent",
        total_present, total_absent
    );
}
