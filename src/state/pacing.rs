use crate::config::CrawlerConfig;
use rand::Rng;
use std::time::Duration;

/// A pause the scheduler should take after an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// Short randomized pause to spread load
    Jitter,

    /// Long pause at a batch boundary
    Batch,
}

/// Counts processed items and decides when to pause and snapshot
///
/// Only items that reached the network are counted; identifiers skipped
/// because they were already checkpointed never advance the counters.
#[derive(Debug, Clone, Default)]
pub struct PacingState {
    /// Items that issued a probe in this run
    pub processed: u64,

    /// Records fetched successfully in this run
    pub fetched: u64,
}

impl PacingState {
    /// Creates a new PacingState with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a processed item and returns the pause owed after it
    ///
    /// A batch boundary takes precedence over a jitter boundary that falls
    /// on the same item.
    pub fn record_item(&mut self, config: &CrawlerConfig) -> Option<Pause> {
        self.processed += 1;

        if self.processed % u64::from(config.batch_size) == 0 {
            return Some(Pause::Batch);
        }

        if config.jitter_every > 0 && self.processed % u64::from(config.jitter_every) == 0 {
            return Some(Pause::Jitter);
        }

        None
    }

    /// Records a successful fetch
    pub fn record_fetch(&mut self) {
        self.fetched += 1;
    }

    /// Returns true once the fetched-record cap has been reached
    pub fn cap_reached(&self, max_items: Option<u32>) -> bool {
        max_items.is_some_and(|max| self.fetched >= u64::from(max))
    }

    /// Returns true when the processed count sits on a snapshot boundary
    pub fn snapshot_due(&self, config: &CrawlerConfig) -> bool {
        let every = u64::from(config.batch_size) * u64::from(config.snapshot_multiplier);
        self.processed > 0 && self.processed % every == 0
    }
}

/// Returns the duration of a pause
///
/// Jitter is drawn uniformly from the configured millisecond range.
pub fn pause_duration(pause: Pause, config: &CrawlerConfig) -> Duration {
    match pause {
        Pause::Batch => Duration::from_secs(config.inter_batch_pause_secs),
        Pause::Jitter => {
            let ms = if config.jitter_min_ms >= config.jitter_max_ms {
                config.jitter_min_ms
            } else {
                rand::rng().random_range(config.jitter_min_ms..=config.jitter_max_ms)
            };
            Duration::from_millis(ms)
        }
    }
}
