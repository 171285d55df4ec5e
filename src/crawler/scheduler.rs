//! Batch scheduler: paced, checkpointed processing of traversal steps
//!
//! This module handles:
//! - Fetching records for discovered races
//! - Checkpointing each identifier once its work is finished
//! - Jitter and inter-batch pauses
//! - Periodic snapshots and the fetched-record cap
//! - Stopping cleanly at an item boundary on cancellation

use crate::config::CrawlerConfig;
use crate::crawler::oracle::{ExistenceOracle, FetchFailure, RecordFetcher};
use crate::crawler::traversal::{StepKind, Traversal};
use crate::identifier::RaceId;
use crate::output::{CrawlStatistics, ResultAggregator};
use crate::state::{pause_duration, PacingState, Pause};
use crate::storage::{CheckpointMark, CheckpointStore};
use crate::FurlongError;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Runs a traversal to completion, cap or cancellation
///
/// Work is strictly sequential: one probe or fetch at a time.
pub struct BatchScheduler {
    config: CrawlerConfig,
    max_items: Option<u32>,
    cancel: CancellationToken,
    pacing: PacingState,
}

impl BatchScheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - Pacing and snapshot settings
    /// * `max_items` - Stop after this many records have been fetched
    /// * `cancel` - Checked between items and during pauses
    pub fn new(config: CrawlerConfig, max_items: Option<u32>, cancel: CancellationToken) -> Self {
        Self {
            config,
            max_items,
            cancel,
            pacing: PacingState::new(),
        }
    }

    /// Processes steps until the traversal ends or the run is stopped
    ///
    /// # Errors
    ///
    /// A failed checkpoint write aborts the run after one best-effort
    /// snapshot of the records collected so far.
    pub async fn run<S, C>(
        &mut self,
        traversal: &mut Traversal,
        service: &mut S,
        store: &mut C,
        aggregator: &mut ResultAggregator,
        stats: &mut CrawlStatistics,
    ) -> Result<(), FurlongError>
    where
        S: ExistenceOracle + RecordFetcher,
        C: CheckpointStore,
    {
        let start_time = Instant::now();
        let result = self
            .run_steps(traversal, service, store, aggregator, stats)
            .await;

        stats.probed = traversal.probes();
        stats.elapsed_secs = start_time.elapsed().as_secs_f64();
        result
    }

    async fn run_steps<S, C>(
        &mut self,
        traversal: &mut Traversal,
        service: &mut S,
        store: &mut C,
        aggregator: &mut ResultAggregator,
        stats: &mut CrawlStatistics,
    ) -> Result<(), FurlongError>
    where
        S: ExistenceOracle + RecordFetcher,
        C: CheckpointStore,
    {
        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Stopping: interrupted");
                stats.cancelled = true;
                return Ok(());
            }

            let Some(step) = traversal.next(service).await else {
                tracing::info!("All places exhausted");
                return Ok(());
            };

            let id = step.id;
            match step.kind {
                StepKind::Checkpointed(mark) => {
                    tracing::debug!("Skipping {} ({})", id, mark.to_log_str());
                    stats.skipped += 1;
                    continue;
                }
                StepKind::Found => {
                    stats.discovered += 1;
                    self.handle_found(id, service, store, aggregator, stats)
                        .await?;
                }
                StepKind::Absent => {
                    tracing::debug!("{} does not exist", id);
                    stats.absent += 1;
                    self.checkpoint(store, aggregator, id, CheckpointMark::Absent)?;
                }
                StepKind::Undetermined => {
                    tracing::warn!("No answer for {}, leaving it for the next run", id);
                    stats.undetermined.push(id);
                }
            }

            let pause = self.pacing.record_item(&self.config);

            if self.pacing.snapshot_due(&self.config) && aggregator.has_unsaved() {
                match aggregator.write_snapshot(self.pacing.processed) {
                    Ok(_) => stats.snapshots_written += 1,
                    Err(e) => tracing::error!("Failed to write snapshot: {}", e),
                }
            }

            if self.pacing.cap_reached(self.max_items) {
                tracing::info!("Stopping: reached {} fetched records", self.pacing.fetched);
                stats.capped = true;
                return Ok(());
            }

            if self.pacing.processed % 10 == 0 {
                tracing::info!(
                    "Progress: {} processed, {} fetched, {} undetermined",
                    self.pacing.processed,
                    self.pacing.fetched,
                    stats.undetermined.len()
                );
            }

            if let Some(pause) = pause {
                if !self.pause(pause).await {
                    tracing::info!("Stopping: interrupted during pause");
                    stats.cancelled = true;
                    return Ok(());
                }
            }
        }
    }

    async fn handle_found<S, C>(
        &mut self,
        id: RaceId,
        service: &mut S,
        store: &mut C,
        aggregator: &mut ResultAggregator,
        stats: &mut CrawlStatistics,
    ) -> Result<(), FurlongError>
    where
        S: RecordFetcher,
        C: CheckpointStore,
    {
        match service.fetch(id).await {
            Ok(record) => {
                tracing::info!("Fetched {} ({} rows)", id, record.rows.len());
                aggregator.insert(record);
                self.pacing.record_fetch();
                stats.fetched += 1;
                self.checkpoint(store, aggregator, id, CheckpointMark::Present)
            }
            Err(FetchFailure::Malformed(reason)) => {
                tracing::warn!("Race {} exists but its page is unusable: {}", id, reason);
                stats.malformed.push(id);
                self.checkpoint(store, aggregator, id, CheckpointMark::Present)
            }
            Err(FetchFailure::Unavailable(reason)) => {
                tracing::warn!("Could not fetch {}: {}", id, reason);
                stats.undetermined.push(id);
                Ok(())
            }
        }
    }

    /// Sleeps for a pause, returning false if cancelled first
    async fn pause(&self, pause: Pause) -> bool {
        let duration = pause_duration(pause, &self.config);
        if duration.is_zero() {
            return true;
        }

        match pause {
            Pause::Batch => tracing::info!("Batch complete, pausing for {:?}", duration),
            Pause::Jitter => tracing::debug!("Jitter pause of {:?}", duration),
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancel.cancelled() => false,
        }
    }

    /// Appends a checkpoint entry, aborting the run if it cannot be made durable
    ///
    /// The item being checkpointed has been probed, so the emergency snapshot
    /// counts it as processed.
    fn checkpoint<C: CheckpointStore>(
        &self,
        store: &mut C,
        aggregator: &mut ResultAggregator,
        id: RaceId,
        mark: CheckpointMark,
    ) -> Result<(), FurlongError> {
        if let Err(e) = store.append(id, mark) {
            tracing::error!("Checkpoint write for {} failed: {}", id, e);
            if !aggregator.is_empty() {
                match aggregator.write_snapshot(self.pacing.processed + 1) {
                    Ok(path) => tracing::info!("Saved emergency snapshot to {}", path.display()),
                    Err(e) => tracing::error!("Emergency snapshot failed: {}", e),
                }
            }
            return Err(e.into());
        }
        Ok(())
    }
}
