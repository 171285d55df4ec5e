//! Crawler coordinator - main crawl orchestration logic
//!
//! This module wires the pieces of a run together:
//! - Opening the checkpoint log and applying any requested reset
//! - Building the HTTP service
//! - Driving the traversal through the batch scheduler
//! - Writing the final snapshot and reporting statistics

use crate::config::{validate_config, validate_plan, Config, RunPlan};
use crate::crawler::oracle::HttpRaceService;
use crate::crawler::scheduler::BatchScheduler;
use crate::crawler::traversal::Traversal;
use crate::output::{log_statistics, CrawlStatistics, ResultAggregator, SnapshotContext};
use crate::storage::{CheckpointStore, FileCheckpointStore};
use crate::FurlongError;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    plan: RunPlan,
    config_hash: String,
    store: FileCheckpointStore,
    service: HttpRaceService,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Entries for the plan's `reset_places` in the plan's year are removed
    /// from the checkpoint log here, before anything is crawled.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `plan` - What to crawl
    /// * `config_hash` - Hash of the configuration, recorded in snapshots
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(FurlongError)` - Failed to initialize
    pub fn new(config: Config, plan: RunPlan, config_hash: String) -> Result<Self, FurlongError> {
        validate_config(&config)?;
        validate_plan(&plan)?;

        let checkpoint_path = config.output.checkpoint_path(plan.year);
        let mut store = FileCheckpointStore::open(&checkpoint_path)?;
        tracing::info!("Using checkpoint log {}", checkpoint_path.display());

        if !plan.reset_places.is_empty() {
            let year = plan.year;
            let reset = &plan.reset_places;
            let removed =
                store.reset_subset(&|id| id.year() == year && reset.contains(&id.place()))?;
            tracing::info!(
                "Reset {} checkpoint entries for {} place(s) in {}",
                removed,
                reset.len(),
                year
            );
        }

        let service = HttpRaceService::new(&config)?;

        Ok(Self {
            config,
            plan,
            config_hash,
            store,
            service,
            cancel: CancellationToken::new(),
        })
    }

    /// Replaces the cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Checkpoint log in use
    pub fn checkpoint_path(&self) -> &Path {
        self.store.path()
    }

    /// Runs the crawl to completion, cap or cancellation
    ///
    /// A final snapshot is written whenever any records were fetched,
    /// including after an interrupt.
    pub async fn run(&mut self) -> Result<CrawlStatistics, FurlongError> {
        let done = self.store.load()?;
        let mut traversal = Traversal::new(self.plan.year, &self.plan.places, &done);

        tracing::info!(
            "Starting crawl of {} for {} place(s), {} identifiers already checkpointed",
            self.plan.year,
            self.plan.places.len(),
            done.restricted_to(self.plan.year, &self.plan.places).len()
        );

        let mut aggregator = ResultAggregator::new(
            self.config.output.directory.clone(),
            SnapshotContext {
                year: self.plan.year,
                places: self.plan.places.clone(),
                config_hash: self.config_hash.clone(),
            },
        );
        let mut scheduler = BatchScheduler::new(
            self.config.crawler.clone(),
            self.plan.max_items,
            self.cancel.clone(),
        );
        let mut stats = CrawlStatistics::new(self.plan.year, &self.plan.places);

        scheduler
            .run(
                &mut traversal,
                &mut self.service,
                &mut self.store,
                &mut aggregator,
                &mut stats,
            )
            .await?;

        match aggregator.write_final(&stats) {
            Ok(Some(_)) => {}
            Ok(None) => tracing::info!("No new records fetched, skipping final snapshot"),
            Err(e) => {
                tracing::error!("Failed to write final snapshot: {}", e);
                return Err(e.into());
            }
        }

        log_statistics(&stats);
        Ok(stats)
    }
}

/// Runs a complete crawl operation
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `plan` - What to crawl
/// * `config_hash` - Hash of the configuration, recorded in snapshots
/// * `cancel` - Stops the run at the next item boundary when cancelled
pub async fn run_crawl(
    config: Config,
    plan: RunPlan,
    config_hash: String,
    cancel: CancellationToken,
) -> Result<CrawlStatistics, FurlongError> {
    let mut coordinator = Coordinator::new(config, plan, config_hash)?.with_cancellation(cancel);
    coordinator.run().await
}
