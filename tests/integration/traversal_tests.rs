//! Integration tests for the pruning walk and the batch scheduler
//!
//! These tests drive the real traversal, scheduler, checkpoint log and
//! aggregator against a scripted service, so every oracle call can be
//! counted and every pruning decision checked.

use furlong::config::CrawlerConfig;
use furlong::crawler::{
    BatchScheduler, ExistenceOracle, FetchFailure, RaceRecord, RecordFetcher, Traversal,
};
use furlong::output::{CrawlStatistics, ResultAggregator, SnapshotContext};
use furlong::storage::{CheckpointMark, CheckpointStore, FileCheckpointStore};
use furlong::{Place, RaceId, Verdict};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Answers from a script; anything not scripted is absent
#[derive(Default)]
struct ScriptedService {
    verdicts: HashMap<RaceId, Verdict>,
    fetch_failures: HashMap<RaceId, FetchFailure>,
    cancel_on: Option<(RaceId, CancellationToken)>,
    calls: Vec<RaceId>,
    fetches: Vec<RaceId>,
}

impl ScriptedService {
    fn with_present(ids: &[RaceId]) -> Self {
        let mut service = Self::default();
        for id in ids {
            service.verdicts.insert(*id, Verdict::Present);
        }
        service
    }

    fn set(&mut self, id: RaceId, verdict: Verdict) {
        self.verdicts.insert(id, verdict);
    }
}

impl ExistenceOracle for ScriptedService {
    async fn probe(&mut self, id: RaceId) -> Verdict {
        self.calls.push(id);
        if let Some((trigger, token)) = &self.cancel_on {
            if *trigger == id {
                token.cancel();
            }
        }
        self.verdicts.get(&id).copied().unwrap_or(Verdict::Absent)
    }
}

impl RecordFetcher for ScriptedService {
    async fn fetch(&mut self, id: RaceId) -> Result<RaceRecord, FetchFailure> {
        self.fetches.push(id);
        if let Some(failure) = self.fetch_failures.get(&id) {
            return Err(failure.clone());
        }
        Ok(RaceRecord {
            race_id: id,
            race_name: None,
            headers: vec!["着順".to_string(), "馬名".to_string()],
            rows: vec![vec!["1".to_string(), format!("Horse {}", id.race())]],
            horse_ids: vec![],
        })
    }
}

fn tokyo(meeting: u8, day: u8, race: u8) -> RaceId {
    RaceId::new(2024, Place::Tokyo, meeting, day, race)
}

fn quiet_config() -> CrawlerConfig {
    CrawlerConfig {
        batch_size: 3,
        inter_batch_pause_secs: 0,
        jitter_every: 0,
        jitter_min_ms: 0,
        jitter_max_ms: 0,
        snapshot_multiplier: 1000,
    }
}

/// One run against a checkpoint log in `dir`
struct Harness {
    dir: TempDir,
    config: CrawlerConfig,
    max_items: Option<u32>,
    cancel: CancellationToken,
    places: Vec<Place>,
}

impl Harness {
    fn new(places: &[Place]) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            config: quiet_config(),
            max_items: None,
            cancel: CancellationToken::new(),
            places: places.to_vec(),
        }
    }

    fn store(&self) -> FileCheckpointStore {
        FileCheckpointStore::open(&self.dir.path().join("progress_2024.txt")).unwrap()
    }

    async fn run(&self, service: &mut ScriptedService) -> (CrawlStatistics, ResultAggregator) {
        let mut store = self.store();
        let done = store.load().unwrap();
        let mut traversal = Traversal::new(2024, &self.places, &done);
        let mut aggregator = ResultAggregator::new(
            self.dir.path(),
            SnapshotContext {
                year: 2024,
                places: self.places.clone(),
                config_hash: "test".to_string(),
            },
        );
        let mut stats = CrawlStatistics::new(2024, &self.places);
        let mut scheduler =
            BatchScheduler::new(self.config.clone(), self.max_items, self.cancel.clone());

        scheduler
            .run(
                &mut traversal,
                service,
                &mut store,
                &mut aggregator,
                &mut stats,
            )
            .await
            .unwrap();

        (stats, aggregator)
    }
}

#[tokio::test]
async fn test_end_to_end_single_place() {
    let present: Vec<_> = (1..=5).map(|r| tokyo(1, 1, r)).collect();
    let mut service = ScriptedService::with_present(&present);
    let harness = Harness::new(&[Place::Tokyo]);

    let (stats, aggregator) = harness.run(&mut service).await;

    assert_eq!(
        service.calls,
        vec![
            tokyo(1, 1, 1),
            tokyo(1, 1, 2),
            tokyo(1, 1, 3),
            tokyo(1, 1, 4),
            tokyo(1, 1, 5),
            tokyo(1, 1, 6),
            tokyo(1, 2, 1),
            tokyo(2, 1, 1),
        ]
    );
    assert!(service.calls.iter().all(|id| id.meeting() <= 2));

    assert_eq!(stats.probed, 8);
    assert_eq!(stats.discovered, 5);
    assert_eq!(stats.fetched, 5);
    assert_eq!(stats.absent, 3);
    assert!(stats.is_complete());

    let ids: Vec<RaceId> = aggregator.records().map(|r| r.race_id).collect();
    assert_eq!(ids, present);

    let done = harness.store().load().unwrap();
    assert_eq!(done.len(), 8);
    assert_eq!(done.get(&tokyo(1, 1, 6)), Some(CheckpointMark::Absent));
    assert_eq!(done.get(&tokyo(1, 1, 5)), Some(CheckpointMark::Present));
}

#[tokio::test]
async fn test_meeting_level_pruning() {
    let mut service = ScriptedService::with_present(&[
        tokyo(1, 1, 1),
        tokyo(2, 1, 1),
        RaceId::new(2024, Place::Nakayama, 1, 1, 1),
    ]);
    let harness = Harness::new(&[Place::Tokyo, Place::Nakayama]);

    harness.run(&mut service).await;

    let tokyo_calls: Vec<_> = service
        .calls
        .iter()
        .filter(|id| id.place() == Place::Tokyo)
        .collect();
    assert!(tokyo_calls.iter().all(|id| id.meeting() <= 3));
    assert_eq!(
        tokyo_calls.iter().filter(|id| id.meeting() == 3).count(),
        1
    );
    assert!(service
        .calls
        .contains(&RaceId::new(2024, Place::Nakayama, 1, 1, 1)));
}

#[tokio::test]
async fn test_day_level_pruning() {
    let mut present = vec![tokyo(1, 1, 1)];
    present.extend((1..=4).map(|d| tokyo(2, d, 1)));
    present.push(tokyo(3, 1, 1));
    let mut service = ScriptedService::with_present(&present);
    let harness = Harness::new(&[Place::Tokyo]);

    harness.run(&mut service).await;

    assert!(service.calls.contains(&tokyo(2, 5, 1)));
    assert!(!service
        .calls
        .iter()
        .any(|id| id.meeting() == 2 && id.day() == 5 && id.race() > 1));
    assert!(!service
        .calls
        .iter()
        .any(|id| id.meeting() == 2 && id.day() > 5));
    assert!(service.calls.contains(&tokyo(3, 1, 1)));
}

#[tokio::test]
async fn test_race_level_pruning() {
    let mut present = vec![tokyo(1, 1, 1), tokyo(1, 2, 1)];
    present.extend((1..=6).map(|r| tokyo(1, 3, r)));
    present.push(tokyo(1, 4, 1));
    let mut service = ScriptedService::with_present(&present);
    let harness = Harness::new(&[Place::Tokyo]);

    harness.run(&mut service).await;

    assert!(service.calls.contains(&tokyo(1, 3, 7)));
    assert!(!service
        .calls
        .iter()
        .any(|id| id.meeting() == 1 && id.day() == 3 && id.race() > 7));
    assert!(service.calls.contains(&tokyo(1, 4, 1)));
}

#[tokio::test]
async fn test_unknown_is_never_treated_as_absent() {
    let mut service = ScriptedService::with_present(&[tokyo(1, 1, 1), tokyo(1, 1, 3)]);
    service.set(tokyo(1, 1, 2), Verdict::Unknown);
    service.set(tokyo(2, 1, 1), Verdict::Unknown);
    let harness = Harness::new(&[Place::Tokyo]);

    let (stats, _) = harness.run(&mut service).await;

    // Race 3 is still reached after the gap at race 2
    assert!(service.calls.contains(&tokyo(1, 1, 3)));
    // An unknown meeting opener does not end the place
    assert!(service.calls.contains(&tokyo(2, 1, 2)));
    assert!(service.calls.contains(&tokyo(3, 1, 1)));

    assert_eq!(stats.undetermined, vec![tokyo(1, 1, 2), tokyo(2, 1, 1)]);
    assert!(!stats.is_complete());

    let done = harness.store().load().unwrap();
    assert!(!done.contains(&tokyo(1, 1, 2)));
    assert!(!done.contains(&tokyo(2, 1, 1)));
    assert!(done.contains(&tokyo(1, 1, 3)));
}

#[tokio::test]
async fn test_undetermined_ids_are_retried_on_the_next_run() {
    let mut service = ScriptedService::with_present(&[tokyo(1, 1, 1)]);
    service.set(tokyo(1, 1, 2), Verdict::Unknown);
    let harness = Harness::new(&[Place::Tokyo]);
    harness.run(&mut service).await;

    let mut second = ScriptedService::with_present(&[tokyo(1, 1, 1), tokyo(1, 1, 2)]);
    let (stats, _) = harness.run(&mut second).await;

    assert_eq!(second.calls[0], tokyo(1, 1, 2));
    assert_eq!(second.fetches, vec![tokyo(1, 1, 2)]);
    assert!(stats.undetermined.is_empty());
}

#[tokio::test]
async fn test_resume_after_cap_matches_uninterrupted_run() {
    let mut present: Vec<_> = (1..=5).map(|r| tokyo(1, 1, r)).collect();
    present.extend((1..=3).map(|r| tokyo(1, 2, r)));
    present.extend((1..=2).map(|r| tokyo(2, 1, r)));

    let mut reference = ScriptedService::with_present(&present);
    let full = Harness::new(&[Place::Tokyo]);
    full.run(&mut reference).await;

    let mut harness = Harness::new(&[Place::Tokyo]);
    harness.max_items = Some(4);
    let mut first = ScriptedService::with_present(&present);
    let (first_stats, _) = harness.run(&mut first).await;
    assert!(first_stats.capped);
    assert_eq!(first.fetches.len(), 4);

    harness.max_items = None;
    let mut second = ScriptedService::with_present(&present);
    let (second_stats, _) = harness.run(&mut second).await;
    assert!(second_stats.is_complete());
    assert_eq!(second_stats.skipped, 4);

    let first_calls: HashSet<_> = first.calls.iter().collect();
    assert!(second.calls.iter().all(|id| !first_calls.contains(id)));

    let mut fetched = first.fetches.clone();
    fetched.extend(second.fetches.iter().copied());
    assert_eq!(fetched, reference.fetches);
    assert_eq!(
        first.calls.len() + second.calls.len(),
        reference.calls.len()
    );
}

#[tokio::test]
async fn test_fully_checkpointed_run_makes_no_calls() {
    let present: Vec<_> = (1..=5).map(|r| tokyo(1, 1, r)).collect();
    let harness = Harness::new(&[Place::Tokyo]);
    harness
        .run(&mut ScriptedService::with_present(&present))
        .await;

    let mut again = ScriptedService::with_present(&present);
    let (stats, aggregator) = harness.run(&mut again).await;

    assert!(again.calls.is_empty());
    assert_eq!(stats.skipped, 8);
    assert_eq!(stats.probed, 0);
    assert!(aggregator.is_empty());
}

#[tokio::test]
async fn test_cancellation_stops_at_item_boundary() {
    let present: Vec<_> = (1..=5).map(|r| tokyo(1, 1, r)).collect();
    let harness = Harness::new(&[Place::Tokyo]);
    let mut service = ScriptedService::with_present(&present);
    service.cancel_on = Some((tokyo(1, 1, 2), harness.cancel.clone()));

    let (stats, _) = harness.run(&mut service).await;

    assert!(stats.cancelled);
    // The item in flight is finished and checkpointed
    assert_eq!(service.fetches, vec![tokyo(1, 1, 1), tokyo(1, 1, 2)]);
    assert_eq!(service.calls.len(), 2);
    assert!(harness.store().load().unwrap().contains(&tokyo(1, 1, 2)));
}

#[tokio::test]
async fn test_fetch_failures() {
    let present: Vec<_> = (1..=3).map(|r| tokyo(1, 1, r)).collect();
    let mut service = ScriptedService::with_present(&present);
    service.fetch_failures.insert(
        tokyo(1, 1, 2),
        FetchFailure::Unavailable("HTTP 503".to_string()),
    );
    service.fetch_failures.insert(
        tokyo(1, 1, 3),
        FetchFailure::Malformed("no results table".to_string()),
    );
    let harness = Harness::new(&[Place::Tokyo]);

    let (stats, aggregator) = harness.run(&mut service).await;

    assert_eq!(stats.discovered, 3);
    assert_eq!(stats.fetched, 1);
    assert_eq!(stats.undetermined, vec![tokyo(1, 1, 2)]);
    assert_eq!(stats.malformed, vec![tokyo(1, 1, 3)]);
    assert_eq!(aggregator.len(), 1);

    let done = harness.store().load().unwrap();
    assert!(done.contains(&tokyo(1, 1, 1)));
    assert!(!done.contains(&tokyo(1, 1, 2)));
    assert_eq!(done.get(&tokyo(1, 1, 3)), Some(CheckpointMark::Present));
}

#[tokio::test]
async fn test_snapshot_cadence() {
    let present: Vec<_> = (1..=5).map(|r| tokyo(1, 1, r)).collect();
    let mut harness = Harness::new(&[Place::Tokyo]);
    harness.config.batch_size = 1;
    harness.config.snapshot_multiplier = 2;

    let (stats, aggregator) = harness
        .run(&mut ScriptedService::with_present(&present))
        .await;

    // Due after items 2, 4, 6 and 8; nothing new arrived before item 8
    assert_eq!(stats.snapshots_written, 3);
    assert_eq!(aggregator.written().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_batch_pauses_follow_processed_items() {
    let present: Vec<_> = (1..=5).map(|r| tokyo(1, 1, r)).collect();
    let mut harness = Harness::new(&[Place::Tokyo]);
    harness.config.inter_batch_pause_secs = 45;

    let started = tokio::time::Instant::now();
    harness
        .run(&mut ScriptedService::with_present(&present))
        .await;

    // Eight processed items: pauses after the 3rd and 6th
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(90));
    assert!(elapsed < Duration::from_secs(135));
}

#[tokio::test(start_paused = true)]
async fn test_checkpointed_items_do_not_count_toward_batches() {
    let present: Vec<_> = (1..=5).map(|r| tokyo(1, 1, r)).collect();
    let mut harness = Harness::new(&[Place::Tokyo]);

    {
        let mut store = harness.store();
        for id in &present {
            store.append(*id, CheckpointMark::Present).unwrap();
        }
        store.append(tokyo(1, 1, 6), CheckpointMark::Absent).unwrap();
    }
    harness.config.inter_batch_pause_secs = 45;

    let started = tokio::time::Instant::now();
    let (stats, _) = harness
        .run(&mut ScriptedService::with_present(&present))
        .await;

    assert_eq!(stats.skipped, 6);
    assert_eq!(stats.probed, 2);
    assert!(started.elapsed() < Duration::from_secs(45));
}
