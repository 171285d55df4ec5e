//! In-memory collection of fetched records
//!
//! Records accumulate for the whole run. Intermediate snapshots write
//! everything collected so far; the final snapshot is written once at the
//! end. Records are kept ordered by identifier so output is stable.

use crate::crawler::RaceRecord;
use crate::identifier::{Place, RaceId};
use crate::output::snapshot::{
    file_timestamp, render_csv, write_snapshot_files, SnapshotKind, SnapshotMetadata,
};
use crate::output::stats::CrawlStatistics;
use crate::output::OutputResult;
use chrono::Local;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Run-level facts recorded in every snapshot's metadata
#[derive(Debug, Clone)]
pub struct SnapshotContext {
    pub year: u16,
    pub places: Vec<Place>,
    pub config_hash: String,
}

/// Collects records and writes snapshots of them
#[derive(Debug)]
pub struct ResultAggregator {
    directory: PathBuf,
    context: SnapshotContext,
    records: BTreeMap<RaceId, RaceRecord>,
    dirty: bool,
    written: Vec<PathBuf>,
}

impl ResultAggregator {
    pub fn new(directory: impl Into<PathBuf>, context: SnapshotContext) -> Self {
        Self {
            directory: directory.into(),
            context,
            records: BTreeMap::new(),
            dirty: false,
            written: Vec::new(),
        }
    }

    /// Adds a record, replacing an earlier one for the same race
    pub fn insert(&mut self, record: RaceRecord) {
        self.records.insert(record.race_id, record);
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in identifier order
    pub fn records(&self) -> impl Iterator<Item = &RaceRecord> {
        self.records.values()
    }

    /// True when records arrived since the last snapshot
    pub fn has_unsaved(&self) -> bool {
        self.dirty
    }

    /// CSV paths of every snapshot written so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Writes an intermediate snapshot of everything collected so far
    ///
    /// Named `snapshot_<year>_<timestamp>_<items>`.
    pub fn write_snapshot(&mut self, items_processed: u64) -> OutputResult<PathBuf> {
        let now = Local::now();
        let stem = format!(
            "snapshot_{}_{}_{:06}",
            self.context.year,
            file_timestamp(&now),
            items_processed
        );
        let mut metadata = self.metadata(SnapshotKind::Intermediate, now);
        metadata.items_processed = Some(items_processed);

        let path = self.write(&stem, &mut metadata)?;
        tracing::info!(
            "Saved snapshot of {} records ({} items processed) to {}",
            self.records.len(),
            items_processed,
            path.display()
        );
        Ok(path)
    }

    /// Writes the end-of-run snapshot
    ///
    /// Named `races_<year>_<timestamp>`. Returns `None` without writing
    /// anything when no records were collected.
    pub fn write_final(&mut self, stats: &CrawlStatistics) -> OutputResult<Option<PathBuf>> {
        if self.records.is_empty() {
            return Ok(None);
        }

        let now = Local::now();
        let stem = format!("races_{}_{}", self.context.year, file_timestamp(&now));
        let mut metadata = self.metadata(SnapshotKind::Final, now);
        metadata.statistics = Some(stats.clone());

        let path = self.write(&stem, &mut metadata)?;
        tracing::info!(
            "Saved {} records to {}",
            self.records.len(),
            path.display()
        );
        Ok(Some(path))
    }

    fn write(&mut self, stem: &str, metadata: &mut SnapshotMetadata) -> OutputResult<PathBuf> {
        let records: Vec<&RaceRecord> = self.records.values().collect();
        let csv = render_csv(&records)?;
        let path = write_snapshot_files(&self.directory, stem, &csv, metadata)?;

        self.dirty = false;
        self.written.push(path.clone());
        Ok(path)
    }

    fn metadata(&self, kind: SnapshotKind, created_at: chrono::DateTime<Local>) -> SnapshotMetadata {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut horse_ids: Vec<String> = Vec::new();
        for record in self.records.values() {
            for horse in &record.horse_ids {
                if seen.insert(horse.as_str()) {
                    horse_ids.push(horse.clone());
                }
            }
        }

        SnapshotMetadata {
            kind,
            created_at,
            year: self.context.year,
            places: self
                .context
                .places
                .iter()
                .map(|p| p.code().to_string())
                .collect(),
            config_hash: self.context.config_hash.clone(),
            items_processed: None,
            record_count: self.records.len(),
            row_count: self.records.values().map(|r| r.rows.len()).sum(),
            race_ids: self.records.keys().copied().collect(),
            horse_ids,
            csv_file: String::new(),
            statistics: None,
        }
    }
}
