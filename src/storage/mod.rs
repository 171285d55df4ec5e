//! Storage module for persisting crawl progress
//!
//! This module handles the durable checkpoint log:
//! - Loading the set of completed identifiers on start-up
//! - Appending each identifier once its work is finished
//! - Atomically dropping a subset of entries to force a re-crawl

mod checkpoint;
mod traits;

pub use checkpoint::{format_line, parse_line, FileCheckpointStore};
pub use traits::{CheckpointStore, StorageError, StorageResult};

use crate::identifier::{Place, RaceId};
use crate::state::Verdict;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

/// What a checkpoint entry says about its identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckpointMark {
    /// The record exists and its fetch was attempted
    Present,

    /// The service reported no such record
    Absent,
}

impl CheckpointMark {
    pub fn to_log_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }

    pub fn from_log_str(s: &str) -> Option<Self> {
        match s {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }

    /// The verdict a probe would have returned
    pub fn verdict(&self) -> Verdict {
        match self {
            Self::Present => Verdict::Present,
            Self::Absent => Verdict::Absent,
        }
    }
}

/// Per-place counts taken from a checkpoint set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceProgress {
    pub present: usize,
    pub absent: usize,
    /// Highest checkpointed identifier, in traversal order
    pub last: Option<RaceId>,
}

/// In-memory view of the checkpoint log
///
/// Semantically a set; when an identifier was logged with both marks,
/// `Present` wins.
#[derive(Debug, Clone, Default)]
pub struct CheckpointSet {
    marks: HashMap<RaceId, CheckpointMark>,
}

impl CheckpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry
    pub fn insert(&mut self, id: RaceId, mark: CheckpointMark) {
        match self.marks.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(mark);
            }
            Entry::Occupied(mut slot) => {
                if mark == CheckpointMark::Present {
                    slot.insert(mark);
                }
            }
        }
    }

    pub fn get(&self, id: &RaceId) -> Option<CheckpointMark> {
        self.marks.get(id).copied()
    }

    pub fn contains(&self, id: &RaceId) -> bool {
        self.marks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RaceId, &CheckpointMark)> {
        self.marks.iter()
    }

    /// Keeps only entries for one year and a set of places
    pub fn restricted_to(&self, year: u16, places: &[Place]) -> Self {
        let marks = self
            .marks
            .iter()
            .filter(|(id, _)| id.year() == year && places.contains(&id.place()))
            .map(|(id, mark)| (*id, *mark))
            .collect();
        Self { marks }
    }

    /// Counts entries per place for one year
    pub fn progress_by_place(&self, year: u16) -> BTreeMap<Place, PlaceProgress> {
        let mut progress: BTreeMap<Place, PlaceProgress> = BTreeMap::new();

        for (id, mark) in self.marks.iter().filter(|(id, _)| id.year() == year) {
            let entry = progress.entry(id.place()).or_default();
            match mark {
                CheckpointMark::Present => entry.present += 1,
                CheckpointMark::Absent => entry.absent += 1,
            }
            if entry.last.map_or(true, |last| *id > last) {
                entry.last = Some(*id);
            }
        }

        progress
    }
}
