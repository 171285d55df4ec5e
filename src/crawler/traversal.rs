//! Pruning walk over the race identifier space
//!
//! Identifiers are visited place by place in code order, then meeting,
//! day and race ascending. An absent answer prunes the rest of the
//! enclosing scope:
//!
//! | Absent identifier | Skips |
//! |-------------------|-------|
//! | meeting 1, day 1, race 1 | the rest of the place |
//! | race 1 of a later day | the rest of the place's meeting |
//! | any later race | the rest of the day |
//!
//! `Unknown` never prunes; the walk records a gap and moves to the next
//! race. Identifiers already in the checkpoint log are resolved from
//! their mark without asking the oracle.

use crate::crawler::oracle::ExistenceOracle;
use crate::identifier::{Place, RaceId, DAYS, MEETINGS, RACES};
use crate::state::Verdict;
use crate::storage::{CheckpointMark, CheckpointSet};

/// What the walk learned about one identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// The oracle says the race exists
    Found,

    /// The oracle says the race does not exist
    Absent,

    /// The oracle could not answer
    Undetermined,

    /// Resolved from the checkpoint log without a probe
    Checkpointed(CheckpointMark),
}

/// One visited identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub id: RaceId,
    pub kind: StepKind,
}

impl Step {
    /// True when the oracle was asked about this identifier
    pub fn probed(&self) -> bool {
        !matches!(self.kind, StepKind::Checkpointed(_))
    }
}

/// Lazy, resumable walk over one year and a set of places
#[derive(Debug, Clone)]
pub struct Traversal {
    year: u16,
    places: Vec<Place>,
    place_index: usize,
    meeting: u8,
    day: u8,
    race: u8,
    done: CheckpointSet,
    probes: u64,
}

impl Traversal {
    /// Starts a walk that skips identifiers found in `done`
    ///
    /// Places are visited in code order regardless of the order given.
    pub fn new(year: u16, places: &[Place], done: &CheckpointSet) -> Self {
        let mut places = places.to_vec();
        places.sort();
        places.dedup();

        Self {
            year,
            done: done.restricted_to(year, &places),
            places,
            place_index: 0,
            meeting: *MEETINGS.start(),
            day: *DAYS.start(),
            race: *RACES.start(),
            probes: 0,
        }
    }

    /// Starts a fresh walk with nothing checkpointed
    pub fn discover(year: u16, places: &[Place]) -> Self {
        Self::new(year, places, &CheckpointSet::new())
    }

    /// Number of oracle calls made so far
    pub fn probes(&self) -> u64 {
        self.probes
    }

    /// Identifier the next call to [`Traversal::next`] will visit
    pub fn peek(&self) -> Option<RaceId> {
        let place = *self.places.get(self.place_index)?;
        Some(RaceId::new(
            self.year, place, self.meeting, self.day, self.race,
        ))
    }

    /// Visits the next identifier
    ///
    /// Returns `None` once every place is exhausted.
    pub async fn next<O: ExistenceOracle>(&mut self, oracle: &mut O) -> Option<Step> {
        let id = self.peek()?;

        let (verdict, kind) = match self.done.get(&id) {
            Some(mark) => (mark.verdict(), StepKind::Checkpointed(mark)),
            None => {
                self.probes += 1;
                let verdict = oracle.probe(id).await;
                let kind = match verdict {
                    Verdict::Present => StepKind::Found,
                    Verdict::Absent => StepKind::Absent,
                    Verdict::Unknown => StepKind::Undetermined,
                };
                (verdict, kind)
            }
        };

        self.advance(id, verdict);
        Some(Step { id, kind })
    }

    fn advance(&mut self, id: RaceId, verdict: Verdict) {
        if !verdict.is_absent() {
            self.next_race();
        } else if id.opens_meeting() {
            tracing::info!(
                "Meeting {} not found at {} in {}, moving to the next place",
                id.meeting(),
                id.place(),
                self.year
            );
            self.next_place();
        } else if id.opens_day() {
            tracing::debug!(
                "Meeting {} at {} ends after day {}",
                id.meeting(),
                id.place(),
                id.day() - 1
            );
            self.next_meeting();
        } else {
            tracing::debug!(
                "Day {} of meeting {} at {} has {} race(s)",
                id.day(),
                id.meeting(),
                id.place(),
                id.race() - 1
            );
            self.next_day();
        }
    }

    fn next_race(&mut self) {
        self.race += 1;
        if self.race > *RACES.end() {
            self.next_day();
        }
    }

    fn next_day(&mut self) {
        self.race = *RACES.start();
        self.day += 1;
        if self.day > *DAYS.end() {
            self.next_meeting();
        }
    }

    fn next_meeting(&mut self) {
        self.race = *RACES.start();
        self.day = *DAYS.start();
        self.meeting += 1;
        if self.meeting > *MEETINGS.end() {
            self.next_place();
        }
    }

    fn next_place(&mut self) {
        self.race = *RACES.start();
        self.day = *DAYS.start();
        self.meeting = *MEETINGS.start();
        self.place_index += 1;
    }
}
