//! Race identifier space
//!
//! A race is addressed by `(year, place, meeting, day, race)`. The canonical
//! form is twelve ASCII digits: `YYYY PP MM DD RR`. This string is also the
//! path segment the remote service uses for the race page.
//!
//! # Example
//!
//! ```
//! use furlong::identifier::{Place, RaceId};
//!
//! let id = RaceId::new(2024, Place::Tokyo, 1, 2, 11);
//! assert_eq!(id.encode(), "202405010211");
//! assert_eq!(RaceId::decode("202405010211").unwrap(), id);
//! ```

mod place;

pub use place::Place;

use crate::{IdentifierError, IdentifierResult};
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Meetings held per place per year
pub const MEETINGS: RangeInclusive<u8> = 1..=6;

/// Race days per meeting
pub const DAYS: RangeInclusive<u8> = 1..=12;

/// Races per day
pub const RACES: RangeInclusive<u8> = 1..=12;

/// Years representable in four digits
pub const YEARS: RangeInclusive<u16> = 0..=9999;

/// Length of the canonical identifier string
pub const ENCODED_LEN: usize = 12;

/// Coordinates of a single race
///
/// Field order gives the derived `Ord` the traversal order
/// place → meeting → day → race within a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RaceId {
    year: u16,
    place: Place,
    meeting: u8,
    day: u8,
    race: u8,
}

impl RaceId {
    /// Builds an identifier from coordinates known to be in range
    ///
    /// # Panics
    ///
    /// Panics when a coordinate is outside its range. Callers generate
    /// coordinates from the range constants, so this is a programming error.
    pub fn new(year: u16, place: Place, meeting: u8, day: u8, race: u8) -> Self {
        match Self::try_new(year, place, meeting, day, race) {
            Ok(id) => id,
            Err(e) => panic!("invalid race coordinates: {}", e),
        }
    }

    /// Builds an identifier, rejecting out-of-range coordinates
    pub fn try_new(
        year: u16,
        place: Place,
        meeting: u8,
        day: u8,
        race: u8,
    ) -> IdentifierResult<Self> {
        check_range("year", year, &YEARS)?;
        check_range("meeting", meeting, &MEETINGS)?;
        check_range("day", day, &DAYS)?;
        check_range("race", race, &RACES)?;

        Ok(Self {
            year,
            place,
            meeting,
            day,
            race,
        })
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn place(&self) -> Place {
        self.place
    }

    pub fn meeting(&self) -> u8 {
        self.meeting
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    pub fn race(&self) -> u8 {
        self.race
    }

    /// Returns true for the first race of the first day of a meeting
    pub fn opens_meeting(&self) -> bool {
        self.day == *DAYS.start() && self.race == *RACES.start()
    }

    /// Returns true for the first race of any day
    pub fn opens_day(&self) -> bool {
        self.race == *RACES.start()
    }

    /// Encodes to the canonical twelve-digit form
    pub fn encode(&self) -> String {
        format!(
            "{:04}{}{:02}{:02}{:02}",
            self.year,
            self.place.code(),
            self.meeting,
            self.day,
            self.race
        )
    }

    /// Decodes the canonical twelve-digit form
    pub fn decode(s: &str) -> IdentifierResult<Self> {
        if s.len() != ENCODED_LEN {
            return Err(IdentifierError::Length(s.to_string()));
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdentifierError::NonDigit(s.to_string()));
        }

        // All bytes are ASCII digits, so slicing on byte offsets is safe
        let place_code = &s[4..6];
        let place = Place::from_code(place_code)
            .ok_or_else(|| IdentifierError::UnknownPlace(place_code.to_string()))?;

        Self::try_new(
            parse_field(&s[0..4])?,
            place,
            parse_field(&s[6..8])?,
            parse_field(&s[8..10])?,
            parse_field(&s[10..12])?,
        )
    }
}

fn parse_field<T: FromStr>(digits: &str) -> IdentifierResult<T> {
    digits
        .parse()
        .map_err(|_| IdentifierError::NonDigit(digits.to_string()))
}

fn check_range<T>(field: &'static str, value: T, range: &RangeInclusive<T>) -> IdentifierResult<()>
where
    T: PartialOrd + Into<u32> + Copy,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(IdentifierError::OutOfRange {
            field,
            value: value.into(),
        })
    }
}

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for RaceId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for RaceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}
