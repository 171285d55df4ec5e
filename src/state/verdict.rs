/// Existence verdict definitions
///
/// A probe never answers with a boolean: transport trouble is reported as
/// `Unknown` and must not be mistaken for a record that does not exist.
use std::fmt;

/// Outcome of asking the remote service whether an identifier exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// The results page has a non-empty results table
    Present,

    /// The service answered and the record does not exist
    Absent,

    /// No trustworthy answer (retries exhausted, transport failure, non-2xx)
    Unknown,
}

impl Verdict {
    /// Returns true only for a definite "does not exist"
    ///
    /// This is the sole condition under which traversal may prune.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns true if the record exists
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }

    /// Returns true if the verdict can be recorded as completed work
    pub fn is_determined(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Short lowercase label used in logs and metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
