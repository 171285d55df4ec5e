//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Verdict`: tri-state answer of an existence probe (present, absent, unknown)
//! - `PacingState`: processed/fetched counters that drive pauses, snapshots and the item cap

mod pacing;
mod verdict;

// Re-export main types
pub use pacing::{pause_duration, PacingState, Pause};
pub use verdict::Verdict;
