//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::identifier::RaceId;
use crate::storage::{CheckpointMark, CheckpointSet};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during checkpoint operations
///
/// Any of these aborts a crawl: continuing without a durable checkpoint
/// would silently lose progress.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for checkpoint log implementations
///
/// The log is a set of identifiers whose work is complete. It is only ever
/// written by one owner; callers serialize access.
pub trait CheckpointStore {
    /// Reads every entry
    ///
    /// Returns an empty set when no log exists yet.
    fn load(&self) -> StorageResult<CheckpointSet>;

    /// Durably records a completed identifier
    ///
    /// The entry is flushed to stable storage before this returns.
    /// Appending an identifier twice is harmless.
    fn append(&mut self, id: RaceId, mark: CheckpointMark) -> StorageResult<()>;

    /// Drops every entry for which `predicate` is true
    ///
    /// Other entries are preserved byte-for-byte. The replacement is atomic:
    /// a crash leaves either the old log or the new one, never a mix.
    ///
    /// # Returns
    ///
    /// The number of entries removed
    fn reset_subset(&mut self, predicate: &dyn Fn(&RaceId) -> bool) -> StorageResult<usize>;
}
