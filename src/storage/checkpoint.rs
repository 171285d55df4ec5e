//! Newline-delimited checkpoint log
//!
//! One line per completed identifier:
//!
//! ```text
//! 202405010101
//! 202405010106	absent
//! ```
//!
//! A bare identifier means the record exists and its fetch was attempted.
//! The `absent` tag records a probe that found nothing, so a resumed crawl
//! can prune at the same place without asking the service again.

use crate::identifier::RaceId;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use crate::storage::{CheckpointMark, CheckpointSet};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Append-only checkpoint file
#[derive(Debug)]
pub struct FileCheckpointStore {
    path: PathBuf,
    writer: File,
}

impl FileCheckpointStore {
    /// Opens (or creates) a checkpoint log
    ///
    /// Creates the parent directory if needed. If a previous run was cut off
    /// mid-line, a newline is written first so the next entry starts clean.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let writer = open_writer(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

/// Flushes a directory entry change (such as a rename) to stable storage
#[cfg(unix)]
fn sync_directory(dir: &Path) -> StorageResult<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

/// Directories cannot be opened as files here; the rename is left to the OS
#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> StorageResult<()> {
    Ok(())
}

/// Opens the append handle, terminating a torn last line if there is one
fn open_writer(path: &Path) -> StorageResult<File> {
    let needs_newline = match fs::read(path) {
        Ok(bytes) => bytes.last().is_some_and(|b| *b != b'\n'),
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => return Err(e.into()),
    };

    let mut writer = OpenOptions::new().create(true).append(true).open(path)?;

    if needs_newline {
        tracing::warn!(
            "Checkpoint log {} ends mid-line, terminating it",
            path.display()
        );
        writer.write_all(b"\n")?;
        writer.sync_data()?;
    }

    Ok(writer)
}

/// Formats one log line, without the trailing newline
pub fn format_line(id: RaceId, mark: CheckpointMark) -> String {
    match mark {
        CheckpointMark::Present => id.encode(),
        CheckpointMark::Absent => format!("{}\t{}", id.encode(), mark.to_log_str()),
    }
}

/// Parses one log line
///
/// Returns `None` for blank lines and lines that are not valid entries.
pub fn parse_line(line: &str) -> Option<(RaceId, CheckpointMark)> {
    let mut fields = line.split_whitespace();
    let id = fields.next()?.parse::<RaceId>().ok()?;

    let mark = match fields.next() {
        None => CheckpointMark::Present,
        Some(tag) => CheckpointMark::from_log_str(tag)?,
    };

    if fields.next().is_some() {
        return None;
    }

    Some((id, mark))
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> StorageResult<CheckpointSet> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CheckpointSet::new()),
            Err(e) => return Err(e.into()),
        };

        let content = String::from_utf8_lossy(&bytes);
        let mut set = CheckpointSet::new();

        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(line) {
                Some((id, mark)) => set.insert(id, mark),
                None => tracing::warn!(
                    "Skipping unreadable checkpoint line {} in {}: {:?}",
                    number + 1,
                    self.path.display(),
                    line
                ),
            }
        }

        tracing::debug!(
            "Loaded {} checkpoint entries from {}",
            set.len(),
            self.path.display()
        );

        Ok(set)
    }

    fn append(&mut self, id: RaceId, mark: CheckpointMark) -> StorageResult<()> {
        let mut line = format_line(id, mark);
        line.push('\n');

        // One write per entry so a crash can tear at most the final line
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        self.writer.sync_data()?;

        Ok(())
    }

    fn reset_subset(&mut self, predicate: &dyn Fn(&RaceId) -> bool) -> StorageResult<usize> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut retained = Vec::with_capacity(bytes.len());
        let mut removed = 0;

        for segment in bytes.split_inclusive(|b| *b == b'\n') {
            let entry = std::str::from_utf8(segment).ok().and_then(parse_line);
            match entry {
                Some((id, _)) if predicate(&id) => removed += 1,
                _ => retained.extend_from_slice(segment),
            }
        }

        if removed == 0 {
            return Ok(0);
        }

        let mut replacement = NamedTempFile::new_in(self.directory())?;
        replacement.write_all(&retained)?;
        replacement.flush()?;
        replacement.as_file().sync_all()?;
        replacement
            .persist(&self.path)
            .map_err(|e| StorageError::Persist {
                path: self.path.clone(),
                source: e.error,
            })?;
        sync_directory(self.directory())?;

        // The old handle points at the replaced inode
        self.writer = open_writer(&self.path)?;

        tracing::info!(
            "Removed {} entries from checkpoint log {}",
            removed,
            self.path.display()
        );

        Ok(removed)
    }
}
