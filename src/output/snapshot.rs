//! CSV + JSON snapshot files
//!
//! A snapshot is a pair of files sharing a stem: a CSV with one line per
//! result row and a JSON metadata document. Each file is written to a
//! temporary file in the target directory and then linked into place
//! without replacing anything, so an existing snapshot is never touched
//! and a reader never sees a partial file.

use crate::crawler::RaceRecord;
use crate::identifier::RaceId;
use crate::output::stats::CrawlStatistics;
use crate::output::{OutputError, OutputResult};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Columns every CSV starts with, ahead of the results table columns
pub const FIXED_COLUMNS: [&str; 8] = [
    "race_id",
    "place_code",
    "place_name",
    "meeting",
    "day",
    "race",
    "race_name",
    "row",
];

/// Suffixes tried before giving up on a stem
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Whether a snapshot was taken mid-run or at the end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    Intermediate,
    Final,
}

/// Contents of the JSON half of a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotMetadata {
    pub kind: SnapshotKind,
    pub created_at: DateTime<Local>,
    pub year: u16,
    pub places: Vec<String>,
    pub config_hash: String,
    /// Processed-item count that triggered an intermediate snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<u64>,
    pub record_count: usize,
    pub row_count: usize,
    pub race_ids: Vec<RaceId>,
    pub horse_ids: Vec<String>,
    /// File name of the CSV half
    pub csv_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<CrawlStatistics>,
}

/// Timestamp used in snapshot file names, sortable and millisecond-precise
pub fn file_timestamp(at: &DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// Renders records as CSV
///
/// The header is [`FIXED_COLUMNS`] followed by the union of every record's
/// column names in first-seen order. Cells a record does not have are left
/// empty.
pub fn render_csv(records: &[&RaceRecord]) -> OutputResult<Vec<u8>> {
    let mut columns: Vec<String> = Vec::new();
    let per_record: Vec<Vec<String>> = records.iter().map(|r| r.column_names()).collect();

    for names in &per_record {
        for name in names {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(FIXED_COLUMNS.iter().copied().chain(columns.iter().map(String::as_str)))?;

    for (record, names) in records.iter().zip(&per_record) {
        let id = record.race_id;
        for (index, cells) in record.rows.iter().enumerate() {
            let mut line: Vec<String> = vec![
                id.encode(),
                id.place().code().to_string(),
                id.place().name().to_string(),
                id.meeting().to_string(),
                id.day().to_string(),
                id.race().to_string(),
                record.race_name.clone().unwrap_or_default(),
                (index + 1).to_string(),
            ];
            line.extend(columns.iter().map(|column| {
                names
                    .iter()
                    .position(|name| name == column)
                    .and_then(|i| cells.get(i))
                    .cloned()
                    .unwrap_or_default()
            }));
            writer.write_record(&line)?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| OutputError::Io(e.into_error()))
}

/// Writes `bytes` to `dir/name`, failing if the name is taken
fn persist_new(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let target = dir.join(name);
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.as_file().sync_all()?;
    file.persist_noclobber(&target).map_err(|e| e.error)?;
    Ok(target)
}

/// Writes a snapshot pair under `dir`
///
/// `stem` is extended with `_1`, `_2`, ... if a file with that name
/// already exists. Fills in `metadata.csv_file` before writing the JSON.
///
/// # Returns
///
/// The path of the CSV file
pub fn write_snapshot_files(
    dir: &Path,
    stem: &str,
    csv: &[u8],
    metadata: &mut SnapshotMetadata,
) -> OutputResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = match attempt {
            0 => stem.to_string(),
            n => format!("{}_{}", stem, n),
        };

        let csv_name = format!("{}.csv", candidate);
        let csv_path = match persist_new(dir, &csv_name, csv) {
            Ok(path) => path,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        };

        metadata.csv_file = csv_name;
        let json = serde_json::to_vec_pretty(metadata)?;
        persist_new(dir, &format!("{}.json", candidate), &json)?;

        tracing::debug!("Wrote snapshot {}", csv_path.display());
        return Ok(csv_path);
    }

    Err(OutputError::NamesExhausted(stem.to_string()))
}
