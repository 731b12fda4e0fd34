//! Day-stamped snapshot files
//!
//! A snapshot holds one record per line in snapshot column order. Files are
//! named `<prefix>-YYYYMMDD.txt` and always rewritten whole: the new contents
//! go to a temporary file next to the target, which is then renamed over it.

use crate::error::SnapshotError;
use chrono::NaiveDate;
use postkeep_types::Record;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const DATE_FORMAT: &str = "%Y%m%d";
const EXTENSION: &str = "txt";

/// What to do with a snapshot line that does not decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Log the line and keep loading
    #[default]
    Skip,
    /// Fail the whole load
    Abort,
}

/// Location and naming of snapshot files
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    dir: PathBuf,
    prefix: String,
}

impl SnapshotFile {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{}-{}.{}",
            self.prefix,
            date.format(DATE_FORMAT),
            EXTENSION
        ))
    }

    fn date_of(&self, file_name: &str) -> Option<NaiveDate> {
        let stem = file_name
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('-')?
            .strip_suffix(EXTENSION)?
            .strip_suffix('.')?;
        if stem.len() != 8 {
            return None;
        }
        NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
    }

    /// Newest snapshot in the directory dated strictly before `date`
    pub async fn latest_before(&self, date: NaiveDate) -> Result<Option<PathBuf>, SnapshotError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SnapshotError::io(&self.dir, e)),
        };

        let mut latest: Option<(NaiveDate, PathBuf)> = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SnapshotError::io(&self.dir, e))?
        {
            let file_name = entry.file_name();
            let Some(found) = file_name.to_str().and_then(|name| self.date_of(name)) else {
                continue;
            };
            if found >= date {
                continue;
            }
            if latest.as_ref().map_or(true, |(best, _)| found > *best) {
                latest = Some((found, entry.path()));
            }
        }

        Ok(latest.map(|(_, path)| path))
    }
}

/// Read every record from `path`.
///
/// A missing file reads as empty and blank lines are ignored.
pub async fn read_snapshot(path: &Path, policy: LoadPolicy) -> Result<Vec<Record>, SnapshotError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No snapshot at {}, starting empty", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(SnapshotError::io(path, e)),
    };

    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match Record::from_line(line) {
            Ok(record) => records.push(record),
            Err(source) => {
                let err = SnapshotError::Parse {
                    path: path.to_path_buf(),
                    line: index + 1,
                    source,
                };
                match policy {
                    LoadPolicy::Skip => warn!("Skipping malformed snapshot line: {}", err),
                    LoadPolicy::Abort => return Err(err),
                }
            }
        }
    }

    Ok(records)
}

/// Replace the snapshot at `path` with `records`.
pub async fn write_snapshot(path: &Path, records: &[Record]) -> Result<(), SnapshotError> {
    let mut content = String::new();
    for record in records {
        content.push_str(&record.to_line());
        content.push('\n');
    }

    let tmp_path = temp_path(path);
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .map_err(|e| SnapshotError::io(&tmp_path, e))?;
    file.write_all(content.as_bytes())
        .await
        .map_err(|e| SnapshotError::io(&tmp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| SnapshotError::io(&tmp_path, e))?;
    drop(file);

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| SnapshotError::io(path, e))?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}
