use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const HISTORY_FILE_NAME: &str = ".history.jsonl";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No archive records to restore")]
    Empty,

    #[error("Invalid history index {index}; valid range is 0..{max}")]
    InvalidIndex { index: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: String,
    pub retained: String,
    pub archived: String,
    pub archived_to: String,
    pub score: f64,
    pub action: String, // "archived"
}

impl HistoryRecord {
    pub fn archived(retained: &Path, archived: &Path, archived_to: &Path, score: f64) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            retained: retained.to_string_lossy().into_owned(),
            archived: archived.to_string_lossy().into_owned(),
            archived_to: archived_to.to_string_lossy().into_owned(),
            score,
            action: "archived".to_string(),
        }
    }
}

/// One history line that failed to parse, kept so listing can report it.
#[derive(Debug)]
pub struct MalformedLine {
    pub index: usize,
    pub error: serde_json::Error,
}

#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<(PathBuf, PathBuf)>,
    pub skipped: Vec<(PathBuf, String)>,
    pub records_removed: usize,
}

/// Which archive records to put back.
#[derive(Debug, Clone, Copy)]
pub enum RestoreSelection {
    Latest,
    Index(usize),
    All,
}

/// Append-only JSON-lines log of archive actions.
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log at `<target_dir>/.history.jsonl`.
    pub fn for_target(target_dir: &Path) -> Self {
        Self::new(target_dir.join(HISTORY_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(out, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }

    /// Every parseable record, plus the lines that could not be parsed.
    pub fn read(&self) -> Result<(Vec<HistoryRecord>, Vec<MalformedLine>), HistoryError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        let mut malformed = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryRecord>(&line) {
                Ok(rec) => records.push(rec),
                Err(error) => malformed.push(MalformedLine { index, error }),
            }
        }
        Ok((records, malformed))
    }

    /// Move archived files back to where they came from and drop the restored
    /// records from the log.
    ///
    /// A record whose archived copy is gone, or whose original path has been
    /// taken again, is skipped and left in the log.
    pub fn restore(&self, selection: RestoreSelection) -> Result<RestoreReport, HistoryError> {
        let (records, _) = self.read()?;
        let archived: Vec<HistoryRecord> = records
            .into_iter()
            .filter(|r| r.action == "archived")
            .collect();
        if archived.is_empty() {
            return Err(HistoryError::Empty);
        }

        let selected: Vec<usize> = match selection {
            RestoreSelection::All => (0..archived.len()).collect(),
            RestoreSelection::Latest => vec![archived.len() - 1],
            RestoreSelection::Index(index) if index < archived.len() => vec![index],
            RestoreSelection::Index(index) => {
                return Err(HistoryError::InvalidIndex {
                    index,
                    max: archived.len() - 1,
                });
            }
        };

        let mut report = RestoreReport::default();
        let mut restored_indices = Vec::new();
        for &i in &selected {
            let rec = &archived[i];
            let src = PathBuf::from(&rec.archived_to);
            let dest = PathBuf::from(&rec.archived);

            if !src.is_file() {
                log::warn!("Archived copy {} does not exist; skipping", src.display());
                report.skipped.push((src, "archived copy is missing".to_string()));
                continue;
            }
            if dest.exists() {
                log::warn!("{} is occupied; not restoring over it", dest.display());
                report.skipped.push((src, format!("{} already exists", dest.display())));
                continue;
            }
            if let Err(e) = fs::rename(&src, &dest) {
                log::warn!("Failed to restore {} → {}: {}", src.display(), dest.display(), e);
                report.skipped.push((src, format!("move failed: {}", e)));
                continue;
            }
            log::info!("Restored {} → {}", src.display(), dest.display());
            report.restored.push((src, dest));
            restored_indices.push(i);
        }

        let remaining: Vec<String> = archived
            .iter()
            .enumerate()
            .filter(|(i, _)| !restored_indices.contains(i))
            .map(|(_, rec)| serde_json::to_string(rec))
            .collect::<Result<_, _>>()?;
        let new_content = if remaining.is_empty() {
            String::new()
        } else {
            remaining.join("\n") + "\n"
        };
        fs::write(&self.path, new_content)?;
        report.records_removed = restored_indices.len();

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn archive_one(dir: &Path, name: &str) -> HistoryRecord {
        let original = dir.join(name);
        let archive = dir.join("duplicates_archive");
        fs::create_dir_all(&archive).unwrap();
        let archived_to = archive.join(name);
        fs::write(&archived_to, name.as_bytes()).unwrap();
        HistoryRecord::archived(&dir.join("keeper.jpg"), &original, &archived_to, 0.95)
    }

    #[test]
    fn test_append_and_read_skips_malformed_lines() {
        let temp_dir = TempDir::new().unwrap();
        let log = HistoryLog::for_target(temp_dir.path());

        log.append(&archive_one(temp_dir.path(), "b.jpg")).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(log.path())
            .unwrap()
            .write_all(b"{broken\n")
            .unwrap();
        log.append(&archive_one(temp_dir.path(), "c.jpg")).unwrap();

        let (records, malformed) = log.read().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].index, 1);
        assert!(records[0].archived.ends_with("b.jpg"));
    }

    #[test]
    fn test_restore_latest_moves_file_back_and_trims_log() {
        let temp_dir = TempDir::new().unwrap();
        let log = HistoryLog::for_target(temp_dir.path());
        log.append(&archive_one(temp_dir.path(), "b.jpg")).unwrap();
        log.append(&archive_one(temp_dir.path(), "c.jpg")).unwrap();

        let report = log.restore(RestoreSelection::Latest).unwrap();
        assert_eq!(report.records_removed, 1);
        assert!(temp_dir.path().join("c.jpg").exists());
        assert!(!temp_dir.path().join("b.jpg").exists());

        let (records, _) = log.read().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].archived.ends_with("b.jpg"));
    }

    #[test]
    fn test_restore_does_not_overwrite_original_path() {
        let temp_dir = TempDir::new().unwrap();
        let log = HistoryLog::for_target(temp_dir.path());
        log.append(&archive_one(temp_dir.path(), "b.jpg")).unwrap();
        fs::write(temp_dir.path().join("b.jpg"), b"new file").unwrap();

        let report = log.restore(RestoreSelection::All).unwrap();
        assert!(report.restored.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(fs::read(temp_dir.path().join("b.jpg")).unwrap(), b"new file");
        assert_eq!(log.read().unwrap().0.len(), 1);
    }

    #[test]
    fn test_failed_move_still_rewrites_log() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let log = HistoryLog::for_target(dir);

        // the original folder is gone, so this one cannot be moved back
        let stranded = dir.join("duplicates_archive").join("x.jpg");
        fs::create_dir_all(stranded.parent().unwrap()).unwrap();
        fs::write(&stranded, b"x").unwrap();
        log.append(&HistoryRecord::archived(
            &dir.join("keeper.jpg"),
            &dir.join("removed_folder").join("x.jpg"),
            &stranded,
            0.95,
        ))
        .unwrap();
        log.append(&archive_one(dir, "b.jpg")).unwrap();

        let report = log.restore(RestoreSelection::All).unwrap();
        assert_eq!(report.restored.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.records_removed, 1);
        assert!(dir.join("b.jpg").exists());
        assert!(stranded.exists());

        let (records, _) = log.read().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].archived.ends_with("x.jpg"));
    }

    #[test]
    fn test_restore_invalid_index() {
        let temp_dir = TempDir::new().unwrap();
        let log = HistoryLog::for_target(temp_dir.path());
        log.append(&archive_one(temp_dir.path(), "b.jpg")).unwrap();

        let err = log.restore(RestoreSelection::Index(3)).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidIndex { index: 3, max: 0 }));
    }

    #[test]
    fn test_restore_empty_log() {
        let temp_dir = TempDir::new().unwrap();
        let log = HistoryLog::for_target(temp_dir.path());
        fs::write(log.path(), "").unwrap();

        assert!(matches!(log.restore(RestoreSelection::All), Err(HistoryError::Empty)));
    }
}
