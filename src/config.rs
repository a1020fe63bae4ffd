use crate::core::archive::ARCHIVE_DIR_NAME;
use crate::core::candidates::DEFAULT_THRESHOLD;
use crate::services::history::HISTORY_FILE_NAME;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Target directory does not exist: {path}")]
    MissingDirectory { path: String },

    #[error("Not a directory: {path}")]
    NotADirectory { path: String },

    #[error("Similarity threshold must be between 0 and 1, got {value}")]
    InvalidThreshold { value: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validated settings for one session over one directory.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub target_dir: PathBuf,
    pub threshold: f64,
    pub record_history: bool,
}

impl SessionConfig {
    /// Check `target_dir` and `threshold` before anything touches the disk.
    pub fn new(target_dir: &Path, threshold: f64) -> Result<Self, ConfigError> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidThreshold { value: threshold });
        }
        if !target_dir.exists() {
            return Err(ConfigError::MissingDirectory {
                path: target_dir.to_string_lossy().to_string(),
            });
        }
        if !target_dir.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: target_dir.to_string_lossy().to_string(),
            });
        }

        Ok(Self {
            target_dir: fs::canonicalize(target_dir)?,
            threshold,
            record_history: true,
        })
    }

    pub fn with_default_threshold(target_dir: &Path) -> Result<Self, ConfigError> {
        Self::new(target_dir, DEFAULT_THRESHOLD)
    }

    pub fn without_history(mut self) -> Self {
        self.record_history = false;
        self
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.target_dir.join(ARCHIVE_DIR_NAME)
    }

    pub fn history_path(&self) -> PathBuf {
        self.target_dir.join(HISTORY_FILE_NAME)
    }
}
