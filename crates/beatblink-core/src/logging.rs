//! Logging configuration
//!
//! Describes where and how verbosely the binaries log. The subscriber itself
//! is assembled in the `beatblink` binary; this type only holds the settings
//! and the log directory housekeeping.

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::{CoreError, Result};

/// Prefix of every log file name
const LOG_FILE_PREFIX: &str = "beatblink_";

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`); `RUST_LOG` wins
    pub level: String,
    /// Log to stderr
    pub console_output: bool,
    /// Log to a timestamped file in `log_dir`
    pub file_output: bool,
    /// Directory holding log files
    pub log_dir: PathBuf,
    /// Number of log files kept by [`LogConfig::cleanup_old_logs`]
    pub max_log_files: usize,
    /// Timestamp suffix of the current log file, fixed at startup
    #[serde(skip)]
    session_stamp: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: PathBuf::from("logs"),
            max_log_files: 10,
            session_stamp: session_stamp(),
        }
    }
}

fn session_stamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

impl LogConfig {
    /// Same settings with a different level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Parse `level` into a filter, rejecting unknown names
    pub fn try_parse_level(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(self.level.trim())
            .map_err(|_| CoreError::InvalidLogLevel(self.level.clone()))
    }

    /// Parse `level`, falling back to INFO
    pub fn parse_level(&self) -> LevelFilter {
        self.try_parse_level().unwrap_or(LevelFilter::INFO)
    }

    /// Create `log_dir` if needed
    pub fn ensure_log_directory(&self) -> Result<()> {
        if !self.log_dir.exists() {
            fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }

    /// Path of the log file for this process
    pub fn current_log_path(&self) -> PathBuf {
        let stamp = if self.session_stamp.is_empty() {
            session_stamp()
        } else {
            self.session_stamp.clone()
        };
        self.log_dir.join(format!("{}{}.log", LOG_FILE_PREFIX, stamp))
    }

    /// Delete the oldest log files so that at most `max_log_files` remain.
    ///
    /// Returns the number of deleted files.
    pub fn cleanup_old_logs(&self) -> Result<usize> {
        if !self.log_dir.exists() {
            return Ok(0);
        }

        let mut logs: Vec<PathBuf> = fs::read_dir(&self.log_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(LOG_FILE_PREFIX) && n.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        if logs.len() <= self.max_log_files {
            return Ok(0);
        }

        // Timestamped names sort chronologically
        logs.sort();
        let excess = logs.len() - self.max_log_files;
        let mut removed = 0;
        for path in logs.into_iter().take(excess) {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }
}
