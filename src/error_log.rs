use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The bulk snapshot could not be loaded.
    Load,
    /// A simulation step failed and was skipped.
    Feed,
}

#[derive(Clone, Debug)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Local>,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorLogEntry {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ErrorLogEntry {
            timestamp: Local::now(),
            kind,
            message: message.into(),
        }
    }
}

/// Append-only JSONL journal of load failures and swallowed feed errors.
#[derive(Clone, Debug)]
pub struct ErrorLogStore {
    path: PathBuf,
}

impl ErrorLogStore {
    pub fn new(path: PathBuf) -> Self {
        ErrorLogStore { path }
    }

    pub fn append_message(&self, kind: ErrorKind, message: impl Into<String>) -> Result<()> {
        self.append(&ErrorLogEntry::new(kind, message))
    }

    fn append(&self, entry: &ErrorLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        serde_json::to_writer(&mut file, &StoredErrorLogEntry::from(entry))?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredErrorLogEntry {
    timestamp_ms: i64,
    kind: ErrorKind,
    message: String,
}

impl From<&ErrorLogEntry> for StoredErrorLogEntry {
    fn from(entry: &ErrorLogEntry) -> Self {
        StoredErrorLogEntry {
            timestamp_ms: entry.timestamp.timestamp_millis(),
            kind: entry.kind,
            message: entry.message.clone(),
        }
    }
}
