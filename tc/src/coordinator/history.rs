//! Evaluation history
//!
//! The state machine broadcasts one [`HistoryEntry`] per evaluated
//! notification. [`HistoryLogger`] persists them as JSONL.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::domain::ChangeKind;
use crate::notification::NotificationHeader;

/// One evaluated notification, in evaluation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub header: NotificationHeader,
    pub change: ChangeKind,
    /// Index of the plan step this notification fired, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fired_step: Option<usize>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(header: NotificationHeader, change: ChangeKind, fired_step: Option<usize>) -> Self {
        Self {
            header,
            change,
            fired_step,
            timestamp: Utc::now(),
        }
    }
}

/// Writes history entries to a JSONL file
pub struct HistoryLogger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl HistoryLogger {
    pub fn create(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "HistoryLogger::create: called");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn write_entry(&mut self, entry: &HistoryEntry) -> eyre::Result<()> {
        let json = serde_json::to_string(entry)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Consume entries until the sender side closes
    pub async fn run(mut self, mut rx: broadcast::Receiver<HistoryEntry>) {
        debug!(path = ?self.path, "HistoryLogger::run: started");
        loop {
            match rx.recv().await {
                Ok(entry) => {
                    if let Err(e) = self.write_entry(&entry) {
                        error!(error = %e, path = ?self.path, "Failed to write history entry");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "HistoryLogger lagged, entries dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("HistoryLogger::run: channel closed");
                    break;
                }
            }
        }
    }
}

/// Read a JSONL history file back
pub fn read_history(path: impl AsRef<Path>) -> eyre::Result<Vec<HistoryEntry>> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}
